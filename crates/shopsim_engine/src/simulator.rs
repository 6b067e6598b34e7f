//! Async simulator.
//!
//! Wraps [`decide`] with a settings store, a seeded random source and the
//! simulated wait. The wait is the only suspension point and races the
//! caller's cancellation token.

use crate::endpoint::Endpoint;
use crate::engine::{decide, Decision, SuccessKind};
use crate::error::CallError;
use crate::settings::SettingsStore;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// A successful simulated call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reply {
    /// Flavor of the success.
    pub kind: SuccessKind,
    /// How long the call waited.
    pub delay: Duration,
}

/// Simulated backend shared by every workflow task.
#[derive(Debug)]
pub struct Simulator {
    settings: SettingsStore,
    rng: Mutex<ChaCha8Rng>,
}

impl Simulator {
    /// Creates a simulator reading `settings`, with randomness seeded
    /// from `seed`.
    #[must_use]
    pub fn new(settings: SettingsStore, seed: u64) -> Self {
        Self {
            settings,
            rng: Mutex::new(ChaCha8Rng::seed_from_u64(seed)),
        }
    }

    /// The settings store this simulator reads.
    #[must_use]
    pub const fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    /// Decides one call against the current settings snapshot without
    /// waiting.
    pub fn execute(&self, endpoint: Endpoint) -> Decision {
        let snapshot = self.settings.snapshot();
        let decision = {
            let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
            decide(endpoint, &snapshot, &mut *rng)
        };
        debug!(
            %endpoint,
            profile = %snapshot.profile,
            delay = ?decision.delay,
            outcome = decision.outcome.as_str(),
            "simulated call decided"
        );
        decision
    }

    /// Performs one simulated call: decides, then waits for the drawn
    /// delay unless `cancel` fires first.
    ///
    /// # Errors
    ///
    /// Returns [`CallError::Failed`] with the decided category, or
    /// [`CallError::Cancelled`] if the token fires before or during the
    /// wait.
    pub async fn call(
        &self,
        endpoint: Endpoint,
        cancel: &CancellationToken,
    ) -> Result<Reply, CallError> {
        if cancel.is_cancelled() {
            return Err(CallError::Cancelled);
        }

        let decision = self.execute(endpoint);
        if !decision.delay.is_zero() {
            tokio::select! {
                () = cancel.cancelled() => {
                    debug!(%endpoint, "simulated call cancelled mid-delay");
                    return Err(CallError::Cancelled);
                }
                () = tokio::time::sleep(decision.delay) => {}
            }
        }

        let kind = decision.into_result()?;
        Ok(Reply {
            kind,
            delay: decision.delay,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::LatencyProfile;
    use crate::settings::SimSettings;
    use shopsim_trace::OutcomeCategory;
    use std::sync::Arc;

    fn simulator(settings: SimSettings) -> Arc<Simulator> {
        Arc::new(Simulator::new(SettingsStore::new(settings), 42))
    }

    #[tokio::test(start_paused = true)]
    async fn call_waits_for_the_drawn_delay() {
        let sim = simulator(SimSettings::default().with_profile(LatencyProfile::Slow));
        let start = tokio::time::Instant::now();

        let reply = sim
            .call(Endpoint::Search, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(reply.kind, SuccessKind::Completed);
        assert!(LatencyProfile::Slow.range().contains(reply.delay));
        assert!(start.elapsed() >= reply.delay);
    }

    #[tokio::test(start_paused = true)]
    async fn offline_call_fails_without_waiting() {
        let sim = simulator(SimSettings::default().with_offline(true));
        let start = tokio::time::Instant::now();

        let err = sim
            .call(Endpoint::Payment, &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.category(), Some(OutcomeCategory::Network));
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_the_delay() {
        let sim = simulator(SimSettings::default().with_profile(LatencyProfile::Slow));
        let token = CancellationToken::new();

        let task = {
            let sim = Arc::clone(&sim);
            let token = token.clone();
            tokio::spawn(async move { sim.call(Endpoint::Search, &token).await })
        };
        tokio::time::sleep(Duration::from_millis(500)).await;
        token.cancel();

        let result = task.await.unwrap();
        assert_eq!(result, Err(CallError::Cancelled));
    }

    #[tokio::test]
    async fn pre_cancelled_token_skips_the_call() {
        let sim = simulator(SimSettings::default());
        let token = CancellationToken::new();
        token.cancel();
        assert_eq!(sim.call(Endpoint::Search, &token).await, Err(CallError::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn settings_changes_affect_later_calls_only() {
        let sim = simulator(SimSettings::default());
        let token = CancellationToken::new();

        assert!(sim.call(Endpoint::OrderPlace, &token).await.is_ok());
        sim.settings().set_failure(Endpoint::OrderPlace, true);
        let err = sim.call(Endpoint::OrderPlace, &token).await.unwrap_err();
        assert_eq!(err.category(), Some(OutcomeCategory::Provider));
    }
}
