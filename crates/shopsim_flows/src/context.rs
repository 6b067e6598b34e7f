//! Per-session workflow context.

use shopsim_engine::Simulator;
use shopsim_trace::{Clock, Collector, DefectPolicy, SessionId, Tracer};
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Clock backed by tokio's time source.
///
/// Anchored at the wall clock like [`shopsim_trace::SystemClock`], but
/// advances with [`tokio::time::Instant`], so span timings follow paused
/// and auto-advanced test time.
#[derive(Debug, Clone)]
pub struct TokioClock {
    anchor_ns: u64,
    origin: Instant,
}

impl TokioClock {
    /// Creates a clock anchored now.
    #[must_use]
    pub fn new() -> Self {
        let anchor_ns = chrono::Utc::now()
            .timestamp_nanos_opt()
            .and_then(|ns| u64::try_from(ns).ok())
            .unwrap_or(0);
        Self {
            anchor_ns,
            origin: Instant::now(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TokioClock {
    fn now_ns(&self) -> u64 {
        let elapsed = u64::try_from(self.origin.elapsed().as_nanos()).unwrap_or(u64::MAX);
        self.anchor_ns.saturating_add(elapsed)
    }
}

/// Everything a workflow needs: a tracer stamped with the session's
/// context, the shared simulator and the task's cancellation token.
#[derive(Debug, Clone)]
pub struct FlowContext {
    tracer: Tracer,
    simulator: Arc<Simulator>,
    cancel: CancellationToken,
}

impl FlowContext {
    /// Creates a context from parts.
    #[must_use]
    pub const fn new(tracer: Tracer, simulator: Arc<Simulator>, cancel: CancellationToken) -> Self {
        Self {
            tracer,
            simulator,
            cancel,
        }
    }

    /// Creates a context for one user session, stamping the simulator's
    /// current environment classes and `session` onto every span.
    #[must_use]
    pub fn for_session(
        collector: Arc<dyn Collector>,
        simulator: Arc<Simulator>,
        session: SessionId,
    ) -> Self {
        let context = simulator.settings().snapshot().trace_context(session);
        let tracer = Tracer::new(collector)
            .with_clock(Arc::new(TokioClock::new()))
            .with_context(context);
        Self::new(tracer, simulator, CancellationToken::new())
    }

    /// Replaces the cancellation token.
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Sets the tracer's defect policy.
    #[must_use]
    pub fn with_defect_policy(mut self, policy: DefectPolicy) -> Self {
        self.tracer = self.tracer.with_defect_policy(policy);
        self
    }

    /// A copy with a fresh token, for work that must outlive the
    /// current task's cancellation.
    #[must_use]
    pub fn detached(&self) -> Self {
        Self::new(
            self.tracer.clone(),
            Arc::clone(&self.simulator),
            CancellationToken::new(),
        )
    }

    /// The tracer.
    #[must_use]
    pub const fn tracer(&self) -> &Tracer {
        &self.tracer
    }

    /// The simulator.
    #[must_use]
    pub fn simulator(&self) -> &Simulator {
        &self.simulator
    }

    /// The cancellation token.
    #[must_use]
    pub const fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shopsim_engine::SettingsStore;
    use shopsim_trace::MemoryCollector;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn tokio_clock_follows_paused_time() {
        let clock = TokioClock::new();
        let before = clock.now_ns();
        tokio::time::advance(Duration::from_millis(250)).await;
        assert_eq!(clock.now_ns() - before, 250_000_000);
    }

    #[test]
    fn detached_context_ignores_parent_cancellation() {
        let sim = Arc::new(Simulator::new(SettingsStore::default(), 1));
        let ctx = FlowContext::for_session(
            Arc::new(MemoryCollector::new()),
            sim,
            SessionId::from_raw(9),
        );
        let detached = ctx.detached();
        ctx.cancel_token().cancel();

        assert!(ctx.cancel_token().is_cancelled());
        assert!(!detached.cancel_token().is_cancelled());
    }
}
