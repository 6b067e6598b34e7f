//! Decision campaigns.
//!
//! Runs the engine many times for one endpoint without waiting and
//! aggregates the outcomes. Each report carries a fingerprint of the
//! decision sequence so two runs can be compared for determinism.

use crate::endpoint::Endpoint;
use crate::engine::decide;
use crate::settings::SimSettings;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use xxhash_rust::xxh64::Xxh64;

/// Aggregate for one outcome label.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutcomeStats {
    /// Number of decisions with this outcome.
    pub count: usize,
    /// Sum of their delays.
    pub total_delay: Duration,
}

impl OutcomeStats {
    /// Mean delay of these decisions.
    #[must_use]
    pub fn mean_delay(&self) -> Duration {
        if self.count == 0 {
            return Duration::ZERO;
        }
        let mean = self.total_delay.as_nanos() / self.count as u128;
        Duration::from_nanos(u64::try_from(mean).unwrap_or(u64::MAX))
    }
}

/// One CSV row of a report.
#[derive(Debug, Clone, Serialize)]
pub struct CampaignRow {
    /// Endpoint label.
    pub endpoint: &'static str,
    /// Outcome label.
    pub outcome: &'static str,
    /// Number of decisions.
    pub count: usize,
    /// Share of all decisions.
    pub share: f64,
    /// Mean delay in milliseconds.
    pub mean_delay_ms: u128,
}

/// Result of a campaign.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CampaignReport {
    /// The endpoint exercised.
    pub endpoint: Endpoint,
    /// Number of decisions.
    pub iterations: usize,
    /// Per-outcome aggregates keyed by outcome label.
    pub outcomes: BTreeMap<&'static str, OutcomeStats>,
    /// Shortest delay seen.
    pub min_delay: Duration,
    /// Longest delay seen.
    pub max_delay: Duration,
    /// xxh64 over the decision sequence.
    pub fingerprint: u64,
}

impl CampaignReport {
    /// Number of decisions with the given outcome label.
    #[must_use]
    pub fn count(&self, outcome: &str) -> usize {
        self.outcomes.get(outcome).map_or(0, |stats| stats.count)
    }

    /// Rows suitable for CSV output.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn rows(&self) -> Vec<CampaignRow> {
        self.outcomes
            .iter()
            .map(|(outcome, stats)| CampaignRow {
                endpoint: self.endpoint.as_str(),
                outcome,
                count: stats.count,
                share: stats.count as f64 / self.iterations.max(1) as f64,
                mean_delay_ms: stats.mean_delay().as_millis(),
            })
            .collect()
    }
}

impl fmt::Display for CampaignReport {
    #[allow(clippy::cast_precision_loss)]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Campaign: {} x{}", self.endpoint, self.iterations)?;
        writeln!(
            f,
            "Delay:    {}ms - {}ms",
            self.min_delay.as_millis(),
            self.max_delay.as_millis()
        )?;
        for row in self.rows() {
            writeln!(
                f,
                "  {:<22} {:>6} {:>6.1}% {:>6}ms",
                row.outcome,
                row.count,
                row.share * 100.0,
                row.mean_delay_ms
            )?;
        }
        write!(f, "Fingerprint: {:016x}", self.fingerprint)
    }
}

/// Runs `iterations` decisions for `endpoint` with a generator seeded
/// from `seed`.
pub fn run_campaign(
    endpoint: Endpoint,
    settings: &SimSettings,
    seed: u64,
    iterations: usize,
) -> CampaignReport {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut hasher = Xxh64::new(seed);
    let mut outcomes: BTreeMap<&'static str, OutcomeStats> = BTreeMap::new();
    let mut min_delay = Duration::MAX;
    let mut max_delay = Duration::ZERO;

    for _ in 0..iterations {
        let decision = decide(endpoint, settings, &mut rng);
        let label = decision.outcome.as_str();

        hasher.update(&decision.delay.as_nanos().to_le_bytes());
        hasher.update(label.as_bytes());

        let stats = outcomes.entry(label).or_default();
        stats.count += 1;
        stats.total_delay += decision.delay;
        min_delay = min_delay.min(decision.delay);
        max_delay = max_delay.max(decision.delay);
    }

    CampaignReport {
        endpoint,
        iterations,
        outcomes,
        min_delay: if iterations == 0 { Duration::ZERO } else { min_delay },
        max_delay,
        fingerprint: hasher.digest(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::LatencyProfile;

    #[test]
    fn mean_delay_handles_counts_past_u32() {
        let stats = OutcomeStats {
            count: 1 << 32,
            total_delay: Duration::from_secs(1 << 32),
        };
        assert_eq!(stats.mean_delay(), Duration::from_secs(1));
        assert_eq!(OutcomeStats::default().mean_delay(), Duration::ZERO);
    }

    #[test]
    fn campaign_is_deterministic_per_seed() {
        let settings = SimSettings::default();
        let a = run_campaign(Endpoint::Payment, &settings, 7, 500);
        let b = run_campaign(Endpoint::Payment, &settings, 7, 500);
        let c = run_campaign(Endpoint::Payment, &settings, 8, 500);

        assert_eq!(a, b);
        assert_ne!(a.fingerprint, c.fingerprint);
    }

    #[test]
    fn forced_payment_campaign_only_fails() {
        let settings = SimSettings::default().with_failure(Endpoint::Payment, true);
        let report = run_campaign(Endpoint::Payment, &settings, 1, 200);

        let failures = report.count("provider")
            + report.count("fraud")
            + report.count("insufficient_funds");
        assert_eq!(failures, 200);
        assert_eq!(report.count("ok"), 0);
    }

    #[test]
    fn slow_profile_bounds_delays() {
        let settings = SimSettings::default().with_profile(LatencyProfile::Slow);
        let report = run_campaign(Endpoint::Search, &settings, 3, 100);

        assert_eq!(report.count("ok"), 100);
        assert!(report.min_delay >= Duration::from_secs(1));
        assert!(report.max_delay <= Duration::from_secs(3));
    }

    #[test]
    fn offline_summary_rendering() {
        let settings = SimSettings::default().with_offline(true);
        let report = run_campaign(Endpoint::Search, &settings, 0, 4);
        let rendered = report.to_string();
        let body: Vec<&str> = rendered.lines().take(3).collect();

        insta::assert_snapshot!(body.join("\n"), @r"
        Campaign: search x4
        Delay:    0ms - 0ms
          network                     4  100.0%      0ms
        ");
    }
}
