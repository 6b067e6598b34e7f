//! Property-based generators for simulator inputs.
//!
//! Uses proptest strategies to generate:
//! - Endpoints and latency profiles
//! - Failure injection tables
//! - Complete settings snapshots

use crate::endpoint::Endpoint;
use crate::profile::LatencyProfile;
use crate::settings::{FailureTable, SimSettings};
use proptest::prelude::*;
use shopsim_trace::ExperimentVariant;

/// Strategy for any endpoint.
pub fn endpoint() -> impl Strategy<Value = Endpoint> {
    prop::sample::select(Endpoint::ALL.to_vec())
}

/// Strategy for any latency profile.
pub fn latency_profile() -> impl Strategy<Value = LatencyProfile> {
    prop::sample::select(LatencyProfile::ALL.to_vec())
}

/// Strategy for experiment variants.
pub fn variant() -> impl Strategy<Value = ExperimentVariant> {
    prop_oneof![
        Just(ExperimentVariant::Control),
        Just(ExperimentVariant::TreatmentA),
        Just(ExperimentVariant::TreatmentB),
    ]
}

/// Strategy for failure tables. Most endpoints stay healthy.
pub fn failure_table() -> impl Strategy<Value = FailureTable> {
    prop::collection::vec(prop::bool::weighted(0.2), Endpoint::ALL.len()).prop_map(|flags| {
        Endpoint::ALL
            .iter()
            .zip(flags)
            .fold(FailureTable::new(), |table, (endpoint, fail)| {
                table.with(*endpoint, fail)
            })
    })
}

/// Strategy for settings snapshots.
pub fn settings() -> impl Strategy<Value = SimSettings> {
    (
        latency_profile(),
        prop::bool::weighted(0.1),
        variant(),
        failure_table(),
    )
        .prop_map(|(profile, offline, variant, failures)| SimSettings {
            profile,
            offline,
            variant,
            failures,
            ..SimSettings::default()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::PAYMENT_FAILURES;
    use crate::engine::{decide, Outcome};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use shopsim_trace::OutcomeCategory;
    use std::time::Duration;

    proptest! {
        #[test]
        fn offline_fails_fast(endpoint in endpoint(), mut settings in settings(), seed: u64) {
            settings.offline = true;
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let decision = decide(endpoint, &settings, &mut rng);

            prop_assert_eq!(decision.delay, Duration::ZERO);
            prop_assert_eq!(decision.outcome, Outcome::Failure(OutcomeCategory::Network));
        }

        #[test]
        fn delays_stay_in_profile(endpoint in endpoint(), mut settings in settings(), seed: u64) {
            settings.offline = false;
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let decision = decide(endpoint, &settings, &mut rng);

            prop_assert!(settings.profile.range().contains(decision.delay));
        }

        #[test]
        fn forced_payment_uses_payment_categories(profile in latency_profile(), seed: u64) {
            let settings = SimSettings::default()
                .with_profile(profile)
                .with_failure(Endpoint::Payment, true);
            let mut rng = ChaCha8Rng::seed_from_u64(seed);

            match decide(Endpoint::Payment, &settings, &mut rng).outcome {
                Outcome::Failure(category) => prop_assert!(PAYMENT_FAILURES.contains(&category)),
                Outcome::Success(kind) => prop_assert!(false, "forced payment succeeded: {kind:?}"),
            }
        }

        #[test]
        fn forced_endpoints_never_succeed(endpoint in endpoint(), mut settings in settings(), seed: u64) {
            settings.offline = false;
            settings.failures.set(endpoint, true);
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let decision = decide(endpoint, &settings, &mut rng);

            prop_assert!(!decision.outcome.is_success());
        }
    }
}
