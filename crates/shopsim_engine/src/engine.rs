//! The simulated execution engine.
//!
//! [`decide`] is a pure decision step: given an endpoint, one settings
//! snapshot and a random source, it returns how long the call should
//! appear to take and how it ends. Waiting is the caller's job.

use crate::endpoint::{Endpoint, PAYMENT_FAILURES};
use crate::settings::SimSettings;
use rand::seq::SliceRandom;
use rand::Rng;
use shopsim_trace::{Failure, OutcomeCategory};
use std::time::Duration;

/// Chance that a verification challenge fails on its own.
pub const CHALLENGE_FAILURE_RATE: f64 = 0.10;

/// Chance that an inventory reservation ends in a backorder.
pub const BACKORDER_RATE: f64 = 0.10;

/// Chance that a payment asks for an extra verification challenge.
pub const VERIFICATION_REQUIRED_RATE: f64 = 0.30;

/// Flavor of a successful call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SuccessKind {
    /// Plain success.
    Completed,
    /// Reservation succeeded but the stock is backordered.
    Backorder,
    /// Payment was accepted pending a verification challenge.
    VerificationRequired,
}

impl SuccessKind {
    /// Returns the label for this success kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "ok",
            Self::Backorder => "backorder",
            Self::VerificationRequired => "verification_required",
        }
    }
}

/// How a simulated call ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// The call succeeded.
    Success(SuccessKind),
    /// The call failed with the given category.
    Failure(OutcomeCategory),
}

impl Outcome {
    /// Returns true for any success.
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Returns the label for this outcome.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success(kind) => kind.as_str(),
            Self::Failure(category) => category.as_str(),
        }
    }
}

/// The engine's verdict for one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    /// The endpoint that was decided.
    pub endpoint: Endpoint,
    /// How long the call should appear to take.
    pub delay: Duration,
    /// How the call ends.
    pub outcome: Outcome,
}

impl Decision {
    /// Converts the outcome into the value orchestrators receive.
    ///
    /// # Errors
    ///
    /// Returns the typed [`Failure`] for failed outcomes.
    pub const fn into_result(self) -> Result<SuccessKind, Failure> {
        match self.outcome {
            Outcome::Success(kind) => Ok(kind),
            Outcome::Failure(category) => Err(Failure::new(category).at(self.endpoint.as_str())),
        }
    }
}

/// Decides the delay and outcome of one call to `endpoint`.
///
/// Offline short-circuits to an immediate network failure. Otherwise the
/// delay is drawn from the active profile, then forced failures, then
/// intrinsic failure rates are applied.
pub fn decide<R: Rng + ?Sized>(endpoint: Endpoint, settings: &SimSettings, rng: &mut R) -> Decision {
    if settings.offline {
        return Decision {
            endpoint,
            delay: Duration::ZERO,
            outcome: Outcome::Failure(OutcomeCategory::Network),
        };
    }

    let delay = settings.profile.range().sample(rng);
    let outcome = if settings.failures.is_forced(endpoint) {
        Outcome::Failure(forced_category(endpoint, rng))
    } else {
        intrinsic_outcome(endpoint, rng)
    };

    Decision {
        endpoint,
        delay,
        outcome,
    }
}

fn forced_category<R: Rng + ?Sized>(endpoint: Endpoint, rng: &mut R) -> OutcomeCategory {
    match endpoint {
        Endpoint::Payment => PAYMENT_FAILURES
            .choose(rng)
            .copied()
            .unwrap_or(OutcomeCategory::Provider),
        other => other
            .failure_categories()
            .first()
            .copied()
            .unwrap_or(OutcomeCategory::Unknown),
    }
}

fn intrinsic_outcome<R: Rng + ?Sized>(endpoint: Endpoint, rng: &mut R) -> Outcome {
    match endpoint {
        Endpoint::ThreeDsChallenge if rng.gen_bool(CHALLENGE_FAILURE_RATE) => {
            Outcome::Failure(OutcomeCategory::Fraud)
        }
        Endpoint::InventoryReserve if rng.gen_bool(BACKORDER_RATE) => {
            Outcome::Success(SuccessKind::Backorder)
        }
        Endpoint::Payment if rng.gen_bool(VERIFICATION_REQUIRED_RATE) => {
            Outcome::Success(SuccessKind::VerificationRequired)
        }
        _ => Outcome::Success(SuccessKind::Completed),
    }
}
