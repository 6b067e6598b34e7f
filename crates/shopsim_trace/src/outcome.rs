//! Outcome taxonomy.
//!
//! A closed set of failure categories and a total mapping from raised
//! errors onto it. Nothing else about an error is ever recorded.

use serde::{Deserialize, Serialize};
use std::error::Error as StdError;
use std::fmt;
use std::io;

/// Why an operation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeCategory {
    /// Connectivity problem: offline, timeout, connection dropped.
    Network,
    /// The request was rejected as malformed or inconsistent.
    Validation,
    /// An upstream provider (payment, shipping, order backend) failed.
    Provider,
    /// The operation was blocked by fraud screening.
    Fraud,
    /// The payment instrument lacks funds.
    InsufficientFunds,
    /// The requested entity does not exist.
    NotFound,
    /// Anything that could not be classified.
    Unknown,
}

impl OutcomeCategory {
    /// Every category, in declaration order.
    pub const ALL: [Self; 7] = [
        Self::Network,
        Self::Validation,
        Self::Provider,
        Self::Fraud,
        Self::InsufficientFunds,
        Self::NotFound,
        Self::Unknown,
    ];

    /// Returns the attribute label for this category.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Validation => "validation",
            Self::Provider => "provider",
            Self::Fraud => "fraud",
            Self::InsufficientFunds => "insufficient_funds",
            Self::NotFound => "not_found",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for OutcomeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed domain failure tagged with exactly one category.
///
/// This is the error value simulated calls hand back to orchestrators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Failure {
    /// The failure category.
    pub category: OutcomeCategory,
    /// Logical operation that failed, if known.
    pub operation: Option<&'static str>,
}

impl Failure {
    /// Creates a failure with the given category.
    #[must_use]
    pub const fn new(category: OutcomeCategory) -> Self {
        Self {
            category,
            operation: None,
        }
    }

    /// Attaches the failing operation.
    #[must_use]
    pub const fn at(mut self, operation: &'static str) -> Self {
        self.operation = Some(operation);
        self
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.operation {
            Some(op) => write!(f, "{} failure in {op}", self.category),
            None => write!(f, "{} failure", self.category),
        }
    }
}

impl StdError for Failure {}

impl From<OutcomeCategory> for Failure {
    fn from(category: OutcomeCategory) -> Self {
        Self::new(category)
    }
}

/// Maps any error onto an [`OutcomeCategory`].
///
/// Walks the `source()` chain and returns the first recognized category.
/// Unrecognized chains map to [`OutcomeCategory::Unknown`].
pub fn categorize(error: &(dyn StdError + 'static)) -> OutcomeCategory {
    let mut current = Some(error);
    while let Some(err) = current {
        if let Some(category) = direct_category(err) {
            return category;
        }
        current = err.source();
    }
    OutcomeCategory::Unknown
}

fn direct_category(err: &(dyn StdError + 'static)) -> Option<OutcomeCategory> {
    if let Some(failure) = err.downcast_ref::<Failure>() {
        return Some(failure.category);
    }
    if let Some(io_err) = err.downcast_ref::<io::Error>() {
        if let Some(category) = io_category(io_err.kind()) {
            return Some(category);
        }
        // io::Error::source skips the wrapped error itself
        return io_err.get_ref().map(|inner| categorize(inner));
    }
    if err.is::<serde_json::Error>() {
        return Some(OutcomeCategory::Validation);
    }
    None
}

const fn io_category(kind: io::ErrorKind) -> Option<OutcomeCategory> {
    match kind {
        io::ErrorKind::TimedOut
        | io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::NotConnected
        | io::ErrorKind::BrokenPipe
        | io::ErrorKind::AddrNotAvailable
        | io::ErrorKind::UnexpectedEof => Some(OutcomeCategory::Network),
        io::ErrorKind::NotFound => Some(OutcomeCategory::NotFound),
        io::ErrorKind::InvalidInput | io::ErrorKind::InvalidData => {
            Some(OutcomeCategory::Validation)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, thiserror::Error)]
    #[error("checkout step failed")]
    struct StepError(#[source] Failure);

    #[derive(Debug, thiserror::Error)]
    #[error("opaque")]
    struct Opaque;

    #[test]
    fn failure_maps_to_own_category() {
        let err = Failure::new(OutcomeCategory::Fraud).at("payment");
        assert_eq!(categorize(&err), OutcomeCategory::Fraud);
        assert_eq!(err.to_string(), "fraud failure in payment");
    }

    #[test]
    fn source_chain_is_walked() {
        let err = StepError(Failure::new(OutcomeCategory::InsufficientFunds));
        assert_eq!(categorize(&err), OutcomeCategory::InsufficientFunds);
    }

    #[test]
    fn io_errors_map_by_kind() {
        let timeout = io::Error::new(io::ErrorKind::TimedOut, "slow");
        let missing = io::Error::new(io::ErrorKind::NotFound, "gone");
        let bad = io::Error::new(io::ErrorKind::InvalidData, "junk");
        assert_eq!(categorize(&timeout), OutcomeCategory::Network);
        assert_eq!(categorize(&missing), OutcomeCategory::NotFound);
        assert_eq!(categorize(&bad), OutcomeCategory::Validation);
    }

    #[test]
    fn io_error_wrapping_failure_uses_inner_category() {
        let err = io::Error::other(Failure::new(OutcomeCategory::Provider));
        assert_eq!(categorize(&err), OutcomeCategory::Provider);
    }

    #[test]
    fn unrecognized_errors_are_unknown() {
        assert_eq!(categorize(&Opaque), OutcomeCategory::Unknown);
        let other = io::Error::other("boom");
        assert_eq!(categorize(&other), OutcomeCategory::Unknown);
    }

    #[test]
    fn json_errors_are_validation() {
        let err = serde_json::from_str::<u32>("nope").unwrap_err();
        assert_eq!(categorize(&err), OutcomeCategory::Validation);
    }

    fn any_category() -> impl Strategy<Value = OutcomeCategory> {
        prop::sample::select(OutcomeCategory::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn categorize_is_total(category in any_category(), depth in 0usize..4, kind in 0usize..6) {
            let kinds = [
                io::ErrorKind::TimedOut,
                io::ErrorKind::NotFound,
                io::ErrorKind::PermissionDenied,
                io::ErrorKind::Other,
                io::ErrorKind::InvalidInput,
                io::ErrorKind::WouldBlock,
            ];
            let mut err: Box<dyn StdError + Send + Sync> = Box::new(Failure::new(category));
            for _ in 0..depth {
                err = Box::new(io::Error::new(kinds[kind], err));
            }
            let resolved = categorize(err.as_ref());
            prop_assert!(OutcomeCategory::ALL.contains(&resolved));
            prop_assert!(!resolved.as_str().is_empty());
        }
    }
}
