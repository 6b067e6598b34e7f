//! Error types for engine configuration and simulated calls.

use shopsim_trace::{Failure, OutcomeCategory};
use thiserror::Error;

/// Errors raised while loading or encoding simulation settings.
#[derive(Debug, Error)]
pub enum Error {
    /// Settings file could not be read or written.
    #[error("settings i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Settings document is malformed or names unknown values.
    #[error("invalid settings: {0}")]
    Settings(#[from] serde_yaml::Error),

    /// A name did not match any known value.
    #[error("unknown {kind} '{value}'")]
    UnknownName {
        /// What was being parsed.
        kind: &'static str,
        /// The rejected input.
        value: String,
    },
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Outcome of a simulated call that did not succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CallError {
    /// The simulated backend failed.
    #[error("{0}")]
    Failed(#[from] Failure),

    /// The caller's task was cancelled while waiting.
    #[error("simulated call cancelled")]
    Cancelled,
}

impl CallError {
    /// Category of a failed call, `None` when cancelled.
    #[must_use]
    pub const fn category(&self) -> Option<OutcomeCategory> {
        match self {
            Self::Failed(failure) => Some(failure.category),
            Self::Cancelled => None,
        }
    }

    /// Returns true if the call was cancelled.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
