//! Error types for workflows.

use shopsim_engine::CallError;
use shopsim_trace::{Failure, OutcomeCategory};
use thiserror::Error;

/// Why a workflow did not complete.
#[derive(Debug, Error)]
pub enum FlowError {
    /// A simulated call or a local check failed with a categorized
    /// failure.
    #[error("{0}")]
    Failed(#[from] Failure),

    /// The workflow's task was cancelled.
    #[error("workflow cancelled")]
    Cancelled,

    /// The span tree rejected an operation.
    #[error("instrumentation error: {0}")]
    Trace(shopsim_trace::Error),
}

impl FlowError {
    /// Category of a failed workflow, `None` otherwise.
    #[must_use]
    pub const fn category(&self) -> Option<OutcomeCategory> {
        match self {
            Self::Failed(failure) => Some(failure.category),
            Self::Cancelled | Self::Trace(_) => None,
        }
    }

    /// Returns true if the workflow was cancelled.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<CallError> for FlowError {
    fn from(err: CallError) -> Self {
        match err {
            CallError::Failed(failure) => Self::Failed(failure),
            CallError::Cancelled => Self::Cancelled,
        }
    }
}

impl From<shopsim_trace::Error> for FlowError {
    fn from(err: shopsim_trace::Error) -> Self {
        match err {
            shopsim_trace::Error::Cancelled => Self::Cancelled,
            other => Self::Trace(other),
        }
    }
}

/// Result type alias for workflows.
pub type Result<T> = std::result::Result<T, FlowError>;
