//! Error types for span tree operations.
//!
//! Apart from [`Error::Cancelled`], [`Error::Collector`] and the I/O and
//! serialization wrappers, every variant is an instrumentation defect: a
//! programming error in the code driving the tree, never a business outcome.

use crate::span::SpanId;
use thiserror::Error;

/// Errors that can occur while building or exporting a span tree.
#[derive(Debug, Error)]
pub enum Error {
    /// Span name is not a dotted `resource.action` identifier.
    #[error("invalid span name '{0}': expected dotted lowercase identifier")]
    InvalidName(&'static str),

    /// The handle does not belong to this transaction.
    #[error("unknown span {0}")]
    UnknownSpan(SpanId),

    /// A child was requested under a parent that already closed.
    #[error("cannot start child '{child}' under closed span {parent}")]
    ParentClosed {
        /// The closed parent.
        parent: SpanId,
        /// Name of the child that was requested.
        child: &'static str,
    },

    /// The span was already closed; its status and timing are final.
    #[error("span {span} ('{name}') is already closed")]
    AlreadyClosed {
        /// The span that was closed twice.
        span: SpanId,
        /// Its name.
        name: &'static str,
    },

    /// A span was closed while some of its children were still open.
    #[error("span {span} ('{name}') closed with {open} open child span(s)")]
    OpenChildren {
        /// The span being closed.
        span: SpanId,
        /// Its name.
        name: &'static str,
        /// Number of open descendants.
        open: usize,
    },

    /// The tree observed a cancellation and accepts no new children.
    #[error("transaction was cancelled; no new spans may be started")]
    Cancelled,

    /// The tree was already handed to the collector.
    #[error("transaction was already exported")]
    Exported,

    /// The transaction was dropped without ever being exported.
    #[error("transaction '{name}' dropped with {open} open span(s) before export")]
    DroppedOpen {
        /// Root span name.
        name: &'static str,
        /// Spans still open at drop.
        open: usize,
    },

    /// Attributes tried to write a key owned by the tracer.
    #[error("attribute key '{0}' is reserved")]
    ReservedKey(&'static str),

    /// A value outside the bucketed range reached an attribute.
    #[error("attribute '{key}' value {value} is not a bucketed value")]
    Unbucketed {
        /// The attribute key.
        key: &'static str,
        /// The offending value.
        value: i64,
    },

    /// The collector rejected the exported tree.
    #[error("collector error: {0}")]
    Collector(String),

    /// I/O error.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON encoding error.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns true if this error is an instrumentation defect.
    #[must_use]
    pub const fn is_defect(&self) -> bool {
        !matches!(
            self,
            Self::Cancelled | Self::Collector(_) | Self::Io(_) | Self::Json(_)
        )
    }
}

/// Result type alias for span tree operations.
pub type Result<T> = std::result::Result<T, Error>;
