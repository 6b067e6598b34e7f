//! Span data model.
//!
//! A span is one timed unit of work inside a transaction. Spans are owned
//! by their [`Transaction`](crate::Transaction) and only mutated through it.

use crate::attribute::{AttributeValue, Attributes};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque span identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpanId(u64);

impl SpanId {
    /// Wraps a raw identifier.
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw identifier.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Coarse operation class used for grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// A backend API call.
    Api,
    /// A user-initiated interaction.
    Ui,
    /// Payment processing.
    Payment,
    /// Screen navigation or page load.
    Navigation,
    /// Background work detached from a user interaction.
    Task,
}

impl Operation {
    /// Returns the label for this operation class.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Api => "api",
            Self::Ui => "ui",
            Self::Payment => "payment",
            Self::Navigation => "navigation",
            Self::Task => "task",
        }
    }
}

/// Terminal status of a span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanStatus {
    /// The span is still open.
    #[default]
    Unset,
    /// The operation completed successfully.
    Ok,
    /// The operation failed.
    Error,
    /// The owning task was cancelled before the operation finished.
    Cancelled,
}

impl SpanStatus {
    /// Returns true once a terminal status is set.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Unset)
    }

    /// Returns true if this status represents an error.
    #[must_use]
    pub fn is_error(self) -> bool {
        self == Self::Error
    }
}

/// A span representing a unit of work within a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub(crate) id: SpanId,
    pub(crate) parent: Option<SpanId>,
    pub(crate) name: &'static str,
    pub(crate) operation: Operation,
    pub(crate) attributes: Attributes,
    pub(crate) start_time_ns: u64,
    pub(crate) end_time_ns: Option<u64>,
    pub(crate) status: SpanStatus,
}

impl Span {
    pub(crate) fn open(
        id: SpanId,
        parent: Option<SpanId>,
        name: &'static str,
        operation: Operation,
        start_time_ns: u64,
    ) -> Self {
        Self {
            id,
            parent,
            name,
            operation,
            attributes: Attributes::new(),
            start_time_ns,
            end_time_ns: None,
            status: SpanStatus::Unset,
        }
    }

    /// Sets the terminal status and end time. The end time is clamped to
    /// the start time.
    pub(crate) fn close(&mut self, status: SpanStatus, now_ns: u64) {
        self.status = status;
        self.end_time_ns = Some(now_ns.max(self.start_time_ns));
    }

    /// Span identifier.
    #[must_use]
    pub const fn id(&self) -> SpanId {
        self.id
    }

    /// Parent span, `None` for the transaction.
    #[must_use]
    pub const fn parent(&self) -> Option<SpanId> {
        self.parent
    }

    /// Dotted `resource.action` name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Operation class.
    #[must_use]
    pub const fn operation(&self) -> Operation {
        self.operation
    }

    /// Current attributes.
    #[must_use]
    pub const fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Gets an attribute value by key.
    #[must_use]
    pub fn get_attribute(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes.get(key)
    }

    /// Start time in nanoseconds.
    #[must_use]
    pub const fn start_time_ns(&self) -> u64 {
        self.start_time_ns
    }

    /// End time in nanoseconds, `None` while open.
    #[must_use]
    pub const fn end_time_ns(&self) -> Option<u64> {
        self.end_time_ns
    }

    /// Current status.
    #[must_use]
    pub const fn status(&self) -> SpanStatus {
        self.status
    }

    /// Returns true while no terminal status is set.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        !self.status.is_terminal()
    }

    /// Returns true if this is the transaction (no parent).
    #[must_use]
    pub const fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

/// Checks that `name` is a dotted lowercase identifier such as
/// `payment.authorize`.
///
/// # Errors
///
/// Returns [`Error::InvalidName`] otherwise.
pub fn validate_name(name: &'static str) -> Result<()> {
    let valid = name.contains('.')
        && name.split('.').all(|segment| {
            !segment.is_empty()
                && segment
                    .bytes()
                    .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_')
        });
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidName(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn close_clamps_end_to_start() {
        let mut span = Span::open(SpanId::from_raw(1), None, "cart.add", Operation::Ui, 500);
        span.close(SpanStatus::Ok, 100);

        assert_eq!(span.end_time_ns(), Some(500));
        assert!(!span.is_open());
        assert!(span.is_root());
    }

    #[test]
    fn dotted_names() {
        assert!(validate_name("payment.authorize").is_ok());
        assert!(validate_name("checkout.step_2.submit").is_ok());
        assert!(validate_name("checkout").is_err());
        assert!(validate_name("Checkout.Submit").is_err());
        assert!(validate_name("checkout..submit").is_err());
        assert!(validate_name("cart.add item").is_err());
    }

    #[test]
    fn span_id_renders_as_hex() {
        assert_eq!(SpanId::from_raw(255).to_string(), "00000000000000ff");
    }

    #[test]
    fn status_terminality() {
        assert!(!SpanStatus::Unset.is_terminal());
        assert!(SpanStatus::Cancelled.is_terminal());
        assert!(SpanStatus::Error.is_error());
        assert!(!SpanStatus::Ok.is_error());
    }
}
