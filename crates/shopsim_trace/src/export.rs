//! Exported, read-only span trees.
//!
//! This is the shape handed to collectors: nested spans with owned,
//! serializable fields.

use crate::attribute::AttributeValue;
use crate::span::{Operation, Span, SpanStatus};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// An exported attribute value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExportedValue {
    /// A boolean flag.
    Bool(bool),
    /// A small integer.
    Int(i64),
    /// A label or rendered identifier.
    String(String),
}

impl ExportedValue {
    /// Returns the value as a string slice if it is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the value as a bool if it is a flag.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<&AttributeValue> for ExportedValue {
    fn from(value: &AttributeValue) -> Self {
        match value {
            AttributeValue::Bool(b) => Self::Bool(*b),
            AttributeValue::Int(i) => Self::Int(*i),
            AttributeValue::Label(_) | AttributeValue::Id(_) => Self::String(value.as_string()),
        }
    }
}

/// One exported span and its children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportedSpan {
    /// Span identifier.
    pub span_id: String,
    /// Parent span identifier, absent for the transaction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_span_id: Option<String>,
    /// Dotted span name.
    pub name: String,
    /// Operation class.
    pub operation: Operation,
    /// Start time in nanoseconds.
    pub start_time_ns: u64,
    /// End time in nanoseconds.
    #[serde(default)]
    pub end_time_ns: Option<u64>,
    /// Terminal status.
    #[serde(default)]
    pub status: SpanStatus,
    /// Bucketed attributes.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, ExportedValue>,
    /// Child spans in creation order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ExportedSpan>,
}

impl From<&Span> for ExportedSpan {
    fn from(span: &Span) -> Self {
        Self {
            span_id: span.id().to_string(),
            parent_span_id: span.parent().map(|p| p.to_string()),
            name: span.name().to_string(),
            operation: span.operation(),
            start_time_ns: span.start_time_ns(),
            end_time_ns: span.end_time_ns(),
            status: span.status(),
            attributes: span
                .attributes()
                .iter()
                .map(|(key, value)| ((*key).to_string(), ExportedValue::from(value)))
                .collect(),
            children: Vec::new(),
        }
    }
}

impl ExportedSpan {
    /// Span duration, if closed.
    #[must_use]
    pub fn duration(&self) -> Option<Duration> {
        self.end_time_ns
            .map(|end| Duration::from_nanos(end.saturating_sub(self.start_time_ns)))
    }

    /// Gets an attribute value by key.
    #[must_use]
    pub fn get_attribute(&self, key: &str) -> Option<&ExportedValue> {
        self.attributes.get(key)
    }

    /// Returns true if this span represents an error.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.status.is_error()
    }

    /// This span and all descendants, depth first.
    #[must_use]
    pub fn walk(&self) -> Vec<&Self> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(span) = stack.pop() {
            out.push(span);
            stack.extend(span.children.iter().rev());
        }
        out
    }
}

/// A complete exported tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportedTrace {
    /// Trace identifier.
    pub trace_id: String,
    /// The transaction span.
    pub root: ExportedSpan,
}

impl ExportedTrace {
    /// Total number of spans.
    #[must_use]
    pub fn span_count(&self) -> usize {
        self.root.walk().len()
    }

    /// Finds the first span with `name`, depth first.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&ExportedSpan> {
        self.root.walk().into_iter().find(|span| span.name == name)
    }

    /// All spans matching `name`.
    #[must_use]
    pub fn find_all(&self, name: &str) -> Vec<&ExportedSpan> {
        self.root
            .walk()
            .into_iter()
            .filter(|span| span.name == name)
            .collect()
    }
}
