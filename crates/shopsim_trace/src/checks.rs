//! Invariant checks over exported trees.
//!
//! Collectors can run these on every tree they receive; the soak command
//! fails when any of them reports a violation.

use crate::attribute::keys;
use crate::export::{ExportedSpan, ExportedTrace};
use crate::span::SpanStatus;
use serde::Serialize;
use std::fmt;

/// A broken tree invariant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    /// Which check failed.
    pub check: &'static str,
    /// Name of the offending span.
    pub span: String,
    /// Human-readable message.
    pub message: String,
}

impl Violation {
    fn new(check: &'static str, span: &ExportedSpan, message: impl Into<String>) -> Self {
        Self {
            check,
            span: span.name.clone(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.check, self.span, self.message)
    }
}

/// Runs every check over `trace`.
#[must_use]
pub fn check_trace(trace: &ExportedTrace) -> Vec<Violation> {
    let mut violations = Vec::new();
    for span in trace.root.walk() {
        violations.extend(check_closed(span));
        violations.extend(check_timing(span));
        violations.extend(check_error_category(span));
        for child in &span.children {
            violations.extend(check_nesting(span, child));
        }
    }
    violations
}

/// Every exported span has a terminal status and an end time.
pub fn check_closed(span: &ExportedSpan) -> Option<Violation> {
    if span.status == SpanStatus::Unset || span.end_time_ns.is_none() {
        Some(Violation::new("closed", span, "span exported while still open"))
    } else {
        None
    }
}

/// End time is never before start time.
pub fn check_timing(span: &ExportedSpan) -> Option<Violation> {
    match span.end_time_ns {
        Some(end) if end < span.start_time_ns => Some(Violation::new(
            "timing",
            span,
            format!("ends at {end} before its start {}", span.start_time_ns),
        )),
        _ => None,
    }
}

/// A child starts no earlier and ends no later than its parent.
pub fn check_nesting(parent: &ExportedSpan, child: &ExportedSpan) -> Option<Violation> {
    if child.start_time_ns < parent.start_time_ns {
        return Some(Violation::new(
            "nesting",
            child,
            format!("starts before parent '{}'", parent.name),
        ));
    }
    match (child.end_time_ns, parent.end_time_ns) {
        (Some(child_end), Some(parent_end)) if child_end > parent_end => Some(Violation::new(
            "nesting",
            child,
            format!("closes after parent '{}'", parent.name),
        )),
        _ => None,
    }
}

/// Error spans carry a category; other spans do not.
pub fn check_error_category(span: &ExportedSpan) -> Option<Violation> {
    let category = span.get_attribute(keys::ERROR_CATEGORY);
    match (span.is_error(), category) {
        (true, None) => Some(Violation::new(
            "error-category",
            span,
            "error span without an outcome category",
        )),
        (false, Some(_)) => Some(Violation::new(
            "error-category",
            span,
            "outcome category on a span that did not fail",
        )),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::ExportedValue;
    use crate::span::Operation;
    use std::collections::BTreeMap;

    fn span(name: &str, start: u64, end: Option<u64>, status: SpanStatus) -> ExportedSpan {
        ExportedSpan {
            span_id: name.to_string(),
            parent_span_id: None,
            name: name.to_string(),
            operation: Operation::Api,
            start_time_ns: start,
            end_time_ns: end,
            status,
            attributes: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    #[test]
    fn well_formed_tree_passes() {
        let mut root = span("checkout.submit", 0, Some(100), SpanStatus::Ok);
        let mut failed = span("recommendations.fetch", 10, Some(20), SpanStatus::Error);
        failed.attributes.insert(
            keys::ERROR_CATEGORY.to_string(),
            ExportedValue::String("network".to_string()),
        );
        root.children.push(failed);
        let trace = ExportedTrace {
            trace_id: "t".to_string(),
            root,
        };

        assert!(check_trace(&trace).is_empty());
    }

    #[test]
    fn broken_tree_reports_each_problem() {
        let mut root = span("checkout.submit", 10, Some(100), SpanStatus::Ok);
        root.children
            .push(span("payment.authorize", 5, Some(150), SpanStatus::Error));
        root.children.push(span("order.place", 20, None, SpanStatus::Unset));
        let trace = ExportedTrace {
            trace_id: "t".to_string(),
            root,
        };

        let checks: Vec<_> = check_trace(&trace).iter().map(|v| v.check).collect();
        assert!(checks.contains(&"nesting"));
        assert!(checks.contains(&"error-category"));
        assert!(checks.contains(&"closed"));
    }

    #[test]
    fn inverted_timing_is_flagged() {
        let bad = span("cart.add", 50, Some(10), SpanStatus::Ok);
        let violation = check_timing(&bad).unwrap();
        assert_eq!(violation.to_string(), "[timing] cart.add: ends at 10 before its start 50");
    }
}
