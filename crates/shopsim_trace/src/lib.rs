//! Span tree instrumentation for Shopsim.
//!
//! This crate provides:
//! - The outcome taxonomy and error categorization
//! - Attribute bucketing into fixed low-cardinality labels
//! - Span trees with explicit parent handles and strict lifecycle rules
//! - Trace context stamping
//! - Export to collectors and invariant checks on exported trees
//!
//! # Example
//!
//! ```rust,ignore
//! use shopsim_trace::{Attributes, MemoryCollector, Operation, Tracer};
//!
//! let tracer = Tracer::new(Arc::new(MemoryCollector::new()));
//! let mut tx = tracer.start_transaction("checkout.submit", Operation::Ui)?;
//! let pay = tx.start_child(tx.root(), "payment.authorize", Operation::Payment)?;
//! tx.record_success(pay, Attributes::new())?;
//! tx.record_success(tx.root(), Attributes::new())?;
//! ```

#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod attribute;
pub mod bucket;
pub mod checks;
pub mod clock;
pub mod collector;
pub mod context;
pub mod error;
pub mod export;
pub mod outcome;
pub mod span;
pub mod tree;

pub use attribute::{keys, AttributeValue, Attributes};
pub use bucket::Bucket;
pub use clock::{Clock, ManualClock, SystemClock};
pub use collector::{Collector, JsonLinesCollector, LogCollector, MemoryCollector};
pub use context::{
    DeviceClass, Environment, ExperimentVariant, NetworkClass, Region, SessionId, TraceContext,
};
pub use error::{Error, Result};
pub use export::{ExportedSpan, ExportedTrace, ExportedValue};
pub use outcome::{categorize, Failure, OutcomeCategory};
pub use span::{Operation, Span, SpanId, SpanStatus};
pub use tree::{DefectPolicy, Tracer, Transaction};
