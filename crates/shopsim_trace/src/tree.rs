//! Span tree lifecycle.
//!
//! A [`Tracer`] opens transactions; a [`Transaction`] owns the whole span
//! tree and is the only way to mutate it. Parents are passed explicitly as
//! [`SpanId`] handles. Closing the root exports the tree to the tracer's
//! [`Collector`].

use crate::attribute::{keys, Attributes};
use crate::clock::{Clock, SystemClock};
use crate::collector::Collector;
use crate::context::TraceContext;
use crate::error::{Error, Result};
use crate::export::{ExportedSpan, ExportedTrace};
use crate::outcome::{categorize, OutcomeCategory};
use crate::span::{validate_name, Operation, Span, SpanId, SpanStatus};
use std::collections::HashMap;
use std::error::Error as StdError;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// What to do when an instrumentation defect is detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefectPolicy {
    /// Panic with the defect.
    Panic,
    /// Log the defect at error level and return it.
    Report,
}

impl Default for DefectPolicy {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            Self::Panic
        } else {
            Self::Report
        }
    }
}

/// Opens transactions and carries what they share: clock, collector,
/// optional context and the defect policy.
#[derive(Debug, Clone)]
pub struct Tracer {
    clock: Arc<dyn Clock>,
    collector: Arc<dyn Collector>,
    context: Option<TraceContext>,
    policy: DefectPolicy,
    ids: Arc<AtomicU64>,
}

impl Tracer {
    /// Creates a tracer exporting to `collector`.
    #[must_use]
    pub fn new(collector: Arc<dyn Collector>) -> Self {
        Self {
            clock: Arc::new(SystemClock::new()),
            collector,
            context: None,
            policy: DefectPolicy::default(),
            ids: Arc::new(AtomicU64::new(rand::random::<u64>() >> 1)),
        }
    }

    /// Sets the clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Stamps `context` onto every span at creation.
    #[must_use]
    pub const fn with_context(mut self, context: TraceContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Sets the defect policy.
    #[must_use]
    pub const fn with_defect_policy(mut self, policy: DefectPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The context stamped at creation, if any.
    #[must_use]
    pub const fn context(&self) -> Option<&TraceContext> {
        self.context.as_ref()
    }

    /// Current defect policy.
    #[must_use]
    pub const fn defect_policy(&self) -> DefectPolicy {
        self.policy
    }

    fn next_id(&self) -> SpanId {
        SpanId::from_raw(self.ids.fetch_add(1, Ordering::Relaxed))
    }

    /// Opens a transaction, the root span of a new tree.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidName`] if `name` is not dotted.
    pub fn start_transaction(&self, name: &'static str, operation: Operation) -> Result<Transaction> {
        if let Err(err) = validate_name(name) {
            return Err(surface(self.policy, err));
        }
        let id = self.next_id();
        let mut root = Span::open(id, None, name, operation, self.clock.now_ns());
        if let Some(ctx) = &self.context {
            root.attributes.merge(ctx.attributes());
        }
        debug!(span = %id, name, "transaction started");

        let mut index = HashMap::new();
        index.insert(id, 0);
        Ok(Transaction {
            trace_id: rand::random(),
            spans: vec![root],
            index,
            state: TreeState::Active,
            tracer: self.clone(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TreeState {
    Active,
    Cancelled,
    Exported,
}

/// A span tree rooted at one transaction span.
///
/// Children are always stored after their parent.
#[derive(Debug)]
pub struct Transaction {
    trace_id: u64,
    spans: Vec<Span>,
    index: HashMap<SpanId, usize>,
    state: TreeState,
    tracer: Tracer,
}

impl Transaction {
    /// The root span handle.
    #[must_use]
    pub fn root(&self) -> SpanId {
        self.spans[0].id
    }

    /// Trace identifier shared by every span in the tree.
    #[must_use]
    pub const fn trace_id(&self) -> u64 {
        self.trace_id
    }

    /// Looks up a span.
    #[must_use]
    pub fn span(&self, id: SpanId) -> Option<&Span> {
        self.index.get(&id).map(|&idx| &self.spans[idx])
    }

    /// All spans in creation order.
    #[must_use]
    pub fn spans(&self) -> &[Span] {
        &self.spans
    }

    /// Returns true once a span in this tree was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.state == TreeState::Cancelled
    }

    /// Returns true once the tree was handed to the collector.
    #[must_use]
    pub fn is_exported(&self) -> bool {
        self.state == TreeState::Exported
    }

    fn defect(&self, err: Error) -> Error {
        surface(self.tracer.policy, err)
    }

    fn position(&self, id: SpanId) -> Result<usize> {
        match self.index.get(&id) {
            Some(&idx) => Ok(idx),
            None => Err(self.defect(Error::UnknownSpan(id))),
        }
    }

    fn ensure_mutable(&self) -> Result<()> {
        if self.state == TreeState::Exported {
            return Err(self.defect(Error::Exported));
        }
        Ok(())
    }

    /// Opens a child span under `parent`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] once the tree observed a cancellation,
    /// and a defect if the parent is closed or unknown, the name is not
    /// dotted, or the tree was exported.
    pub fn start_child(
        &mut self,
        parent: SpanId,
        name: &'static str,
        operation: Operation,
    ) -> Result<SpanId> {
        self.ensure_mutable()?;
        if self.state == TreeState::Cancelled {
            debug!(parent = %parent, name, "child refused on cancelled transaction");
            return Err(Error::Cancelled);
        }
        if let Err(err) = validate_name(name) {
            return Err(self.defect(err));
        }
        let parent_idx = self.position(parent)?;
        if !self.spans[parent_idx].is_open() {
            return Err(self.defect(Error::ParentClosed { parent, child: name }));
        }

        let id = self.tracer.next_id();
        let mut span = Span::open(id, Some(parent), name, operation, self.tracer.clock.now_ns());
        if let Some(ctx) = &self.tracer.context {
            span.attributes.merge(ctx.attributes());
        }
        debug!(span = %id, parent = %parent, name, "span started");

        self.index.insert(id, self.spans.len());
        self.spans.push(span);
        Ok(id)
    }

    /// Merges attributes into an open span.
    ///
    /// # Errors
    ///
    /// Returns a defect if the span is closed or unknown, the attributes
    /// fall outside the schema, or the tree was exported.
    pub fn set_attributes(&mut self, span: SpanId, attrs: Attributes) -> Result<()> {
        self.ensure_mutable()?;
        if let Err(err) = attrs.validate() {
            return Err(self.defect(err));
        }
        let idx = self.position(span)?;
        let target = &self.spans[idx];
        if !target.is_open() {
            return Err(self.defect(Error::AlreadyClosed {
                span,
                name: target.name,
            }));
        }
        self.spans[idx].attributes.merge(attrs);
        Ok(())
    }

    /// Closes a span as successful.
    ///
    /// # Errors
    ///
    /// See [`Transaction::set_attributes`]; additionally fails if the span
    /// still has open children or, for the root, if export fails.
    pub fn record_success(&mut self, span: SpanId, attrs: Attributes) -> Result<()> {
        self.close(span, SpanStatus::Ok, attrs, None)
    }

    /// Closes a span as failed, storing the error's outcome category
    /// under [`keys::ERROR_CATEGORY`]. Only the category is recorded.
    ///
    /// # Errors
    ///
    /// Same as [`Transaction::record_success`].
    pub fn record_failure(
        &mut self,
        span: SpanId,
        error: &(dyn StdError + 'static),
        attrs: Attributes,
    ) -> Result<()> {
        let category = categorize(error);
        self.close(span, SpanStatus::Error, attrs, Some(category))
    }

    /// Closes a span as cancelled. The tree refuses new children from
    /// now on.
    ///
    /// # Errors
    ///
    /// Same as [`Transaction::record_success`].
    pub fn record_cancelled(&mut self, span: SpanId) -> Result<()> {
        self.close(span, SpanStatus::Cancelled, Attributes::new(), None)?;
        if self.state == TreeState::Active {
            self.state = TreeState::Cancelled;
        }
        Ok(())
    }

    /// Closes every open span as cancelled, children first, and exports
    /// the tree.
    ///
    /// # Errors
    ///
    /// Returns a defect if the tree was already exported, or the
    /// collector's error.
    pub fn abort(&mut self) -> Result<()> {
        self.ensure_mutable()?;
        self.state = TreeState::Cancelled;
        let now = self.tracer.clock.now_ns();
        for span in self.spans.iter_mut().rev().filter(|s| s.is_open()) {
            span.close(SpanStatus::Cancelled, now);
        }
        warn!(trace_id = %format_args!("{:016x}", self.trace_id), "transaction aborted");
        self.export()
    }

    fn close(
        &mut self,
        span: SpanId,
        status: SpanStatus,
        attrs: Attributes,
        category: Option<OutcomeCategory>,
    ) -> Result<()> {
        self.ensure_mutable()?;
        if let Err(err) = attrs.validate() {
            return Err(self.defect(err));
        }
        let idx = self.position(span)?;
        let name = self.spans[idx].name;
        if !self.spans[idx].is_open() {
            return Err(self.defect(Error::AlreadyClosed { span, name }));
        }
        let open = self.open_descendants(idx);
        if open > 0 {
            return Err(self.defect(Error::OpenChildren { span, name, open }));
        }

        let now = self.tracer.clock.now_ns();
        let target = &mut self.spans[idx];
        target.attributes.merge(attrs);
        if let Some(category) = category {
            target.attributes.insert(keys::ERROR_CATEGORY, category);
        }
        target.close(status, now);
        debug!(span = %span, name, ?status, "span closed");

        if target.is_root() {
            self.export()?;
        }
        Ok(())
    }

    fn open_descendants(&self, idx: usize) -> usize {
        let ancestor = self.spans[idx].id;
        self.spans[idx + 1..]
            .iter()
            .filter(|span| span.is_open() && self.descends_from(span, ancestor))
            .count()
    }

    fn descends_from(&self, span: &Span, ancestor: SpanId) -> bool {
        let mut parent = span.parent;
        while let Some(id) = parent {
            if id == ancestor {
                return true;
            }
            parent = self.span(id).and_then(Span::parent);
        }
        false
    }

    fn export(&mut self) -> Result<()> {
        let trace = self.build_export();
        self.state = TreeState::Exported;
        info!(
            trace_id = %trace.trace_id,
            name = %trace.root.name,
            status = ?trace.root.status,
            spans = trace.span_count(),
            "transaction exported"
        );
        self.tracer.collector.collect(trace)
    }

    fn build_export(&self) -> ExportedTrace {
        let mut children: HashMap<SpanId, Vec<usize>> = HashMap::new();
        for (idx, span) in self.spans.iter().enumerate() {
            if let Some(parent) = span.parent {
                children.entry(parent).or_default().push(idx);
            }
        }
        ExportedTrace {
            trace_id: format!("{:016x}", self.trace_id),
            root: self.export_span(0, &children),
        }
    }

    fn export_span(&self, idx: usize, children: &HashMap<SpanId, Vec<usize>>) -> ExportedSpan {
        let span = &self.spans[idx];
        let mut exported = ExportedSpan::from(span);
        if let Some(kids) = children.get(&span.id) {
            exported.children = kids
                .iter()
                .map(|&child| self.export_span(child, children))
                .collect();
        }
        exported
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if self.state == TreeState::Exported || std::thread::panicking() {
            return;
        }
        let err = Error::DroppedOpen {
            name: self.spans[0].name,
            open: self.spans.iter().filter(|span| span.is_open()).count(),
        };
        error!(
            trace_id = %format_args!("{:016x}", self.trace_id),
            "transaction dropped before export"
        );
        let _ = surface(self.tracer.policy, err);
    }
}

fn surface(policy: DefectPolicy, err: Error) -> Error {
    error!(defect = %err, "instrumentation defect");
    assert!(
        policy != DefectPolicy::Panic,
        "instrumentation defect: {err}"
    );
    err
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::AttributeValue;
    use crate::bucket;
    use crate::clock::ManualClock;
    use crate::collector::MemoryCollector;
    use crate::outcome::Failure;
    use std::time::Duration;

    fn reporting_tracer() -> (Tracer, Arc<MemoryCollector>, ManualClock) {
        let collector = Arc::new(MemoryCollector::new());
        let clock = ManualClock::new();
        let tracer = Tracer::new(collector.clone())
            .with_clock(Arc::new(clock.clone()))
            .with_defect_policy(DefectPolicy::Report);
        (tracer, collector, clock)
    }

    #[test]
    fn root_with_one_child_exports_two_spans() {
        let (tracer, collector, clock) = reporting_tracer();
        let mut tx = tracer.start_transaction("checkout.submit", Operation::Ui).unwrap();
        let root = tx.root();
        let child = tx.start_child(root, "payment.authorize", Operation::Payment).unwrap();
        clock.advance(Duration::from_millis(20));
        tx.record_success(child, Attributes::new()).unwrap();
        clock.advance(Duration::from_millis(5));
        tx.record_success(root, Attributes::new()).unwrap();

        let traces = collector.traces();
        assert_eq!(traces.len(), 1);
        let exported = &traces[0];
        assert_eq!(exported.span_count(), 2);
        assert_eq!(exported.root.children.len(), 1);
        assert_eq!(exported.root.status, SpanStatus::Ok);
        assert_eq!(exported.root.children[0].status, SpanStatus::Ok);
        assert_eq!(exported.root.children[0].end_time_ns, Some(20_000_000));
        assert_eq!(exported.root.end_time_ns, Some(25_000_000));
        assert!(tx.is_exported());
    }

    #[test]
    fn failure_records_category_only() {
        let (tracer, collector, _) = reporting_tracer();
        let mut tx = tracer.start_transaction("search.query", Operation::Ui).unwrap();
        let root = tx.root();
        let recs = tx.start_child(root, "recommendations.fetch", Operation::Api).unwrap();
        tx.record_failure(
            recs,
            &Failure::new(OutcomeCategory::Network),
            Attributes::new().with(keys::RECOMMENDATIONS, bucket::result_count(0)),
        )
        .unwrap();

        let span = tx.span(recs).unwrap();
        assert_eq!(span.status(), SpanStatus::Error);
        assert_eq!(
            span.get_attribute(keys::ERROR_CATEGORY),
            Some(&AttributeValue::Label("network"))
        );
        tx.record_success(root, Attributes::new()).unwrap();

        let exported = &collector.traces()[0];
        assert_eq!(exported.root.status, SpanStatus::Ok);
        assert_eq!(exported.root.children[0].status, SpanStatus::Error);
    }

    #[test]
    fn closing_twice_is_a_defect() {
        let (tracer, _, _) = reporting_tracer();
        let mut tx = tracer.start_transaction("cart.add_item", Operation::Ui).unwrap();
        let root = tx.root();
        let child = tx.start_child(root, "api.cart_add", Operation::Api).unwrap();
        tx.record_success(child, Attributes::new()).unwrap();
        let end = tx.span(child).unwrap().end_time_ns();

        let err = tx
            .record_failure(child, &Failure::new(OutcomeCategory::Unknown), Attributes::new())
            .unwrap_err();
        assert!(matches!(err, Error::AlreadyClosed { .. }));
        assert!(err.is_defect());
        assert_eq!(tx.span(child).unwrap().status(), SpanStatus::Ok);
        assert_eq!(tx.span(child).unwrap().end_time_ns(), end);
        tx.record_success(root, Attributes::new()).unwrap();
    }

    #[test]
    fn parent_cannot_close_before_children() {
        let (tracer, collector, _) = reporting_tracer();
        let mut tx = tracer.start_transaction("checkout.submit", Operation::Ui).unwrap();
        let root = tx.root();
        let step = tx.start_child(root, "checkout.validate", Operation::Api).unwrap();
        let nested = tx.start_child(step, "address.lookup", Operation::Api).unwrap();

        let err = tx.record_success(root, Attributes::new()).unwrap_err();
        assert!(matches!(err, Error::OpenChildren { open: 2, .. }));
        assert!(collector.is_empty());
        assert!(tx.span(root).unwrap().is_open());

        tx.record_success(nested, Attributes::new()).unwrap();
        tx.record_success(step, Attributes::new()).unwrap();
        tx.record_success(root, Attributes::new()).unwrap();
        assert_eq!(collector.len(), 1);
    }

    #[test]
    fn child_under_closed_parent_is_rejected() {
        let (tracer, _, _) = reporting_tracer();
        let mut tx = tracer.start_transaction("checkout.submit", Operation::Ui).unwrap();
        let root = tx.root();
        let step = tx.start_child(root, "inventory.reserve", Operation::Api).unwrap();
        tx.record_success(step, Attributes::new()).unwrap();

        let err = tx.start_child(step, "inventory.retry", Operation::Api).unwrap_err();
        assert!(matches!(err, Error::ParentClosed { .. }));
        tx.record_success(root, Attributes::new()).unwrap();
    }

    #[test]
    fn exported_tree_rejects_mutation() {
        let (tracer, _, _) = reporting_tracer();
        let mut tx = tracer.start_transaction("order.place", Operation::Api).unwrap();
        let root = tx.root();
        tx.record_success(root, Attributes::new()).unwrap();

        assert!(matches!(
            tx.start_child(root, "order.confirm", Operation::Api),
            Err(Error::Exported)
        ));
        assert!(matches!(
            tx.set_attributes(root, Attributes::new()),
            Err(Error::Exported)
        ));
    }

    #[test]
    fn cancellation_blocks_new_children_and_abort_exports() {
        let (tracer, collector, _) = reporting_tracer();
        let mut tx = tracer.start_transaction("checkout.submit", Operation::Ui).unwrap();
        let root = tx.root();
        let pay = tx.start_child(root, "payment.authorize", Operation::Payment).unwrap();
        tx.record_cancelled(pay).unwrap();

        let err = tx.start_child(root, "order.place", Operation::Api).unwrap_err();
        assert!(matches!(err, Error::Cancelled));
        assert!(!err.is_defect());

        tx.abort().unwrap();
        let exported = &collector.traces()[0];
        assert_eq!(exported.span_count(), 2);
        assert_eq!(exported.root.status, SpanStatus::Cancelled);
        assert_eq!(exported.root.children[0].status, SpanStatus::Cancelled);
    }

    #[test]
    fn reserved_key_in_success_attrs_is_rejected() {
        let (tracer, _, _) = reporting_tracer();
        let mut tx = tracer.start_transaction("search.query", Operation::Ui).unwrap();
        let root = tx.root();
        let attrs = Attributes::new().with(keys::ERROR_CATEGORY, OutcomeCategory::Fraud);

        assert!(matches!(
            tx.record_success(root, attrs),
            Err(Error::ReservedKey(_))
        ));
        assert!(tx.span(root).unwrap().is_open());
        tx.record_success(root, Attributes::new()).unwrap();
    }

    #[test]
    fn invalid_names_are_rejected() {
        let (tracer, _, _) = reporting_tracer();
        assert!(matches!(
            tracer.start_transaction("Checkout", Operation::Ui),
            Err(Error::InvalidName("Checkout"))
        ));
    }

    #[test]
    fn dropping_an_open_tree_is_reported_without_export() {
        let (tracer, collector, _) = reporting_tracer();
        let mut tx = tracer.start_transaction("checkout.submit", Operation::Ui).unwrap();
        let root = tx.root();
        tx.start_child(root, "payment.authorize", Operation::Payment).unwrap();
        drop(tx);

        assert!(collector.is_empty());
    }

    #[test]
    #[should_panic(expected = "dropped with 2 open span(s)")]
    fn panic_policy_panics_on_dropped_open_tree() {
        let tracer = Tracer::new(Arc::new(MemoryCollector::new()))
            .with_defect_policy(DefectPolicy::Panic);
        let mut tx = tracer.start_transaction("checkout.submit", Operation::Ui).unwrap();
        let root = tx.root();
        tx.start_child(root, "payment.authorize", Operation::Payment).unwrap();
        drop(tx);
    }

    #[test]
    fn exported_tree_drops_quietly_under_panic_policy() {
        let collector = Arc::new(MemoryCollector::new());
        let tracer = Tracer::new(collector.clone()).with_defect_policy(DefectPolicy::Panic);
        let mut tx = tracer.start_transaction("order.place", Operation::Api).unwrap();
        let root = tx.root();
        tx.record_success(root, Attributes::new()).unwrap();
        drop(tx);

        assert_eq!(collector.len(), 1);
    }

    #[test]
    #[should_panic(expected = "instrumentation defect")]
    fn panic_policy_panics_on_double_close() {
        let tracer = Tracer::new(Arc::new(MemoryCollector::new()))
            .with_defect_policy(DefectPolicy::Panic);
        let mut tx = tracer.start_transaction("cart.add_item", Operation::Ui).unwrap();
        let root = tx.root();
        let child = tx.start_child(root, "api.cart_add", Operation::Api).unwrap();
        tx.record_success(child, Attributes::new()).unwrap();
        let _ = tx.record_success(child, Attributes::new());
    }
}
