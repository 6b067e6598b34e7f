//! Timed endpoint calls and root closing shared by every workflow.

use crate::context::FlowContext;
use crate::error::{FlowError, Result};
use shopsim_engine::{CallError, Endpoint, Reply};
use shopsim_trace::{bucket, keys, Attributes, Operation, SpanId, Transaction};
use tracing::{debug, warn};

/// Runs one simulated call to `endpoint` as a child span of `parent`.
///
/// The span is closed with the call's outcome: success with the
/// attributes built by `on_success` plus the bucketed latency, failure
/// with the call's category, or cancelled. A cancelled call leaves the
/// tree refusing further children; callers finish with
/// [`finish`], which aborts it.
///
/// # Errors
///
/// Returns [`FlowError::Failed`] or [`FlowError::Cancelled`] after
/// recording them, or [`FlowError::Trace`] if the tree rejected the span.
pub async fn call<F>(
    ctx: &FlowContext,
    tx: &mut Transaction,
    parent: SpanId,
    name: &'static str,
    operation: Operation,
    endpoint: Endpoint,
    on_success: F,
) -> Result<Reply>
where
    F: FnOnce(&Reply) -> Attributes,
{
    let span = tx.start_child(parent, name, operation)?;
    tx.set_attributes(span, Attributes::new().with(keys::ENDPOINT, endpoint))?;

    match ctx.simulator().call(endpoint, ctx.cancel_token()).await {
        Ok(reply) => {
            let attrs = on_success(&reply).with(keys::LATENCY, bucket::latency(reply.delay));
            tx.record_success(span, attrs)?;
            Ok(reply)
        }
        Err(CallError::Cancelled) => {
            debug!(%endpoint, span = %span, "call cancelled");
            tx.record_cancelled(span)?;
            Err(FlowError::Cancelled)
        }
        Err(err) => {
            debug!(%endpoint, span = %span, error = %err, "call failed");
            tx.record_failure(span, &err, Attributes::new())?;
            Err(err.into())
        }
    }
}

/// Closes the root of `tx` according to the workflow's result.
///
/// Success and categorized failures close the root with `attrs`; a
/// cancellation aborts the tree so every open span ends cancelled.
///
/// # Errors
///
/// Returns the workflow's own error, or the tree's error if closing the
/// root failed.
pub fn finish<T>(tx: &mut Transaction, result: Result<T>, attrs: Attributes) -> Result<T> {
    let root = tx.root();
    match result {
        Ok(value) => {
            tx.record_success(root, attrs)?;
            Ok(value)
        }
        Err(err @ FlowError::Failed(_)) => {
            tx.record_failure(root, &err, attrs)?;
            Err(err)
        }
        Err(FlowError::Cancelled) => {
            tx.abort()?;
            Err(FlowError::Cancelled)
        }
        Err(err @ FlowError::Trace(_)) => {
            if !tx.is_exported() {
                if let Err(abort) = tx.abort() {
                    warn!(error = %abort, "abort after instrumentation error failed");
                }
            }
            Err(err)
        }
    }
}
