//! Checkout: address, inventory, shipping, payment, order placement and
//! the order notification.

use crate::cart::Cart;
use crate::context::FlowContext;
use crate::error::{FlowError, Result};
use crate::step::{self, finish};
use shopsim_engine::{Endpoint, SuccessKind};
use shopsim_trace::{bucket, keys, Attributes, Failure, Operation, OutcomeCategory, SpanId, Transaction};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Provider failures retried per payment before giving up.
pub const MAX_PAYMENT_RETRIES: u32 = 2;

/// A placed order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Receipt {
    /// Units ordered.
    pub item_count: u64,
    /// Order total in cents.
    pub total_cents: u64,
    /// Inventory could not be reserved immediately; the order still
    /// stands.
    pub backorder: bool,
    /// The payment required a verification challenge.
    pub challenged: bool,
    /// Provider failures retried before the payment went through.
    pub payment_retries: u32,
}

/// A completed checkout and its detached notification task.
#[derive(Debug)]
pub struct Checkout {
    /// The order.
    pub receipt: Receipt,
    /// Notification dispatch. Its failure does not affect the order.
    pub notification: JoinHandle<Result<()>>,
}

#[derive(Debug, Clone, Copy)]
struct Payment {
    retries: u32,
    challenged: bool,
}

/// Checks out `cart`.
///
/// Traced as `checkout.submit` with children `address.validate`,
/// `inventory.reserve`, `shipping.quote`, `payment.process` (holding one
/// `payment.attempt` per try and an optional `payment.challenge`) and
/// `order.place`. After the order is placed, the notification runs in
/// its own task and transaction, detached from this task's cancellation.
///
/// Must be called from within a tokio runtime.
///
/// # Errors
///
/// Returns `validation` for an empty cart, the first failing step's
/// failure, or [`FlowError::Cancelled`].
pub async fn checkout(ctx: &FlowContext, cart: &Cart) -> Result<Checkout> {
    let mut tx = ctx
        .tracer()
        .start_transaction("checkout.submit", Operation::Ui)?;
    let root = tx.root();
    let result = place_order(ctx, &mut tx, root, cart).await;

    let mut attrs = cart.attributes();
    if let Ok(receipt) = &result {
        attrs.insert(keys::BACKORDER, receipt.backorder);
        attrs.insert(keys::PAYMENT_CHALLENGE, receipt.challenged);
    }
    let receipt = finish(&mut tx, result, attrs)?;
    info!(
        items = receipt.item_count,
        backorder = receipt.backorder,
        challenged = receipt.challenged,
        "order placed"
    );

    let notification = spawn_notification(ctx.detached());
    Ok(Checkout {
        receipt,
        notification,
    })
}

async fn place_order(
    ctx: &FlowContext,
    tx: &mut Transaction,
    root: SpanId,
    cart: &Cart,
) -> Result<Receipt> {
    if cart.is_empty() {
        return Err(Failure::new(OutcomeCategory::Validation).at("checkout").into());
    }

    step::call(
        ctx,
        tx,
        root,
        "address.validate",
        Operation::Api,
        Endpoint::AddressValidation,
        |_| Attributes::new(),
    )
    .await?;

    let reserved = step::call(
        ctx,
        tx,
        root,
        "inventory.reserve",
        Operation::Api,
        Endpoint::InventoryReserve,
        |reply| Attributes::new().with(keys::BACKORDER, reply.kind == SuccessKind::Backorder),
    )
    .await?;
    let backorder = reserved.kind == SuccessKind::Backorder;
    if backorder {
        info!("inventory on backorder, order continues");
    }

    step::call(
        ctx,
        tx,
        root,
        "shipping.quote",
        Operation::Api,
        Endpoint::ShippingQuote,
        |_| Attributes::new(),
    )
    .await?;

    let payment = authorize_payment(ctx, tx, root, cart).await?;

    step::call(
        ctx,
        tx,
        root,
        "order.place",
        Operation::Api,
        Endpoint::OrderPlace,
        |_| cart.attributes(),
    )
    .await?;

    Ok(Receipt {
        item_count: cart.item_count(),
        total_cents: cart.total_cents(),
        backorder,
        challenged: payment.challenged,
        payment_retries: payment.retries,
    })
}

async fn authorize_payment(
    ctx: &FlowContext,
    tx: &mut Transaction,
    parent: SpanId,
    cart: &Cart,
) -> Result<Payment> {
    let span = tx.start_child(parent, "payment.process", Operation::Payment)?;
    tx.set_attributes(
        span,
        Attributes::new().with(keys::CART_VALUE, bucket::amount_cents(cart.total_cents())),
    )?;

    let mut retries = 0;
    let attempt = loop {
        let result = step::call(
            ctx,
            tx,
            span,
            "payment.attempt",
            Operation::Payment,
            Endpoint::Payment,
            |reply| {
                Attributes::new().with(
                    keys::PAYMENT_CHALLENGE,
                    reply.kind == SuccessKind::VerificationRequired,
                )
            },
        )
        .await;
        match result {
            Err(FlowError::Failed(failure))
                if failure.category == OutcomeCategory::Provider
                    && retries < MAX_PAYMENT_RETRIES =>
            {
                retries += 1;
                warn!(retries, "payment provider failed, retrying");
            }
            other => break other,
        }
    };

    let outcome = match attempt {
        Ok(reply) if reply.kind == SuccessKind::VerificationRequired => {
            verify(ctx, tx, span).await.map(|()| true)
        }
        Ok(_) => Ok(false),
        Err(err) => Err(err),
    };

    let attrs = Attributes::new().with(keys::PAYMENT_RETRIES, bucket::retry_count(retries));
    match outcome {
        Ok(challenged) => {
            tx.record_success(span, attrs.with(keys::PAYMENT_CHALLENGE, challenged))?;
            Ok(Payment {
                retries,
                challenged,
            })
        }
        Err(err @ FlowError::Failed(_)) => {
            tx.record_failure(span, &err, attrs)?;
            Err(err)
        }
        // Left open; the root's abort closes it.
        Err(err) => Err(err),
    }
}

async fn verify(ctx: &FlowContext, tx: &mut Transaction, parent: SpanId) -> Result<()> {
    step::call(
        ctx,
        tx,
        parent,
        "payment.challenge",
        Operation::Payment,
        Endpoint::ThreeDsChallenge,
        |_| Attributes::new(),
    )
    .await
    .map(|_| ())
}

fn spawn_notification(ctx: FlowContext) -> JoinHandle<Result<()>> {
    tokio::spawn(async move { notify(&ctx).await })
}

/// Dispatches the order notification as its own transaction,
/// `notification.dispatch` with one `notification.send` child.
///
/// # Errors
///
/// Returns the notification call's failure or cancellation.
pub async fn notify(ctx: &FlowContext) -> Result<()> {
    let mut tx = ctx
        .tracer()
        .start_transaction("notification.dispatch", Operation::Task)?;
    let root = tx.root();
    let result = step::call(
        ctx,
        &mut tx,
        root,
        "notification.send",
        Operation::Api,
        Endpoint::Notification,
        |_| Attributes::new(),
    )
    .await
    .map(|_| ());
    if let Err(err) = &result {
        warn!(error = %err, "order notification failed");
    }
    finish(&mut tx, result, Attributes::new())
}
