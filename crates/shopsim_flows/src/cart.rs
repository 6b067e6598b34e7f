//! Shopping cart.

use crate::catalog::{self, Product};
use crate::context::FlowContext;
use crate::error::Result;
use crate::step::{self, finish};
use shopsim_engine::Endpoint;
use shopsim_trace::{bucket, keys, Attributes, Failure, Operation, OutcomeCategory, SpanId, Transaction};

/// Largest quantity of one product a cart may hold.
pub const MAX_QUANTITY: u32 = 10;

/// One product and its quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartLine {
    /// The product.
    pub product: &'static Product,
    /// Units in the cart, never zero.
    pub quantity: u32,
}

impl CartLine {
    /// Price of the line in cents.
    #[must_use]
    pub fn subtotal_cents(&self) -> u64 {
        self.product.price_cents * u64::from(self.quantity)
    }
}

/// A cart. Only changed after the backend accepted the change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    /// Creates an empty cart.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines in insertion order.
    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    /// Returns true if the cart holds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Total number of units.
    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.lines.iter().map(|line| u64::from(line.quantity)).sum()
    }

    /// Total price in cents.
    #[must_use]
    pub fn total_cents(&self) -> u64 {
        self.lines.iter().map(CartLine::subtotal_cents).sum()
    }

    /// Quantity of `sku` in the cart.
    #[must_use]
    pub fn quantity_of(&self, sku: &str) -> u32 {
        self.lines
            .iter()
            .find(|line| line.product.sku == sku)
            .map_or(0, |line| line.quantity)
    }

    /// Bucketed item count and value.
    #[must_use]
    pub fn attributes(&self) -> Attributes {
        Attributes::new()
            .with(keys::CART_ITEMS, bucket::item_count(self.item_count()))
            .with(keys::CART_VALUE, bucket::amount_cents(self.total_cents()))
    }

    fn set_quantity(&mut self, product: &'static Product, quantity: u32) {
        let existing = self.lines.iter().position(|line| line.product.sku == product.sku);
        match (existing, quantity) {
            (Some(idx), 0) => {
                self.lines.remove(idx);
            }
            (Some(idx), quantity) => self.lines[idx].quantity = quantity,
            (None, 0) => {}
            (None, quantity) => self.lines.push(CartLine { product, quantity }),
        }
    }
}

/// Adds `quantity` units of `sku`.
///
/// Traced as `cart.add_item` with a `cart.add` child.
///
/// # Errors
///
/// Returns `not_found` for an unknown SKU, `validation` for a zero
/// quantity or one above [`MAX_QUANTITY`], or the call's failure.
pub async fn add_item(ctx: &FlowContext, cart: &mut Cart, sku: &str, quantity: u32) -> Result<()> {
    let mut tx = ctx.tracer().start_transaction("cart.add_item", Operation::Ui)?;
    let root = tx.root();
    let result = run_add(ctx, &mut tx, root, cart, sku, quantity).await;
    let attrs = cart.attributes();
    finish(&mut tx, result, attrs)
}

async fn run_add(
    ctx: &FlowContext,
    tx: &mut Transaction,
    parent: SpanId,
    cart: &mut Cart,
    sku: &str,
    quantity: u32,
) -> Result<()> {
    let product = catalog::lookup(sku)
        .ok_or_else(|| Failure::new(OutcomeCategory::NotFound).at("cart_add"))?;
    let updated = cart.quantity_of(sku).saturating_add(quantity);
    if quantity == 0 || updated > MAX_QUANTITY {
        return Err(Failure::new(OutcomeCategory::Validation).at("cart_add").into());
    }

    step::call(ctx, tx, parent, "cart.add", Operation::Api, Endpoint::CartAdd, |_| {
        Attributes::new()
    })
    .await?;
    cart.set_quantity(product, updated);
    Ok(())
}

/// Sets the quantity of a product already in the cart. Zero removes it.
///
/// Traced as `cart.update_item` with a `cart.update` child.
///
/// # Errors
///
/// Returns `not_found` if `sku` is not in the cart, `validation` for a
/// quantity above [`MAX_QUANTITY`], or the call's failure.
pub async fn update_quantity(
    ctx: &FlowContext,
    cart: &mut Cart,
    sku: &str,
    quantity: u32,
) -> Result<()> {
    let mut tx = ctx
        .tracer()
        .start_transaction("cart.update_item", Operation::Ui)?;
    let root = tx.root();
    let result = run_update(ctx, &mut tx, root, cart, sku, quantity).await;
    let attrs = cart.attributes();
    finish(&mut tx, result, attrs)
}

async fn run_update(
    ctx: &FlowContext,
    tx: &mut Transaction,
    parent: SpanId,
    cart: &mut Cart,
    sku: &str,
    quantity: u32,
) -> Result<()> {
    let product = catalog::lookup(sku)
        .filter(|_| cart.quantity_of(sku) > 0)
        .ok_or_else(|| Failure::new(OutcomeCategory::NotFound).at("cart_update"))?;
    if quantity > MAX_QUANTITY {
        return Err(Failure::new(OutcomeCategory::Validation).at("cart_update").into());
    }

    step::call(ctx, tx, parent, "cart.update", Operation::Api, Endpoint::CartUpdate, |_| {
        Attributes::new()
    })
    .await?;
    cart.set_quantity(product, quantity);
    Ok(())
}
