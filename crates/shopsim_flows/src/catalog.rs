//! Product catalog, product pages and recommendations.

use crate::context::FlowContext;
use crate::error::{FlowError, Result};
use crate::step::{self, finish};
use shopsim_engine::Endpoint;
use shopsim_trace::{bucket, keys, Attributes, Failure, Operation, OutcomeCategory, SpanId, Transaction};
use tracing::warn;

/// Most recommendations returned for one product.
pub const MAX_RECOMMENDATIONS: usize = 4;

/// A catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Product {
    /// Stock keeping unit.
    pub sku: &'static str,
    /// Display title.
    pub title: &'static str,
    /// Department used for recommendations.
    pub department: &'static str,
    /// Unit price in cents.
    pub price_cents: u64,
}

const fn product(
    sku: &'static str,
    title: &'static str,
    department: &'static str,
    price_cents: u64,
) -> Product {
    Product {
        sku,
        title,
        department,
        price_cents,
    }
}

/// Fixture catalog.
pub const CATALOG: [Product; 10] = [
    product("sku-1001", "Trail Running Shoes", "footwear", 8_999),
    product("sku-1002", "Leather Hiking Boots", "footwear", 15_900),
    product("sku-1003", "Wool Running Socks", "footwear", 1_499),
    product("sku-2001", "Insulated Water Bottle", "outdoor", 2_450),
    product("sku-2002", "Two Person Tent", "outdoor", 27_500),
    product("sku-2003", "Trekking Poles", "outdoor", 6_800),
    product("sku-2004", "Headlamp", "outdoor", 3_200),
    product("sku-3001", "Running Jacket", "apparel", 11_000),
    product("sku-3002", "Merino Base Layer", "apparel", 7_500),
    product("sku-3003", "Running Cap", "apparel", 1_999),
];

/// Looks up a product by SKU.
pub fn lookup(sku: &str) -> Option<&'static Product> {
    CATALOG.iter().find(|p| p.sku == sku)
}

/// Products whose title contains `query`, ignoring case.
pub fn matching(query: &str) -> Vec<&'static Product> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return Vec::new();
    }
    CATALOG
        .iter()
        .filter(|p| p.title.to_lowercase().contains(&query))
        .collect()
}

/// Other products from the same department as `sku`.
pub fn related(sku: &str) -> Vec<&'static Product> {
    let Some(seed) = lookup(sku) else {
        return Vec::new();
    };
    CATALOG
        .iter()
        .filter(|p| p.department == seed.department && p.sku != seed.sku)
        .take(MAX_RECOMMENDATIONS)
        .collect()
}

/// A product page with its recommendations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductPage {
    /// The product shown.
    pub product: &'static Product,
    /// Related products, empty if recommendations were unavailable.
    pub recommendations: Vec<&'static Product>,
}

/// Fetches one product.
///
/// Traced as `product.view` with a single `product.fetch` child.
///
/// # Errors
///
/// Returns a `not_found` failure for an unknown SKU, or the simulated
/// call's failure or cancellation.
pub async fn product_detail(ctx: &FlowContext, sku: &str) -> Result<&'static Product> {
    let mut tx = ctx
        .tracer()
        .start_transaction("product.view", Operation::Navigation)?;
    let root = tx.root();
    let result = fetch_product(ctx, &mut tx, root, sku).await;
    let attrs = Attributes::new().with(keys::PRODUCT_FOUND, result.is_ok());
    finish(&mut tx, result, attrs)
}

/// Fetches a product page: the product, then its recommendations.
///
/// Recommendations are best effort. Their failure is recorded on their
/// own span and the page is returned without them.
///
/// # Errors
///
/// Same as [`product_detail`].
pub async fn browse(ctx: &FlowContext, sku: &str) -> Result<ProductPage> {
    let mut tx = ctx
        .tracer()
        .start_transaction("product.browse", Operation::Navigation)?;
    let root = tx.root();

    let result = load_page(ctx, &mut tx, root, sku).await;

    let mut attrs = Attributes::new().with(keys::PRODUCT_FOUND, result.is_ok());
    if let Ok(page) = &result {
        attrs.insert(
            keys::RECOMMENDATIONS,
            bucket::result_count(page.recommendations.len() as u64),
        );
    }
    finish(&mut tx, result, attrs)
}

async fn load_page(
    ctx: &FlowContext,
    tx: &mut Transaction,
    parent: SpanId,
    sku: &str,
) -> Result<ProductPage> {
    let product = fetch_product(ctx, tx, parent, sku).await?;
    let recommendations = recommendations(ctx, tx, parent, product.sku).await?;
    Ok(ProductPage {
        product,
        recommendations,
    })
}

async fn fetch_product(
    ctx: &FlowContext,
    tx: &mut Transaction,
    parent: SpanId,
    sku: &str,
) -> Result<&'static Product> {
    let product = lookup(sku);
    step::call(
        ctx,
        tx,
        parent,
        "product.fetch",
        Operation::Api,
        Endpoint::ProductDetail,
        |_| Attributes::new().with(keys::PRODUCT_FOUND, product.is_some()),
    )
    .await?;
    product.ok_or_else(|| Failure::new(OutcomeCategory::NotFound).at("product_detail").into())
}

/// Fetches recommendations for `sku` under `parent`, swallowing
/// categorized failures.
pub(crate) async fn recommendations(
    ctx: &FlowContext,
    tx: &mut Transaction,
    parent: SpanId,
    sku: &str,
) -> Result<Vec<&'static Product>> {
    let related = related(sku);
    let fetched = step::call(
        ctx,
        tx,
        parent,
        "recommendations.fetch",
        Operation::Api,
        Endpoint::Recommendations,
        |_| {
            Attributes::new().with(
                keys::RECOMMENDATIONS,
                bucket::result_count(related.len() as u64),
            )
        },
    )
    .await;

    match fetched {
        Ok(_) => Ok(related),
        Err(FlowError::Failed(failure)) => {
            warn!(%failure, "recommendations unavailable");
            Ok(Vec::new())
        }
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_skus_are_unique() {
        for (i, a) in CATALOG.iter().enumerate() {
            assert!(CATALOG[i + 1..].iter().all(|b| b.sku != a.sku), "{}", a.sku);
        }
    }

    #[test]
    fn matching_ignores_case_and_blank_queries() {
        let hits = matching("RUNNING");
        assert_eq!(hits.len(), 4);
        assert!(matching("   ").is_empty());
        assert!(matching("kayak").is_empty());
    }

    #[test]
    fn related_stays_in_department() {
        let related = related("sku-2001");
        assert_eq!(related.len(), 3);
        assert!(related.iter().all(|p| p.department == "outdoor"));
        assert!(related.iter().all(|p| p.sku != "sku-2001"));
        assert!(super::related("sku-9999").is_empty());
    }
}
