//! Product search.

use crate::catalog::{self, Product};
use crate::context::FlowContext;
use crate::error::Result;
use crate::step::{self, finish};
use shopsim_engine::Endpoint;
use shopsim_trace::{bucket, keys, Attributes, Operation, SpanId, Transaction};

/// Search hits plus recommendations seeded by the top hit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchResults {
    /// Matching products.
    pub hits: Vec<&'static Product>,
    /// Related products, empty without hits or when unavailable.
    pub recommendations: Vec<&'static Product>,
}

/// Searches the catalog for `query`.
///
/// Traced as `search.submit` with a `search.fetch` child and, when there
/// is a top hit, a best-effort `recommendations.fetch` child. The query
/// text itself is never recorded.
///
/// # Errors
///
/// Returns the search call's failure or cancellation.
pub async fn search(ctx: &FlowContext, query: &str) -> Result<SearchResults> {
    let mut tx = ctx.tracer().start_transaction("search.submit", Operation::Ui)?;
    let root = tx.root();
    let result = run_search(ctx, &mut tx, root, query).await;

    let mut attrs = Attributes::new();
    if let Ok(results) = &result {
        attrs.insert(keys::SEARCH_RESULTS, bucket::result_count(results.hits.len() as u64));
        attrs.insert(
            keys::RECOMMENDATIONS,
            bucket::result_count(results.recommendations.len() as u64),
        );
    }
    finish(&mut tx, result, attrs)
}

async fn run_search(
    ctx: &FlowContext,
    tx: &mut Transaction,
    parent: SpanId,
    query: &str,
) -> Result<SearchResults> {
    let hits = catalog::matching(query);
    step::call(
        ctx,
        tx,
        parent,
        "search.fetch",
        Operation::Api,
        Endpoint::Search,
        |_| {
            Attributes::new().with(
                keys::SEARCH_RESULTS,
                bucket::result_count(hits.len() as u64),
            )
        },
    )
    .await?;

    let recommendations = match hits.first() {
        Some(top) => catalog::recommendations(ctx, tx, parent, top.sku).await?,
        None => Vec::new(),
    };
    Ok(SearchResults {
        hits,
        recommendations,
    })
}
