//! Run command implementation.

use anyhow::{Context, Result};
use clap::ValueEnum;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use shopsim_engine::{SettingsStore, SimSettings, Simulator};
use shopsim_flows::{cart, catalog, checkout, search, Cart, FlowContext};
use shopsim_trace::{Collector, JsonLinesCollector, LogCollector, MemoryCollector, SessionId};
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

/// Workflows the CLI can drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Flow {
    /// Product page with recommendations
    Browse,
    /// Catalog search
    Search,
    /// Add and update cart items
    Cart,
    /// Fill a cart and check out
    Checkout,
}

impl fmt::Display for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Browse => "browse",
            Self::Search => "search",
            Self::Cart => "cart",
            Self::Checkout => "checkout",
        };
        f.write_str(name)
    }
}

/// Where exported traces go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sink {
    /// Pretty JSON on stdout.
    Stdout,
    /// One log event per trace.
    Log,
    /// Appended to a JSON lines file.
    JsonLines(String),
}

/// Runs the run command.
pub async fn run(settings: SimSettings, seed: u64, flow: Flow, sink: Sink) -> Result<()> {
    let memory = Arc::new(MemoryCollector::new());
    let simulator = Arc::new(Simulator::new(SettingsStore::new(settings), seed));
    let session = SessionId::generate(&mut ChaCha8Rng::seed_from_u64(seed));
    let ctx = FlowContext::for_session(memory.clone(), simulator, session);

    info!("Running {} workflow for session {}", flow, session);
    match drive(&ctx, flow).await {
        Ok(summary) => info!("{} completed: {}", flow, summary),
        Err(err) => warn!("{} did not complete: {}", flow, err),
    }

    let traces = memory.take();
    match sink {
        Sink::Stdout => {
            for trace in &traces {
                let json = serde_json::to_string_pretty(trace)
                    .with_context(|| "Failed to encode trace")?;
                println!("{json}");
            }
        }
        Sink::Log => {
            for trace in traces {
                LogCollector
                    .collect(trace)
                    .with_context(|| "Failed to log trace")?;
            }
        }
        Sink::JsonLines(path) => {
            let file = JsonLinesCollector::create(&path)
                .with_context(|| format!("Failed to open {path}"))?;
            let count = traces.len();
            for trace in traces {
                file.collect(trace)
                    .with_context(|| format!("Failed to write {path}"))?;
            }
            info!("Appended {} traces to {}", count, path);
        }
    }
    Ok(())
}

async fn drive(ctx: &FlowContext, flow: Flow) -> shopsim_flows::Result<String> {
    match flow {
        Flow::Browse => {
            let page = catalog::browse(ctx, "sku-1001").await?;
            Ok(format!(
                "{} with {} recommendations",
                page.product.title,
                page.recommendations.len()
            ))
        }
        Flow::Search => {
            let results = search::search(ctx, "running").await?;
            Ok(format!("{} hits", results.hits.len()))
        }
        Flow::Cart => {
            let mut cart = Cart::new();
            cart::add_item(ctx, &mut cart, "sku-1001", 1).await?;
            cart::add_item(ctx, &mut cart, "sku-3002", 2).await?;
            cart::update_quantity(ctx, &mut cart, "sku-1001", 3).await?;
            Ok(format!("{} items, {} cents", cart.item_count(), cart.total_cents()))
        }
        Flow::Checkout => {
            let mut cart = Cart::new();
            cart::add_item(ctx, &mut cart, "sku-2002", 1).await?;
            cart::add_item(ctx, &mut cart, "sku-2004", 2).await?;
            let done = checkout::checkout(ctx, &cart).await?;
            match done.notification.await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => warn!("Notification failed: {}", err),
                Err(err) => warn!("Notification task failed: {}", err),
            }
            Ok(format!(
                "{} items, {} cents, backorder={}, challenged={}",
                done.receipt.item_count,
                done.receipt.total_cents,
                done.receipt.backorder,
                done.receipt.challenged
            ))
        }
    }
}
