//! Soak command implementation.

use anyhow::{Context, Result};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use shopsim_engine::{SettingsStore, SimSettings, Simulator};
use shopsim_flows::catalog::CATALOG;
use shopsim_flows::{cart, catalog, checkout, Cart, FlowContext, FlowError};
use shopsim_trace::checks::{check_trace, Violation};
use shopsim_trace::{MemoryCollector, SessionId};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Debug, Default)]
struct Tally {
    completed: usize,
    cancelled: usize,
    failed: BTreeMap<&'static str, usize>,
    defects: usize,
}

impl Tally {
    fn record(&mut self, outcome: &shopsim_flows::Result<()>) {
        match outcome {
            Ok(()) => self.completed += 1,
            Err(FlowError::Cancelled) => self.cancelled += 1,
            Err(FlowError::Failed(failure)) => {
                *self.failed.entry(failure.category.as_str()).or_default() += 1;
            }
            Err(FlowError::Trace(err)) => {
                error!("Instrumentation error: {}", err);
                self.defects += 1;
            }
        }
    }
}

/// Runs the soak command.
pub async fn run(
    settings: SimSettings,
    seed: u64,
    sessions: usize,
    cancel_after_ms: Option<u64>,
) -> Result<()> {
    let memory = Arc::new(MemoryCollector::new());
    let simulator = Arc::new(Simulator::new(SettingsStore::new(settings), seed));
    let cancel = CancellationToken::new();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    info!("Starting {} sessions", sessions);
    let mut tasks = JoinSet::new();
    for index in 0..sessions {
        let ctx = FlowContext::for_session(
            memory.clone(),
            Arc::clone(&simulator),
            SessionId::generate(&mut rng),
        )
        .with_cancel(cancel.child_token());
        tasks.spawn(async move { shop(&ctx, index).await });
    }

    if let Some(ms) = cancel_after_ms {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            warn!("Cancelling sessions still running after {}ms", ms);
            cancel.cancel();
        });
    }

    let mut tally = Tally::default();
    let mut notifications = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined.with_context(|| "Session task panicked")? {
            Ok(notification) => {
                tally.record(&Ok(()));
                notifications.push(notification);
            }
            Err(err) => tally.record(&Err(err)),
        }
    }
    let mut notified = Tally::default();
    for notification in notifications {
        let outcome = notification
            .await
            .with_context(|| "Notification task panicked")?;
        notified.record(&outcome);
    }

    let traces = memory.take();
    let violations: Vec<Violation> = traces.iter().flat_map(check_trace).collect();

    println!("Sessions:      {sessions}");
    println!("  completed:   {}", tally.completed);
    println!("  cancelled:   {}", tally.cancelled);
    for (category, count) in &tally.failed {
        println!("  {category:<13}{count}");
    }
    println!(
        "Notifications: {} sent, {} failed",
        notified.completed,
        notified.failed.values().sum::<usize>()
    );
    println!("Traces:        {}", traces.len());
    println!("Violations:    {}", violations.len());

    for violation in &violations {
        error!("{}", violation);
    }
    if !violations.is_empty() || tally.defects > 0 {
        anyhow::bail!(
            "{} tree violations and {} instrumentation errors",
            violations.len(),
            tally.defects
        );
    }
    info!("All exported trees passed the checks");
    Ok(())
}

async fn shop(ctx: &FlowContext, index: usize) -> shopsim_flows::Result<JoinHandle<shopsim_flows::Result<()>>> {
    let sku = CATALOG[index % CATALOG.len()].sku;
    catalog::browse(ctx, sku).await?;

    let mut cart = Cart::new();
    cart::add_item(ctx, &mut cart, sku, 1 + u32::try_from(index % 3).unwrap_or(0)).await?;
    let done = checkout::checkout(ctx, &cart).await?;
    Ok(done.notification)
}
