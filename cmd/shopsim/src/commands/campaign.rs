//! Campaign command implementation.

use anyhow::{Context, Result};
use shopsim_engine::{run_campaign, Endpoint, SimSettings};
use tracing::info;

/// Runs the campaign command.
pub fn run(
    settings: &SimSettings,
    seed: u64,
    endpoint: &str,
    iterations: usize,
    csv_path: Option<&str>,
) -> Result<()> {
    let endpoint: Endpoint = endpoint
        .parse()
        .with_context(|| format!("Invalid --endpoint: {endpoint}"))?;
    info!("Running {} decisions for {} (seed {})", iterations, endpoint, seed);

    let report = run_campaign(endpoint, settings, seed, iterations);
    println!("{report}");

    if let Some(path) = csv_path {
        let mut writer =
            csv::Writer::from_path(path).with_context(|| format!("Failed to create {path}"))?;
        let rows = report.rows();
        for row in &rows {
            writer
                .serialize(row)
                .with_context(|| format!("Failed to write {path}"))?;
        }
        writer.flush().with_context(|| format!("Failed to write {path}"))?;
        info!("Wrote {} rows to {}", rows.len(), path);
    }
    Ok(())
}
