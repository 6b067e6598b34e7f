//! Init command implementation.

use anyhow::{Context, Result};
use shopsim_engine::{Endpoint, FailureTable, SimSettings};
use std::fs;
use std::path::Path;
use tracing::info;

const HEADER: &str = "# Shopsim simulation settings.
# profile: fast | normal | slow
# failures: force any endpoint to fail with its category
";

/// Settings written by `init`: defaults with every endpoint listed.
pub fn default_settings() -> SimSettings {
    let failures = Endpoint::ALL
        .iter()
        .fold(FailureTable::new(), |table, endpoint| table.with(*endpoint, false));
    SimSettings {
        failures,
        ..SimSettings::default()
    }
}

/// Runs the init command.
pub fn run(path: &str, force: bool) -> Result<()> {
    let settings_path = Path::new(path);
    if settings_path.exists() && !force {
        info!("Skipped: {} (already exists)", settings_path.display());
        return Ok(());
    }

    let yaml = default_settings()
        .to_yaml()
        .with_context(|| "Failed to encode default settings")?;
    fs::write(settings_path, format!("{HEADER}{yaml}"))
        .with_context(|| format!("Failed to write {}", settings_path.display()))?;
    info!("Created: {}", settings_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn written_settings_load_back() {
        let yaml = format!("{HEADER}{}", default_settings().to_yaml().expect("yaml"));
        let loaded = SimSettings::from_yaml(&yaml).expect("parse");

        assert_eq!(loaded, default_settings());
        assert_eq!(loaded.failures.forced().count(), 0);
    }
}
