//! Command implementations and shared settings handling.

pub mod campaign;
pub mod init;
pub mod run;
pub mod soak;

use anyhow::{Context, Result};
use clap::Args;
use shopsim_engine::{Endpoint, LatencyProfile, SimSettings};
use std::path::Path;
use tracing::info;

/// Flags that override the settings file.
#[derive(Debug, Default, Args)]
pub struct Overrides {
    /// Latency profile (fast, normal, slow)
    #[arg(long)]
    pub profile: Option<String>,

    /// Simulate having no network
    #[arg(long)]
    pub offline: bool,

    /// Force an endpoint to fail (repeatable)
    #[arg(long = "fail", value_name = "ENDPOINT")]
    pub failures: Vec<String>,
}

impl Overrides {
    /// Applies the overrides to `settings`.
    pub fn apply(&self, settings: &mut SimSettings) -> Result<()> {
        if let Some(profile) = &self.profile {
            settings.profile = profile
                .parse::<LatencyProfile>()
                .with_context(|| format!("Invalid --profile: {profile}"))?;
        }
        if self.offline {
            settings.offline = true;
        }
        for name in &self.failures {
            let endpoint = name
                .parse::<Endpoint>()
                .with_context(|| format!("Invalid --fail: {name}"))?;
            settings.failures.set(endpoint, true);
        }
        Ok(())
    }
}

/// Loads settings from `path`, falling back to defaults when the file
/// does not exist, then applies `overrides`.
pub fn load_settings(path: &str, overrides: &Overrides) -> Result<SimSettings> {
    let mut settings = if Path::new(path).exists() {
        info!("Loading settings: {}", path);
        SimSettings::load(path).with_context(|| format!("Failed to load settings: {path}"))?
    } else {
        info!("No settings file at {}, using defaults", path);
        SimSettings::default()
    };
    overrides.apply(&mut settings)?;
    info!(
        profile = %settings.profile,
        offline = settings.offline,
        forced = settings.failures.forced().count(),
        "Settings ready"
    );
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_replace_file_values() {
        let overrides = Overrides {
            profile: Some("slow".to_string()),
            offline: true,
            failures: vec!["payment".to_string()],
        };
        let mut settings = SimSettings::default();
        overrides.apply(&mut settings).expect("overrides");

        assert_eq!(settings.profile, LatencyProfile::Slow);
        assert!(settings.offline);
        assert!(settings.failures.is_forced(Endpoint::Payment));
    }

    #[test]
    fn unknown_endpoint_is_rejected() {
        let overrides = Overrides {
            failures: vec!["teleport".to_string()],
            ..Overrides::default()
        };
        assert!(overrides.apply(&mut SimSettings::default()).is_err());
    }

    #[test]
    fn missing_file_uses_defaults() {
        let settings = load_settings("does/not/exist.yaml", &Overrides::default()).expect("defaults");
        assert_eq!(settings, SimSettings::default());
    }
}
