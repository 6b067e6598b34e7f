//! Simulation settings and the shared settings store.
//!
//! Settings are read as immutable snapshots: a call takes one
//! `Arc<SimSettings>` at its start and keeps it for its whole duration.
//! Writes go through [`SettingsStore`] and copy on write.

use crate::endpoint::Endpoint;
use crate::error::Result;
use crate::profile::LatencyProfile;
use serde::{Deserialize, Serialize};
use shopsim_trace::{
    DeviceClass, Environment, ExperimentVariant, NetworkClass, Region, SessionId, TraceContext,
};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

/// Per-endpoint "force fail" flags. Missing entries mean `false`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FailureTable(BTreeMap<Endpoint, bool>);

impl FailureTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the flag for `endpoint`.
    #[must_use]
    pub fn with(mut self, endpoint: Endpoint, fail: bool) -> Self {
        self.set(endpoint, fail);
        self
    }

    /// Sets the flag for `endpoint`.
    pub fn set(&mut self, endpoint: Endpoint, fail: bool) {
        self.0.insert(endpoint, fail);
    }

    /// Returns true if `endpoint` is forced to fail.
    #[must_use]
    pub fn is_forced(&self, endpoint: Endpoint) -> bool {
        self.0.get(&endpoint).copied().unwrap_or(false)
    }

    /// Endpoints currently forced to fail.
    pub fn forced(&self) -> impl Iterator<Item = Endpoint> + '_ {
        self.0
            .iter()
            .filter_map(|(endpoint, fail)| fail.then_some(*endpoint))
    }
}

/// Externally configured simulation state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimSettings {
    /// Active latency profile.
    pub profile: LatencyProfile,
    /// Global offline flag.
    pub offline: bool,
    /// Active experiment variant.
    pub variant: ExperimentVariant,
    /// Deployment environment.
    pub environment: Environment,
    /// Coarse region.
    pub region: Region,
    /// Device performance class.
    pub device: DeviceClass,
    /// Network class reported by the host.
    pub network: NetworkClass,
    /// Failure injection table.
    pub failures: FailureTable,
}

impl SimSettings {
    /// Sets the latency profile.
    #[must_use]
    pub const fn with_profile(mut self, profile: LatencyProfile) -> Self {
        self.profile = profile;
        self
    }

    /// Sets the offline flag.
    #[must_use]
    pub const fn with_offline(mut self, offline: bool) -> Self {
        self.offline = offline;
        self
    }

    /// Forces `endpoint` to fail, or clears it.
    #[must_use]
    pub fn with_failure(mut self, endpoint: Endpoint, fail: bool) -> Self {
        self.failures.set(endpoint, fail);
        self
    }

    /// Sets the experiment variant.
    #[must_use]
    pub const fn with_variant(mut self, variant: ExperimentVariant) -> Self {
        self.variant = variant;
        self
    }

    /// Network class as seen by spans; offline wins over the host report.
    #[must_use]
    pub const fn effective_network(&self) -> NetworkClass {
        if self.offline {
            NetworkClass::Offline
        } else {
            self.network
        }
    }

    /// Builds the trace context for `session` from these settings.
    #[must_use]
    pub fn trace_context(&self, session: SessionId) -> TraceContext {
        TraceContext::new(session)
            .with_environment(self.environment)
            .with_region(self.region)
            .with_device(self.device)
            .with_network(self.effective_network())
            .with_variant(self.variant)
    }

    /// Parses settings from YAML.
    ///
    /// # Errors
    ///
    /// Returns an error on malformed YAML, unknown keys or unknown values.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Loads settings from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Encodes settings as YAML.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails.
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

/// Shared, synchronized owner of the current settings.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    tx: Arc<watch::Sender<Arc<SimSettings>>>,
}

impl Default for SettingsStore {
    fn default() -> Self {
        Self::new(SimSettings::default())
    }
}

impl SettingsStore {
    /// Creates a store holding `settings`.
    #[must_use]
    pub fn new(settings: SimSettings) -> Self {
        let (tx, _rx) = watch::channel(Arc::new(settings));
        Self { tx: Arc::new(tx) }
    }

    /// The current settings. The snapshot never changes after it is taken.
    #[must_use]
    pub fn snapshot(&self) -> Arc<SimSettings> {
        Arc::clone(&self.tx.borrow())
    }

    /// Observes future changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Arc<SimSettings>> {
        self.tx.subscribe()
    }

    /// Replaces the settings wholesale.
    pub fn replace(&self, settings: SimSettings) {
        info!(profile = %settings.profile, offline = settings.offline, "settings replaced");
        self.tx.send_replace(Arc::new(settings));
    }

    /// Applies `change` to a private copy and publishes it.
    pub fn update(&self, change: impl FnOnce(&mut SimSettings)) {
        self.tx.send_modify(|current| change(Arc::make_mut(current)));
    }

    /// Selects the active latency profile.
    pub fn set_profile(&self, profile: LatencyProfile) {
        info!(%profile, "latency profile changed");
        self.update(|s| s.profile = profile);
    }

    /// Sets or clears the failure flag for `endpoint`.
    pub fn set_failure(&self, endpoint: Endpoint, fail: bool) {
        info!(%endpoint, fail, "failure injection changed");
        self.update(|s| s.failures.set(endpoint, fail));
    }

    /// Sets the global offline flag.
    pub fn set_offline(&self, offline: bool) {
        info!(offline, "offline flag changed");
        self.update(|s| s.offline = offline);
    }

    /// Selects the active experiment variant.
    pub fn set_variant(&self, variant: ExperimentVariant) {
        info!(%variant, "experiment variant changed");
        self.update(|s| s.variant = variant);
    }
}
