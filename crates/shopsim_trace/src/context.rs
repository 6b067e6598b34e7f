//! Trace context propagation.
//!
//! A [`TraceContext`] carries the cross-cutting attributes every span
//! receives: deployment environment, release, region, device class,
//! network class, session and experiment variant. All of them are
//! enumerated, so stamping can never leak free text.

use crate::attribute::{keys, AttributeValue, Attributes};
use crate::error::Result;
use crate::span::SpanId;
use crate::tree::Transaction;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    /// Local development.
    #[default]
    Development,
    /// Pre-production.
    Staging,
    /// Production.
    Production,
}

impl Environment {
    /// Returns the attribute label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Staging => "staging",
            Self::Production => "production",
        }
    }
}

/// Coarse geographic region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Region {
    /// North America.
    NorthAmerica,
    /// South and Central America.
    LatinAmerica,
    /// Europe, Middle East and Africa.
    Emea,
    /// Asia and Pacific.
    AsiaPacific,
    /// Region could not be determined.
    #[default]
    Unknown,
}

impl Region {
    /// Returns the attribute label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NorthAmerica => "north_america",
            Self::LatinAmerica => "latin_america",
            Self::Emea => "emea",
            Self::AsiaPacific => "asia_pacific",
            Self::Unknown => "unknown",
        }
    }
}

/// Device performance class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceClass {
    /// Low-end device.
    Low,
    /// Mid-range device.
    #[default]
    Mid,
    /// High-end device.
    High,
}

impl DeviceClass {
    /// Returns the attribute label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Mid => "mid",
            Self::High => "high",
        }
    }
}

/// Network class as reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkClass {
    /// Wi-Fi.
    #[default]
    Wifi,
    /// Cellular data.
    Cellular,
    /// Wired connection.
    Ethernet,
    /// No connectivity.
    Offline,
    /// Connection type unavailable.
    Unknown,
}

impl NetworkClass {
    /// Returns the attribute label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Wifi => "wifi",
            Self::Cellular => "cellular",
            Self::Ethernet => "ethernet",
            Self::Offline => "offline",
            Self::Unknown => "unknown",
        }
    }
}

/// Experiment arm the session belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExperimentVariant {
    /// Control group.
    #[default]
    Control,
    /// First treatment.
    TreatmentA,
    /// Second treatment.
    TreatmentB,
}

impl ExperimentVariant {
    /// Returns the attribute label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Control => "control",
            Self::TreatmentA => "treatment_a",
            Self::TreatmentB => "treatment_b",
        }
    }
}

macro_rules! label_conversions {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for AttributeValue {
                fn from(value: $ty) -> Self {
                    Self::Label(value.as_str())
                }
            }

            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(self.as_str())
                }
            }
        )*
    };
}

label_conversions!(Environment, Region, DeviceClass, NetworkClass, ExperimentVariant);

/// Opaque session identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(u64);

impl SessionId {
    /// Draws a new identifier from `rng`.
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self(rng.gen())
    }

    /// Wraps a raw identifier.
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl From<SessionId> for AttributeValue {
    fn from(session: SessionId) -> Self {
        Self::Id(session.0)
    }
}

/// Release label stamped onto every span. It is always the crate version,
/// never caller text.
pub const RELEASE: &str = env!("CARGO_PKG_VERSION");

/// Cross-cutting attributes stamped onto every span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceContext {
    /// Deployment environment.
    pub environment: Environment,
    /// Coarse region.
    pub region: Region,
    /// Device performance class.
    pub device: DeviceClass,
    /// Network class.
    pub network: NetworkClass,
    /// Session identifier.
    pub session: SessionId,
    /// Experiment variant.
    pub variant: ExperimentVariant,
}

impl TraceContext {
    /// Creates a context for `session` with default classes.
    #[must_use]
    pub fn new(session: SessionId) -> Self {
        Self {
            environment: Environment::default(),
            region: Region::default(),
            device: DeviceClass::default(),
            network: NetworkClass::default(),
            session,
            variant: ExperimentVariant::default(),
        }
    }

    /// Sets the environment.
    #[must_use]
    pub const fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    /// Sets the region.
    #[must_use]
    pub const fn with_region(mut self, region: Region) -> Self {
        self.region = region;
        self
    }

    /// Sets the device class.
    #[must_use]
    pub const fn with_device(mut self, device: DeviceClass) -> Self {
        self.device = device;
        self
    }

    /// Sets the network class.
    #[must_use]
    pub const fn with_network(mut self, network: NetworkClass) -> Self {
        self.network = network;
        self
    }

    /// Sets the experiment variant.
    #[must_use]
    pub const fn with_variant(mut self, variant: ExperimentVariant) -> Self {
        self.variant = variant;
        self
    }

    /// The attributes this context stamps.
    #[must_use]
    pub fn attributes(&self) -> Attributes {
        Attributes::new()
            .with(keys::ENVIRONMENT, self.environment)
            .with(keys::RELEASE, AttributeValue::Label(RELEASE))
            .with(keys::REGION, self.region)
            .with(keys::DEVICE_CLASS, self.device)
            .with(keys::NETWORK_CLASS, self.network)
            .with(keys::SESSION_ID, self.session)
            .with(keys::EXPERIMENT_VARIANT, self.variant)
    }

    /// Stamps the context onto an open span. Stamping twice leaves the
    /// same attribute set.
    ///
    /// # Errors
    ///
    /// Fails if the span is closed, unknown, or its tree was exported.
    pub fn stamp(&self, tx: &mut Transaction, span: SpanId) -> Result<()> {
        tx.set_attributes(span, self.attributes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::MemoryCollector;
    use crate::span::Operation;
    use crate::tree::{DefectPolicy, Tracer};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::sync::Arc;

    fn context() -> TraceContext {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        TraceContext::new(SessionId::generate(&mut rng))
            .with_environment(Environment::Staging)
            .with_network(NetworkClass::Cellular)
            .with_variant(ExperimentVariant::TreatmentB)
    }

    #[test]
    fn stamp_is_idempotent() {
        let tracer = Tracer::new(Arc::new(MemoryCollector::new()))
            .with_defect_policy(DefectPolicy::Report);
        let mut tx = tracer.start_transaction("search.query", Operation::Ui).unwrap();
        let root = tx.root();
        let ctx = context();

        ctx.stamp(&mut tx, root).unwrap();
        let once = tx.span(root).unwrap().attributes().clone();
        ctx.stamp(&mut tx, root).unwrap();
        let twice = tx.span(root).unwrap().attributes().clone();

        assert_eq!(once, twice);
        assert_eq!(twice.len(), 7);
        assert_eq!(
            twice.get(keys::EXPERIMENT_VARIANT),
            Some(&AttributeValue::Label("treatment_b"))
        );
        assert_eq!(
            twice.get(keys::RELEASE),
            Some(&AttributeValue::Label(env!("CARGO_PKG_VERSION")))
        );
    }

    #[test]
    fn stamping_a_closed_span_is_rejected() {
        let collector = Arc::new(MemoryCollector::new());
        let tracer = Tracer::new(collector).with_defect_policy(DefectPolicy::Report);
        let mut tx = tracer.start_transaction("search.query", Operation::Ui).unwrap();
        let root = tx.root();
        let child = tx.start_child(root, "api.search", Operation::Api).unwrap();
        tx.record_success(child, Attributes::new()).unwrap();

        assert!(context().stamp(&mut tx, child).is_err());
    }

    #[test]
    fn tracer_context_stamps_children_at_creation() {
        let tracer = Tracer::new(Arc::new(MemoryCollector::new()))
            .with_defect_policy(DefectPolicy::Report)
            .with_context(context());
        let mut tx = tracer.start_transaction("cart.add_item", Operation::Ui).unwrap();
        let root = tx.root();
        let child = tx.start_child(root, "api.cart_add", Operation::Api).unwrap();

        let span = tx.span(child).unwrap();
        assert_eq!(
            span.get_attribute(keys::NETWORK_CLASS),
            Some(&AttributeValue::Label("cellular"))
        );
        assert!(span.get_attribute(keys::SESSION_ID).is_some());
    }
}
