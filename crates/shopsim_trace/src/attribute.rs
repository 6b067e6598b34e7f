//! Span attributes.
//!
//! Keys are `&'static str` constants from [`keys`]; values are enumerated
//! labels, booleans, small integers, or the session's opaque id. Free text
//! cannot be expressed.

use crate::bucket::Bucket;
use crate::error::{Error, Result};
use crate::outcome::OutcomeCategory;
use std::collections::btree_map::{self, BTreeMap};

/// Largest magnitude accepted for an integer attribute.
pub const MAX_SMALL_INT: i64 = 100;

/// Well-known attribute keys.
pub mod keys {
    /// Outcome category of a failed span. Written only by the tracer.
    pub const ERROR_CATEGORY: &str = "error.category";

    /// Deployment environment.
    pub const ENVIRONMENT: &str = "deployment.environment";
    /// Application release version.
    pub const RELEASE: &str = "app.release";
    /// Coarse geographic region.
    pub const REGION: &str = "geo.region";
    /// Device performance class.
    pub const DEVICE_CLASS: &str = "device.class";
    /// Network class.
    pub const NETWORK_CLASS: &str = "network.class";
    /// Opaque session identifier.
    pub const SESSION_ID: &str = "session.id";
    /// Active experiment variant.
    pub const EXPERIMENT_VARIANT: &str = "experiment.variant";

    /// Simulated endpoint behind a span.
    pub const ENDPOINT: &str = "sim.endpoint";
    /// Bucketed simulated latency.
    pub const LATENCY: &str = "sim.latency";
    /// Bucketed search hit count.
    pub const SEARCH_RESULTS: &str = "search.result_count";
    /// Bucketed recommendation count.
    pub const RECOMMENDATIONS: &str = "recommendations.count";
    /// Whether the product lookup found a product.
    pub const PRODUCT_FOUND: &str = "product.found";
    /// Bucketed cart item count.
    pub const CART_ITEMS: &str = "cart.item_count";
    /// Bucketed cart value.
    pub const CART_VALUE: &str = "cart.value";
    /// Bucketed payment retry count.
    pub const PAYMENT_RETRIES: &str = "payment.retry_count";
    /// Whether the payment required an extra verification challenge.
    pub const PAYMENT_CHALLENGE: &str = "payment.challenge_required";
    /// Whether inventory reservation ended in a backorder.
    pub const BACKORDER: &str = "inventory.backorder";
    /// Bucketed payload size.
    pub const PAYLOAD_SIZE: &str = "payload.size";

    /// Keys callers may not write.
    pub const RESERVED: [&str; 1] = [ERROR_CATEGORY];
}

/// A bucketed attribute value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeValue {
    /// An enumerated label.
    Label(&'static str),
    /// A boolean flag.
    Bool(bool),
    /// A small integer, at most [`MAX_SMALL_INT`] in magnitude.
    Int(i64),
    /// An opaque identifier, rendered as 16 hex digits.
    Id(u64),
}

impl AttributeValue {
    /// Converts this value to a string representation.
    #[must_use]
    pub fn as_string(&self) -> String {
        match self {
            Self::Label(s) => (*s).to_string(),
            Self::Bool(b) => b.to_string(),
            Self::Int(i) => i.to_string(),
            Self::Id(id) => format!("{id:016x}"),
        }
    }

    /// Returns the label if this is a label value.
    #[must_use]
    pub const fn as_label(&self) -> Option<&'static str> {
        match self {
            Self::Label(s) => Some(*s),
            _ => None,
        }
    }

    /// Returns the flag if this is a boolean value.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<Bucket> for AttributeValue {
    fn from(bucket: Bucket) -> Self {
        Self::Label(bucket.as_str())
    }
}

impl From<OutcomeCategory> for AttributeValue {
    fn from(category: OutcomeCategory) -> Self {
        Self::Label(category.as_str())
    }
}

impl From<bool> for AttributeValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<u8> for AttributeValue {
    fn from(i: u8) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<i64> for AttributeValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

/// A set of attributes keyed by static keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes {
    entries: BTreeMap<&'static str, AttributeValue>,
}

impl Attributes {
    /// Creates an empty attribute set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an attribute.
    #[must_use]
    pub fn with(mut self, key: &'static str, value: impl Into<AttributeValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Inserts an attribute, replacing any previous value for `key`.
    pub fn insert(&mut self, key: &'static str, value: impl Into<AttributeValue>) {
        self.entries.insert(key, value.into());
    }

    /// Gets an attribute value by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&AttributeValue> {
        self.entries.get(key)
    }

    /// Number of attributes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no attributes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over attributes in key order.
    pub fn iter(&self) -> btree_map::Iter<'_, &'static str, AttributeValue> {
        self.entries.iter()
    }

    /// Merges `other` into `self`; later values win.
    pub fn merge(&mut self, other: Self) {
        self.entries.extend(other.entries);
    }

    /// Checks that caller-supplied attributes stay inside the schema.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ReservedKey`] or [`Error::Unbucketed`].
    pub fn validate(&self) -> Result<()> {
        for (key, value) in &self.entries {
            if keys::RESERVED.contains(key) {
                return Err(Error::ReservedKey(*key));
            }
            if let AttributeValue::Int(i) = value {
                if i.unsigned_abs() > MAX_SMALL_INT.unsigned_abs() {
                    return Err(Error::Unbucketed {
                        key: *key,
                        value: *i,
                    });
                }
            }
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a Attributes {
    type Item = (&'a &'static str, &'a AttributeValue);
    type IntoIter = btree_map::Iter<'a, &'static str, AttributeValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bucket;

    #[test]
    fn builder_replaces_duplicate_keys() {
        let attrs = Attributes::new()
            .with(keys::CART_ITEMS, bucket::item_count(1))
            .with(keys::CART_ITEMS, bucket::item_count(5));

        assert_eq!(attrs.len(), 1);
        assert_eq!(attrs.get(keys::CART_ITEMS), Some(&AttributeValue::Label("4-10")));
    }

    #[test]
    fn reserved_key_is_rejected() {
        let attrs = Attributes::new().with(keys::ERROR_CATEGORY, OutcomeCategory::Fraud);
        assert!(matches!(attrs.validate(), Err(Error::ReservedKey(_))));
    }

    #[test]
    fn large_integers_are_rejected() {
        let ok = Attributes::new().with(keys::PAYMENT_RETRIES, 3u8);
        let bad = Attributes::new().with(keys::PAYMENT_RETRIES, 4_000i64);
        assert!(ok.validate().is_ok());
        assert!(matches!(
            bad.validate(),
            Err(Error::Unbucketed { value: 4_000, .. })
        ));

        let floor = Attributes::new().with(keys::PAYMENT_RETRIES, i64::MIN);
        assert!(matches!(
            floor.validate(),
            Err(Error::Unbucketed { value: i64::MIN, .. })
        ));
    }

    #[test]
    fn value_rendering() {
        assert_eq!(AttributeValue::Id(0xab).as_string(), "00000000000000ab");
        assert_eq!(AttributeValue::Bool(true).as_string(), "true");
        assert_eq!(AttributeValue::from(bucket::retry_count(2)).as_label(), Some("2+"));
    }
}
