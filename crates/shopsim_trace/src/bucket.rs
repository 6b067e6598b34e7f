//! Attribute bucketing.
//!
//! Pure mappings from raw measurements to small fixed label sets. Every
//! bucket is closed on its lower bound and open on its upper bound; the
//! last bucket is unbounded above.

use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// A label produced by a [`Scale`].
///
/// Buckets are the only way measured numbers enter span attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Bucket(&'static str);

impl Bucket {
    /// Returns the label text.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        self.0
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// An ordered set of buckets over a non-negative integer measurement.
#[derive(Debug, Clone, Copy)]
pub struct Scale {
    name: &'static str,
    bounds: &'static [u64],
    labels: &'static [&'static str],
}

impl Scale {
    /// Creates a scale. `bounds` are ascending lower bounds starting at 0
    /// and pair one-to-one with `labels`.
    #[must_use]
    pub const fn new(
        name: &'static str,
        bounds: &'static [u64],
        labels: &'static [&'static str],
    ) -> Self {
        assert!(bounds.len() == labels.len(), "one label per bound");
        assert!(!bounds.is_empty() && bounds[0] == 0, "scale must start at 0");
        Self {
            name,
            bounds,
            labels,
        }
    }

    /// Name of the measured quantity.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// All labels in ascending order.
    #[must_use]
    pub const fn labels(&self) -> &'static [&'static str] {
        self.labels
    }

    /// Index of the bucket containing `value`.
    #[must_use]
    pub fn index(&self, value: u64) -> usize {
        self.bounds.partition_point(|&bound| bound <= value) - 1
    }

    /// Maps `value` to its bucket.
    #[must_use]
    pub fn bucket(&self, value: u64) -> Bucket {
        Bucket(self.labels[self.index(value)])
    }
}

/// Item counts (cart lines, quantities).
pub const ITEM_COUNT: Scale = Scale::new("item_count", &[0, 1, 2, 4, 10], &["0", "1", "2-3", "4-10", "10+"]);

/// Result counts (search hits, recommendations).
pub const RESULT_COUNT: Scale = Scale::new("result_count", &[0, 1, 11, 50], &["0", "1-10", "11-50", "50+"]);

/// Monetary amounts in cents.
pub const AMOUNT_CENTS: Scale = Scale::new(
    "amount",
    &[0, 2_500, 10_000, 25_000],
    &["$0-25", "$25-100", "$100-250", "$250+"],
);

/// Retry attempts.
pub const RETRY_COUNT: Scale = Scale::new("retry_count", &[0, 1, 2], &["0", "1", "2+"]);

/// Payload sizes in bytes.
pub const PAYLOAD_BYTES: Scale = Scale::new(
    "payload_size",
    &[0, 10 * 1024, 100 * 1024],
    &["0-10KB", "10-100KB", "100KB+"],
);

/// Latencies in milliseconds.
pub const LATENCY_MS: Scale = Scale::new(
    "latency",
    &[0, 100, 500, 1_000, 3_000],
    &["<100ms", "100-500ms", "500ms-1s", "1-3s", "3s+"],
);

/// Buckets an item count.
#[must_use]
pub fn item_count(count: u64) -> Bucket {
    ITEM_COUNT.bucket(count)
}

/// Buckets a result count.
#[must_use]
pub fn result_count(count: u64) -> Bucket {
    RESULT_COUNT.bucket(count)
}

/// Buckets an amount given in cents.
#[must_use]
pub fn amount_cents(cents: u64) -> Bucket {
    AMOUNT_CENTS.bucket(cents)
}

/// Buckets a retry count.
#[must_use]
pub fn retry_count(retries: u32) -> Bucket {
    RETRY_COUNT.bucket(u64::from(retries))
}

/// Buckets a byte size.
#[must_use]
pub fn payload_bytes(bytes: u64) -> Bucket {
    PAYLOAD_BYTES.bucket(bytes)
}

/// Buckets a latency.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn latency(duration: Duration) -> Bucket {
    // Saturates only past 584 million years
    LATENCY_MS.bucket(duration.as_millis().min(u128::from(u64::MAX)) as u64)
}
