//! Time sources for span timestamps.

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A monotonic source of nanosecond timestamps.
pub trait Clock: Debug + Send + Sync {
    /// Current time in nanoseconds. Never decreases.
    fn now_ns(&self) -> u64;
}

/// Wall-clock anchored, monotonic clock.
///
/// Reads the wall clock once at construction and advances with
/// [`Instant`] afterwards, so timestamps are epoch based but never go
/// backwards.
#[derive(Debug, Clone)]
pub struct SystemClock {
    anchor_ns: u64,
    origin: Instant,
}

impl SystemClock {
    /// Creates a clock anchored at the current wall-clock time.
    #[must_use]
    pub fn new() -> Self {
        let anchor_ns = chrono::Utc::now()
            .timestamp_nanos_opt()
            .and_then(|ns| u64::try_from(ns).ok())
            .unwrap_or(0);
        Self {
            anchor_ns,
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    #[allow(clippy::cast_possible_truncation)]
    fn now_ns(&self) -> u64 {
        let elapsed = self.origin.elapsed().as_nanos() as u64;
        self.anchor_ns.saturating_add(elapsed)
    }
}

/// A manually advanced clock for tests.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    /// Creates a clock at time zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Advances the clock.
    #[allow(clippy::cast_possible_truncation)]
    pub fn advance(&self, by: Duration) {
        self.now.fetch_add(by.as_nanos() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ns(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}
