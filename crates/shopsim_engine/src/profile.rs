//! Latency profiles.

use crate::error::{Error, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// An inclusive `[min, max]` delay range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayRange {
    /// Shortest delay.
    pub min: Duration,
    /// Longest delay.
    pub max: Duration,
}

impl DelayRange {
    /// Creates a range.
    #[must_use]
    pub const fn new(min: Duration, max: Duration) -> Self {
        Self { min, max }
    }

    /// Draws a delay uniformly from the range at nanosecond resolution.
    #[allow(clippy::cast_possible_truncation)]
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        // Profile ranges are a few seconds, far below u64 nanoseconds
        let min = self.min.as_nanos() as u64;
        let max = self.max.as_nanos() as u64;
        Duration::from_nanos(rng.gen_range(min..=max.max(min)))
    }

    /// Returns true if `delay` lies inside the range.
    #[must_use]
    pub fn contains(&self, delay: Duration) -> bool {
        self.min <= delay && delay <= self.max
    }
}

/// Named simulated network speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LatencyProfile {
    /// 50 ms to 300 ms.
    Fast,
    /// 300 ms to 1 s.
    #[default]
    Normal,
    /// 1 s to 3 s.
    Slow,
}

impl LatencyProfile {
    /// Every profile.
    pub const ALL: [Self; 3] = [Self::Fast, Self::Normal, Self::Slow];

    /// The delay range of this profile.
    #[must_use]
    pub const fn range(self) -> DelayRange {
        match self {
            Self::Fast => DelayRange::new(Duration::from_millis(50), Duration::from_millis(300)),
            Self::Normal => DelayRange::new(Duration::from_millis(300), Duration::from_secs(1)),
            Self::Slow => DelayRange::new(Duration::from_secs(1), Duration::from_secs(3)),
        }
    }

    /// Returns the profile label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fast => "fast",
            Self::Normal => "normal",
            Self::Slow => "slow",
        }
    }
}

impl fmt::Display for LatencyProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LatencyProfile {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|profile| profile.as_str() == s)
            .ok_or_else(|| Error::UnknownName {
                kind: "latency profile",
                value: s.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn slow_profile_spans_one_to_three_seconds() {
        let range = LatencyProfile::Slow.range();
        assert_eq!(range.min, Duration::from_secs(1));
        assert_eq!(range.max, Duration::from_secs(3));
    }

    #[test]
    fn samples_stay_in_range() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for profile in LatencyProfile::ALL {
            let range = profile.range();
            for _ in 0..500 {
                assert!(range.contains(range.sample(&mut rng)));
            }
        }
    }

    #[test]
    fn degenerate_range_yields_its_bound() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let range = DelayRange::new(Duration::from_millis(5), Duration::from_millis(5));
        assert_eq!(range.sample(&mut rng), Duration::from_millis(5));
    }

    #[test]
    fn parse_profile_names() {
        assert_eq!("slow".parse::<LatencyProfile>().unwrap(), LatencyProfile::Slow);
        assert!("glacial".parse::<LatencyProfile>().is_err());
    }
}
