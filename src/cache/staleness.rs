//! Staleness policy for cached price records
//!
//! Pure functions of `(now, fetched_at, cache_expiry_days)`; nothing here
//! touches the clock or the store.

use serde::{Deserialize, Serialize};

/// Seconds in one day, the unit of `cache_expiry_days`
pub const SECONDS_PER_DAY: f64 = 86_400.0;

/// State of a cache entry at lookup time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Freshness {
    /// Entry exists and is within the expiry window
    Fresh,
    /// Entry exists but is older than the expiry window
    Stale,
    /// No entry for the key
    Missing,
}

/// Returns true if a record fetched at `fetched_at` is older than the expiry window
///
/// The comparison is strict: a record exactly `cache_expiry_days` old is
/// still fresh. Records stamped in the future (clock skew) are fresh.
pub fn is_stale(now: i64, fetched_at: i64, cache_expiry_days: f64) -> bool {
    let age_days = now.saturating_sub(fetched_at) as f64 / SECONDS_PER_DAY;
    age_days > cache_expiry_days
}

/// Uniform expiry window applied to every cache entry
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StalenessPolicy {
    cache_expiry_days: f64,
}

impl StalenessPolicy {
    /// Creates a policy, rejecting negative or non-finite windows
    pub fn new(cache_expiry_days: f64) -> Option<Self> {
        if cache_expiry_days.is_finite() && cache_expiry_days >= 0.0 {
            Some(Self { cache_expiry_days })
        } else {
            None
        }
    }

    pub fn cache_expiry_days(&self) -> f64 {
        self.cache_expiry_days
    }

    pub fn is_stale(&self, now: i64, fetched_at: i64) -> bool {
        is_stale(now, fetched_at, self.cache_expiry_days)
    }

    /// Classifies an optional entry timestamp
    pub fn freshness(&self, now: i64, fetched_at: Option<i64>) -> Freshness {
        match fetched_at {
            None => Freshness::Missing,
            Some(ts) if self.is_stale(now, ts) => Freshness::Stale,
            Some(_) => Freshness::Fresh,
        }
    }
}

impl Default for StalenessPolicy {
    fn default() -> Self {
        Self {
            cache_expiry_days: 1.0,
        }
    }
}
