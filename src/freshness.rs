//! Source-level freshness gate.
//!
//! A source is fresh iff its newest stored signal is no older than the
//! threshold, counted in whole elapsed minutes (65 min 59 s reads as 65).
//! No data at all counts as stale. Recomputed every cycle, never
//! cached.

use chrono::{DateTime, Duration, FixedOffset};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FreshnessStatus {
    pub source: String,
    pub last_seen_at: Option<DateTime<FixedOffset>>,
    pub is_fresh: bool,
}

impl FreshnessStatus {
    /// Whole minutes since the last signal, `None` when the source never reported.
    pub fn minutes_stale(&self, now: DateTime<FixedOffset>) -> Option<i64> {
        self.last_seen_at.map(|t| (now - t).num_minutes().max(0))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FreshnessMonitor {
    threshold_minutes: i64,
}

impl FreshnessMonitor {
    pub fn new(threshold_minutes: i64) -> Self {
        Self { threshold_minutes }
    }

    pub fn threshold(&self) -> Duration {
        Duration::minutes(self.threshold_minutes)
    }

    pub fn evaluate(
        &self,
        source: &str,
        last_seen: Option<DateTime<FixedOffset>>,
        now: DateTime<FixedOffset>,
    ) -> FreshnessStatus {
        let is_fresh = match last_seen {
            Some(t) => (now - t).num_minutes() <= self.threshold_minutes,
            None => false,
        };
        FreshnessStatus {
            source: source.to_string(),
            last_seen_at: last_seen,
            is_fresh,
        }
    }
}
