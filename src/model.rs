//! Canonical record model every source normalizes into.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};

/// Category assigned when no keyword rule matches.
pub const GENERAL_CATEGORY: &str = "General";

/// Metric carrying a market's implied probability in percent (0..=100).
pub const IMPLIED_PROBABILITY: &str = "implied_probability";

/// One normalized unit of intelligence, as stored in its source table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CanonicalSignal {
    pub id: String,
    pub source: String,
    pub timestamp: DateTime<FixedOffset>,
    pub author: String,
    pub display_text: String,
    #[serde(default)]
    pub url: Option<String>,
    /// Logical event key (market slug, ...) used by the anti-flood selector.
    #[serde(default)]
    pub group_key: Option<String>,
    /// What distinguishes this signal inside its group (a market's question).
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub metrics: BTreeMap<String, f64>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub raw_payload: serde_json::Value,
}

impl CanonicalSignal {
    /// Missing metrics read as 0.
    pub fn metric(&self, name: &str) -> f64 {
        self.metrics.get(name).copied().unwrap_or(0.0)
    }

    /// Implied probability in percent; a market without a quote is a coin flip.
    pub fn implied_probability(&self) -> f64 {
        self.metrics.get(IMPLIED_PROBABILITY).copied().unwrap_or(50.0)
    }
}

/// A canonical signal after the scoring engine has run over it.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ScoredSignal {
    #[serde(flatten)]
    pub signal: CanonicalSignal,
    pub score: f64,
    pub category: String,
    pub is_backfill: bool,
}

impl ScoredSignal {
    pub fn new(signal: CanonicalSignal, score: f64, category: impl Into<String>) -> Self {
        Self {
            signal,
            score,
            category: category.into(),
            is_backfill: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.signal.id
    }

    pub fn author(&self) -> &str {
        &self.signal.author
    }
}

/// Orders by score descending. NaN never occurs (scores are clamped), but
/// `total_cmp` keeps the sort total anyway.
pub fn by_score_desc(a: &ScoredSignal, b: &ScoredSignal) -> std::cmp::Ordering {
    b.score.total_cmp(&a.score)
}

/// Lowercase hex of a SHA-256 digest.
pub fn sha256_hex(bytes: &[u8]) -> String {
    use std::fmt::Write as _;
    let digest = Sha256::digest(bytes);
    let mut out = String::with_capacity(64);
    for b in digest.iter() {
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// Deterministic signal id from stable content fields.
///
/// The fields are concatenated as-is; when all of them are empty the id is
/// derived from the raw item instead. `serde_json::Value` objects keep their
/// keys sorted, so the fallback is stable across key order in the payload.
pub fn signal_id(stable_fields: &[&str], raw_item: &serde_json::Value) -> String {
    let joined: String = stable_fields.concat();
    if joined.is_empty() {
        sha256_hex(raw_item.to_string().as_bytes())
    } else {
        sha256_hex(joined.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn id_is_stable_for_same_fields() {
        let raw = json!({"a": 1});
        let a = signal_id(&["Election", "Who wins?"], &raw);
        let b = signal_id(&["Election", "Who wins?"], &json!({"other": true}));
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn id_falls_back_to_payload_hash_independent_of_key_order() {
        let a: serde_json::Value = serde_json::from_str(r#"{"x":1,"y":2}"#).unwrap();
        let b: serde_json::Value = serde_json::from_str(r#"{"y":2,"x":1}"#).unwrap();
        assert_eq!(signal_id(&["", ""], &a), signal_id(&[], &b));
        assert_ne!(signal_id(&[""], &a), signal_id(&[""], &json!({"x": 3})));
    }
}
