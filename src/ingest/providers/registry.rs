//! Source key → normalizer + scoring engine + profile, built once from config.

use serde_json::Value;
use std::collections::BTreeMap;

use super::{builtin, NormalizeCtx, SourceNormalizer};
use crate::analyze::ScoringEngine;
use crate::config::{RefineryConfig, SourceProfile};
use crate::error::RefineryError;
use crate::model::CanonicalSignal;

pub struct SourceEntry {
    pub normalizer: Box<dyn SourceNormalizer>,
    pub engine: ScoringEngine,
    pub profile: SourceProfile,
    pub table: String,
}

pub struct SourceRegistry {
    entries: BTreeMap<String, SourceEntry>,
    min_text_chars: usize,
}

impl SourceRegistry {
    /// Every configured source must have a built-in normalizer.
    pub fn from_config(cfg: &RefineryConfig) -> Result<Self, RefineryError> {
        let mut entries = BTreeMap::new();
        for (key, profile) in &cfg.sources {
            let normalizer = builtin(key).ok_or_else(|| {
                RefineryError::Configuration(format!("no normalizer for source `{key}`"))
            })?;
            entries.insert(
                key.clone(),
                SourceEntry {
                    normalizer,
                    engine: ScoringEngine::new(profile.scoring.clone()),
                    table: profile.table_name(key),
                    profile: profile.clone(),
                },
            );
        }
        Ok(Self {
            entries,
            min_text_chars: cfg.ingest.min_text_chars,
        })
    }

    pub fn get(&self, key: &str) -> Option<&SourceEntry> {
        self.entries.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SourceEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Run the source's normalizer and drop low-signal records.
    pub fn normalize(
        &self,
        key: &str,
        raw: &Value,
        ctx: &NormalizeCtx,
    ) -> Result<Vec<CanonicalSignal>, RefineryError> {
        let entry = self.get(key).ok_or_else(|| {
            RefineryError::MalformedInput(format!("no normalizer for source `{key}`"))
        })?;
        let mut signals = entry.normalizer.process(raw, ctx)?;
        let before = signals.len();
        signals.retain(|s| !is_low_signal(s, self.min_text_chars));
        if signals.len() < before {
            tracing::debug!(
                source = key,
                path = %ctx.path,
                dropped = before - signals.len(),
                "dropped low-signal records"
            );
        }
        Ok(signals)
    }
}

/// Too short to read and nothing to click through to.
pub fn is_low_signal(signal: &CanonicalSignal, min_text_chars: usize) -> bool {
    let text = signal.display_text.trim();
    text.chars().count() < min_text_chars
        && signal.url.as_deref().map_or(true, str::is_empty)
        && !text.contains("http://")
        && !text.contains("https://")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};
    use serde_json::json;

    fn ctx() -> NormalizeCtx {
        let offset = FixedOffset::east_opt(8 * 3600).unwrap();
        NormalizeCtx {
            path: "twitter/a.json".into(),
            batch_time: offset.with_ymd_and_hms(2026, 2, 5, 9, 0, 0).unwrap(),
            offset,
            max_text_chars: 1500,
        }
    }

    #[test]
    fn default_seed_registers_every_source() {
        let reg = SourceRegistry::from_config(&RefineryConfig::default_seed()).unwrap();
        let keys: Vec<&str> = reg.keys().collect();
        for k in ["github", "papers", "polymarket", "reddit", "twitter"] {
            assert!(keys.contains(&k), "missing {k}");
        }
        assert_eq!(reg.get("twitter").unwrap().table, "twitter_logs");
    }

    #[test]
    fn unknown_source_in_config_is_fatal() {
        let mut cfg = RefineryConfig::default_seed();
        cfg.sources.insert("myspace".into(), SourceProfile::default());
        let err = SourceRegistry::from_config(&cfg).err().unwrap();
        assert!(err.is_fatal());
    }

    #[test]
    fn short_unlinked_text_is_dropped() {
        let reg = SourceRegistry::from_config(&RefineryConfig::default_seed()).unwrap();
        let raw = json!([
            {"user": {"screenName": "a"}, "fullText": "ok"},
            {"user": {"screenName": "b"}, "fullText": "ok", "tweetUrl": "https://x.com/b/status/1"},
            {"user": {"screenName": "c"}, "fullText": "long enough to keep"}
        ]);
        let out = reg.normalize("twitter", &raw, &ctx()).unwrap();
        let authors: Vec<&str> = out.iter().map(|s| s.author.as_str()).collect();
        assert_eq!(authors, vec!["b", "c"]);
    }
}
