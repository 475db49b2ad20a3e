// src/config/tuning.rs
//! Immutable tuning values: thresholds, quotas and per-source scoring tables.
//!
//! Loaded once at startup and handed to each component at construction:
//! 1) $REFINERY_CONFIG_PATH
//! 2) config/refinery.toml
//! 3) built-in `default_seed()`

use anyhow::{anyhow, Context, Result};
use chrono::FixedOffset;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::RefineryError;

pub const ENV_CONFIG_PATH: &str = "REFINERY_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/refinery.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RefineryConfig {
    pub ingest: IngestSettings,
    pub freshness: FreshnessSettings,
    pub selection: SelectionSettings,
    pub digest: DigestSettings,
    pub sources: BTreeMap<String, SourceProfile>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IngestSettings {
    /// Max signals per storage write.
    pub chunk_size: usize,
    /// Concurrent payloads in flight.
    pub max_concurrency: usize,
    pub incremental_window_hours: i64,
    /// Text shorter than this with no link is dropped at normalization.
    pub min_text_chars: usize,
    pub max_text_chars: usize,
    pub utc_offset_hours: i32,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            max_concurrency: 8,
            incremental_window_hours: 24,
            min_text_chars: 4,
            max_text_chars: 1500,
            utc_offset_hours: 8,
        }
    }
}

impl IngestSettings {
    pub fn fixed_offset(&self) -> Result<FixedOffset, RefineryError> {
        FixedOffset::east_opt(self.utc_offset_hours * 3600).ok_or_else(|| {
            RefineryError::Configuration(format!(
                "utc_offset_hours out of range: {}",
                self.utc_offset_hours
            ))
        })
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct FreshnessSettings {
    pub threshold_minutes: i64,
}

impl Default for FreshnessSettings {
    fn default() -> Self {
        // hourly collectors + 5 minutes of slack
        Self {
            threshold_minutes: 65,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct SelectionSettings {
    pub consensus_above: f64,
    pub conflict_below: f64,
    pub backfill_ratio: f64,
    pub group_cap: usize,
    /// Subjects at or above this word-level similarity count as the same
    /// sub-question.
    pub duplicate_similarity: f64,
    pub floor_quota: usize,
}

impl Default for SelectionSettings {
    fn default() -> Self {
        Self {
            consensus_above: 80.0,
            conflict_below: 15.0,
            backfill_ratio: 0.2,
            group_cap: 2,
            duplicate_similarity: 0.9,
            floor_quota: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct DigestSettings {
    pub lookback_hours: i64,
    pub excerpt_chars: usize,
    /// Upper bound on rows read per source per cycle.
    pub fetch_limit: usize,
}

impl Default for DigestSettings {
    fn default() -> Self {
        Self {
            lookback_hours: 24,
            excerpt_chars: 85,
            fetch_limit: 1000,
        }
    }
}

/// Per-source selection and scoring knobs.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceProfile {
    /// Storage table; defaults to `{source}_logs`.
    pub table: Option<String>,
    pub target_quota: usize,
    /// Digest size for this source after the diversity breaker.
    pub max_items: usize,
    pub per_author_cap: usize,
    /// A signal may also count toward every category named by its tags.
    pub multi_tag: bool,
    /// Quota-exempt tables shown ahead of the categories, in this order.
    pub featured: Vec<FeaturedPool>,
    pub scoring: ScoringProfile,
}

impl Default for SourceProfile {
    fn default() -> Self {
        Self {
            table: None,
            target_quota: 30,
            max_items: 40,
            per_author_cap: 3,
            multi_tag: false,
            featured: Vec::new(),
            scoring: ScoringProfile::default(),
        }
    }
}

impl SourceProfile {
    pub fn table_name(&self, source: &str) -> String {
        self.table
            .clone()
            .unwrap_or_else(|| format!("{source}_logs"))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScoringProfile {
    pub metric_weights: BTreeMap<String, f64>,
    /// Extra multiplier per tag: base × (1 + tag_synergy × tags).
    pub tag_synergy: f64,
    /// Base multiplied by the factor of every listed tag the signal carries
    /// (case-insensitive).
    pub tag_multipliers: BTreeMap<String, f64>,
    pub keyword_boosts: Vec<KeywordBoost>,
    /// Declaration order matters for equal-length keyword ties.
    pub categories: Vec<CategoryRule>,
    pub category_bonus: f64,
    pub category_boost: f64,
    pub general_penalty: f64,
    pub noise_keywords: Vec<String>,
    pub immunity_keywords: Vec<String>,
    pub noise_penalty: f64,
    pub noise_bucket: String,
    pub authority: Vec<String>,
    pub authority_bonus: f64,
}

impl Default for ScoringProfile {
    fn default() -> Self {
        Self {
            metric_weights: BTreeMap::new(),
            tag_synergy: 0.0,
            tag_multipliers: BTreeMap::new(),
            keyword_boosts: Vec::new(),
            categories: Vec::new(),
            category_bonus: 10.0,
            category_boost: 1.5,
            general_penalty: 0.5,
            noise_keywords: Vec::new(),
            immunity_keywords: Vec::new(),
            noise_penalty: 0.1,
            noise_bucket: "Noise".to_string(),
            authority: Vec::new(),
            authority_bonus: 100.0,
        }
    }
}

/// Base multiplied by `factor` when the text hits any of `keywords` and none
/// of `unless`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct KeywordBoost {
    pub keywords: Vec<String>,
    #[serde(default)]
    pub unless: Vec<String>,
    pub factor: f64,
}

/// A table rendered outside the quota: every member is shown, up to `limit`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct FeaturedPool {
    pub name: String,
    /// Members carry this tag (case-insensitive). Without one the pool takes
    /// the top of everything not claimed by a tagged pool.
    #[serde(default)]
    pub tag: Option<String>,
    /// 0 keeps every member.
    #[serde(default)]
    pub limit: usize,
}

impl FeaturedPool {
    pub fn new(name: &str, tag: Option<&str>, limit: usize) -> Self {
        Self {
            name: name.to_string(),
            tag: tag.map(str::to_string),
            limit,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct CategoryRule {
    pub name: String,
    pub keywords: Vec<String>,
}

impl CategoryRule {
    pub fn new(name: &str, keywords: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }
}

impl Default for RefineryConfig {
    fn default() -> Self {
        Self::default_seed()
    }
}

impl RefineryConfig {
    /// Load from an explicit TOML path and validate.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading tuning config from {}", path.display()))?;
        let cfg: RefineryConfig = toml::from_str(&content)
            .with_context(|| format!("parsing tuning config {}", path.display()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Env var first, then `config/refinery.toml`, then the built-in seed.
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            }
            return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
        }
        let default_path = PathBuf::from(DEFAULT_CONFIG_PATH);
        if default_path.exists() {
            return Self::load_from(&default_path);
        }
        Ok(Self::default_seed())
    }

    pub fn validate(&self) -> Result<(), RefineryError> {
        let bad = |msg: String| Err(RefineryError::Configuration(msg));
        self.ingest.fixed_offset()?;
        if self.ingest.chunk_size == 0 {
            return bad("ingest.chunk_size must be > 0".into());
        }
        if self.ingest.max_concurrency == 0 {
            return bad("ingest.max_concurrency must be > 0".into());
        }
        if self.freshness.threshold_minutes <= 0 {
            return bad("freshness.threshold_minutes must be > 0".into());
        }
        if self.selection.group_cap == 0 {
            return bad("selection.group_cap must be > 0".into());
        }
        for (name, src) in &self.sources {
            let s = &src.scoring;
            if s.category_boost <= 1.0 {
                return bad(format!("sources.{name}.scoring.category_boost must be > 1"));
            }
            if !(0.0..1.0).contains(&s.general_penalty) {
                return bad(format!("sources.{name}.scoring.general_penalty must be in [0,1)"));
            }
            if !(0.0..1.0).contains(&s.noise_penalty) {
                return bad(format!("sources.{name}.scoring.noise_penalty must be in [0,1)"));
            }
            if src.per_author_cap == 0 {
                return bad(format!("sources.{name}.per_author_cap must be > 0"));
            }
            let factors = s
                .tag_multipliers
                .values()
                .chain(s.keyword_boosts.iter().map(|b| &b.factor));
            for f in factors {
                if !f.is_finite() || *f <= 0.0 {
                    return bad(format!("sources.{name}.scoring multipliers must be > 0"));
                }
            }
            if src.featured.iter().any(|f| f.name.trim().is_empty()) {
                return bad(format!("sources.{name}.featured pools need a name"));
            }
        }
        Ok(())
    }

    /// Built-in tables matching the collectors currently in the archive.
    pub fn default_seed() -> Self {
        let mut sources = BTreeMap::new();
        sources.insert("polymarket".to_string(), polymarket_profile());
        sources.insert("twitter".to_string(), twitter_profile());
        sources.insert("reddit".to_string(), reddit_profile());
        sources.insert("github".to_string(), github_profile());
        sources.insert("papers".to_string(), papers_profile());
        Self {
            ingest: IngestSettings::default(),
            freshness: FreshnessSettings::default(),
            selection: SelectionSettings::default(),
            digest: DigestSettings::default(),
            sources,
        }
    }
}

fn weights(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn sector_categories() -> Vec<CategoryRule> {
    vec![
        CategoryRule::new("Politics", &["politics", "election", "senate", "congress", "president", "white house", "parliament"]),
        CategoryRule::new("Geopolitics", &["geopolitics", "war", "ceasefire", "nato", "sanction", "invasion", "taiwan strait"]),
        CategoryRule::new("Science", &["science", "research", "nasa", "physics", "quantum", "vaccine"]),
        CategoryRule::new("Tech", &["tech", "ai", "openai", "semiconductor", "chip", "nvidia", "software"]),
        CategoryRule::new("Finance", &["finance", "stocks", "nasdaq", "earnings", "bond", "treasury", "gold", "xau"]),
        CategoryRule::new("Crypto", &["crypto", "bitcoin", "btc", "ethereum", "stablecoin", "etf flows"]),
        CategoryRule::new("Economy", &["economy", "inflation", "cpi", "tariff", "federal reserve", "fed", "recession", "jobs report"]),
    ]
}

fn noise_keywords() -> Vec<String> {
    strings(&["scandal", "outrage", "shocking", "gossip", "celebrity", "meme", "drama", "slams"])
}

fn immunity_keywords() -> Vec<String> {
    strings(&["tariff", "sanction", "federal reserve", "inflation", "regulation", "court ruling", "supreme court", "legislation", "treasury"])
}

fn polymarket_profile() -> SourceProfile {
    SourceProfile {
        target_quota: 50,
        max_items: 80,
        // author is the market ticker; the group selector already caps per event
        per_author_cap: 2,
        scoring: ScoringProfile {
            metric_weights: weights(&[("momentum", 1.0)]),
            categories: sector_categories(),
            category_bonus: 0.0,
            category_boost: 2.0,
            general_penalty: 0.5,
            noise_keywords: noise_keywords(),
            immunity_keywords: immunity_keywords(),
            tag_multipliers: weights(&[("TAIL_RISK", 50.0), ("HIGH_CERTAINTY", 30.0)]),
            keyword_boosts: vec![KeywordBoost {
                keywords: strings(&["gold", "bitcoin", "btc", "fed", "federal reserve", "xau"]),
                unless: strings(&["warsh"]),
                factor: 100.0,
            }],
            ..ScoringProfile::default()
        },
        // sniper files are watched markets: all of them, outside the quota
        featured: vec![FeaturedPool::new("SNIPER", Some("sniper"), 0)],
        ..SourceProfile::default()
    }
}

fn twitter_profile() -> SourceProfile {
    SourceProfile {
        target_quota: 30,
        max_items: 40,
        per_author_cap: 3,
        multi_tag: true,
        scoring: ScoringProfile {
            // bookmark > share > like; growth counts more than totals
            metric_weights: weights(&[
                ("bookmarks", 10.0),
                ("quotes", 12.0),
                ("retweets", 8.0),
                ("replies", 5.0),
                ("likes", 1.0),
                ("growth_likes", 15.0),
                ("growth_retweets", 25.0),
                ("growth_replies", 10.0),
            ]),
            tag_synergy: 0.3,
            categories: sector_categories(),
            category_bonus: 50.0,
            category_boost: 1.5,
            general_penalty: 0.5,
            noise_keywords: noise_keywords(),
            immunity_keywords: immunity_keywords(),
            authority: strings(&["elonmusk", "federalreserve", "zerohedge", "business", "reuters"]),
            authority_bonus: 500.0,
            ..ScoringProfile::default()
        },
        ..SourceProfile::default()
    }
}

fn reddit_profile() -> SourceProfile {
    SourceProfile {
        target_quota: 5,
        max_items: 10,
        per_author_cap: 3,
        featured: vec![FeaturedPool::new("Viral", None, 5)],
        scoring: ScoringProfile {
            metric_weights: weights(&[("upvotes", 1.0), ("comments", 2.0)]),
            categories: vec![
                CategoryRule::new("Market Movers", &["wallstreetbets", "stocks", "options", "investing", "economy", "bitcoin"]),
                CategoryRule::new("Tech", &["technology", "hardware", "semiconductors", "futurology"]),
            ],
            category_bonus: 20.0,
            category_boost: 1.3,
            general_penalty: 0.8,
            noise_keywords: noise_keywords(),
            immunity_keywords: immunity_keywords(),
            ..ScoringProfile::default()
        },
        ..SourceProfile::default()
    }
}

fn github_profile() -> SourceProfile {
    SourceProfile {
        target_quota: 20,
        max_items: 25,
        per_author_cap: 2,
        multi_tag: true,
        scoring: ScoringProfile {
            metric_weights: weights(&[("stars", 1.0), ("forks", 2.0)]),
            categories: vec![
                CategoryRule::new("AI", &["llm", "agent", "machine-learning", "ai", "diffusion", "transformer"]),
                CategoryRule::new("Infra", &["database", "kubernetes", "compiler", "runtime", "rust"]),
                CategoryRule::new("Crypto", &["blockchain", "ethereum", "solana", "wallet"]),
            ],
            category_bonus: 0.0,
            category_boost: 1.2,
            general_penalty: 0.9,
            ..ScoringProfile::default()
        },
        ..SourceProfile::default()
    }
}

fn papers_profile() -> SourceProfile {
    SourceProfile {
        target_quota: 10,
        max_items: 13,
        per_author_cap: 2,
        featured: vec![FeaturedPool::new("NUCLEAR", Some("nuclear"), 3)],
        scoring: ScoringProfile {
            metric_weights: weights(&[("citations", 1.0), ("nuclear", 1000.0), ("early", 50.0)]),
            categories: vec![
                CategoryRule::new("Machine Learning", &["neural", "language model", "reinforcement learning", "transformer", "diffusion"]),
                CategoryRule::new("Physics", &["quantum", "superconduct", "fusion", "photonic"]),
                CategoryRule::new("Biology", &["protein", "genome", "crispr", "cell"]),
            ],
            category_bonus: 5.0,
            category_boost: 1.2,
            general_penalty: 0.9,
            ..ScoringProfile::default()
        },
        ..SourceProfile::default()
    }
}
