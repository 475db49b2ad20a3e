//! Scoring engine: weighted engagement × tag/keyword multipliers → category
//! weighting → noise suppression → authority bonus.
//!
//! Pure function of the signal's stored fields and the immutable profile;
//! re-scoring a stored signal always reproduces the same result.

use serde::Serialize;

use super::authority::AuthorityList;
use super::noise::{NoiseFilter, NoiseVerdict};
use super::rules::{any_keyword, compile_keywords, normalize, KeywordTable};
use crate::config::ScoringProfile;
use crate::model::{CanonicalSignal, ScoredSignal, GENERAL_CATEGORY};

#[derive(Debug, Clone)]
pub struct ScoringEngine {
    profile: ScoringProfile,
    table: KeywordTable,
    noise: NoiseFilter,
    authority: AuthorityList,
    tag_factors: Vec<(String, f64)>,
    boosts: Vec<CompiledBoost>,
}

#[derive(Debug, Clone)]
struct CompiledBoost {
    keywords: Vec<String>,
    unless: Vec<String>,
    factor: f64,
}

/// Every intermediate value, for logs and tests.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub base: f64,
    pub multiplier: f64,
    pub matched_keyword: Option<String>,
    pub after_category: f64,
    pub noise: bool,
    pub authority: bool,
    pub score: f64,
    pub category: String,
}

impl ScoringEngine {
    pub fn new(profile: ScoringProfile) -> Self {
        let table = KeywordTable::new(&profile.categories);
        let noise = NoiseFilter::new(&profile.noise_keywords, &profile.immunity_keywords);
        let authority = AuthorityList::new(&profile.authority);
        let tag_factors = profile
            .tag_multipliers
            .iter()
            .map(|(tag, f)| (tag.to_lowercase(), *f))
            .collect();
        let boosts = profile
            .keyword_boosts
            .iter()
            .map(|b| CompiledBoost {
                keywords: compile_keywords(&b.keywords),
                unless: compile_keywords(&b.unless),
                factor: b.factor,
            })
            .collect();
        Self {
            profile,
            table,
            noise,
            authority,
            tag_factors,
            boosts,
        }
    }

    pub fn profile(&self) -> &ScoringProfile {
        &self.profile
    }

    /// Weighted engagement sum, scaled by tag synergy.
    pub fn base_score(&self, signal: &CanonicalSignal) -> f64 {
        let weighted: f64 = self
            .profile
            .metric_weights
            .iter()
            .map(|(name, w)| w * signal.metric(name))
            .sum();
        weighted * (1.0 + self.profile.tag_synergy * signal.tags.len() as f64)
    }

    /// Product of the tag multipliers and keyword boosts that apply.
    /// `text` is the normalized match text.
    pub fn multiplier(&self, signal: &CanonicalSignal, text: &str) -> f64 {
        let tags: Vec<String> = signal.tags.iter().map(|t| t.to_lowercase()).collect();
        let by_tag: f64 = self
            .tag_factors
            .iter()
            .filter(|(tag, _)| tags.contains(tag))
            .map(|(_, f)| f)
            .product();
        let by_keyword: f64 = self
            .boosts
            .iter()
            .filter(|b| any_keyword(text, &b.keywords) && !any_keyword(text, &b.unless))
            .map(|b| b.factor)
            .product();
        by_tag * by_keyword
    }

    pub fn breakdown(&self, signal: &CanonicalSignal) -> ScoreBreakdown {
        let p = &self.profile;
        let text = match_text(signal);
        let multiplier = self.multiplier(signal, &text);
        let base = self.base_score(signal) * multiplier;

        let (mut category, matched_keyword, after_category) = match self.table.detect(&text) {
            Some(m) => (
                m.category.to_string(),
                Some(m.keyword.to_string()),
                (base + p.category_bonus) * p.category_boost,
            ),
            None => (GENERAL_CATEGORY.to_string(), None, base * p.general_penalty),
        };

        let mut score = after_category;
        let noise = self.noise.judge(&text) == NoiseVerdict::Noise;
        if noise {
            score *= p.noise_penalty;
            category = p.noise_bucket.clone();
        }

        let authority = self.authority.matches(&signal.author);
        if authority {
            score += p.authority_bonus;
        }

        let score = if score.is_finite() { score.max(0.0) } else { 0.0 };

        ScoreBreakdown {
            base,
            multiplier,
            matched_keyword,
            after_category,
            noise,
            authority,
            score,
            category,
        }
    }

    pub fn score(&self, signal: &CanonicalSignal) -> (f64, String) {
        let b = self.breakdown(signal);
        (b.score, b.category)
    }

    pub fn score_signal(&self, signal: CanonicalSignal) -> ScoredSignal {
        let (score, category) = self.score(&signal);
        ScoredSignal::new(signal, score, category)
    }
}

/// Display text plus tags: source-provided labels count as keywords too.
fn match_text(signal: &CanonicalSignal) -> String {
    let mut raw = signal.display_text.clone();
    for tag in &signal.tags {
        raw.push(' ');
        raw.push_str(tag);
    }
    normalize(&raw)
}
