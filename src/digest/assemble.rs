//! Digest data model and its assembly from per-source selections.

use chrono::{DateTime, FixedOffset};
use serde::Serialize;

use crate::freshness::FreshnessStatus;
use crate::model::ScoredSignal;

pub const HEADER_COLUMNS: [&str; 4] = ["Score", "Source", "Excerpt", "Link"];

/// Link rendered when a signal has none.
pub const NO_LINK: &str = "#";

#[derive(Debug, Clone, Serialize)]
pub struct Digest {
    pub generated_at: DateTime<FixedOffset>,
    pub sections: Vec<SourceSection>,
}

impl Digest {
    /// At least one fresh source produced rows.
    pub fn has_content(&self) -> bool {
        self.sections.iter().any(|s| s.row_count() > 0)
    }

    pub fn row_count(&self) -> usize {
        self.sections.iter().map(SourceSection::row_count).sum()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SourceSection {
    Fresh {
        source: String,
        categories: Vec<CategoryTable>,
    },
    /// Collapsed placeholder; the source is skipped for this cycle.
    Stale {
        source: String,
        last_seen_at: Option<DateTime<FixedOffset>>,
        minutes_stale: Option<i64>,
    },
    /// The freshness or signal query itself failed.
    Unavailable { source: String, reason: String },
}

impl SourceSection {
    pub fn source(&self) -> &str {
        match self {
            SourceSection::Fresh { source, .. }
            | SourceSection::Stale { source, .. }
            | SourceSection::Unavailable { source, .. } => source,
        }
    }

    pub fn row_count(&self) -> usize {
        match self {
            SourceSection::Fresh { categories, .. } => categories.iter().map(|c| c.rows.len()).sum(),
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryTable {
    pub category: String,
    pub header_columns: Vec<String>,
    pub rows: Vec<DigestRow>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DigestRow {
    pub score: f64,
    pub author: String,
    pub excerpt: String,
    pub link: String,
    pub is_backfill: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct DigestAssembler {
    excerpt_chars: usize,
}

impl DigestAssembler {
    pub fn new(excerpt_chars: usize) -> Self {
        Self { excerpt_chars }
    }

    pub fn row(&self, s: &ScoredSignal) -> DigestRow {
        let link = s
            .signal
            .url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .unwrap_or(NO_LINK)
            .to_string();
        DigestRow {
            score: s.score,
            author: s.signal.author.clone(),
            excerpt: excerpt(&s.signal.display_text, self.excerpt_chars),
            link,
            is_backfill: s.is_backfill,
        }
    }

    /// Tables come in display order with rows already score-ordered; empty
    /// tables are dropped.
    pub fn fresh<I>(&self, source: &str, tables: I) -> SourceSection
    where
        I: IntoIterator<Item = (String, Vec<ScoredSignal>)>,
    {
        let categories = tables
            .into_iter()
            .filter(|(_, list)| !list.is_empty())
            .map(|(category, list)| CategoryTable {
                category,
                header_columns: HEADER_COLUMNS.iter().map(|c| c.to_string()).collect(),
                rows: list.iter().map(|s| self.row(s)).collect(),
            })
            .collect();
        SourceSection::Fresh {
            source: source.to_string(),
            categories,
        }
    }

    pub fn stale(&self, status: &FreshnessStatus, now: DateTime<FixedOffset>) -> SourceSection {
        SourceSection::Stale {
            source: status.source.clone(),
            last_seen_at: status.last_seen_at,
            minutes_stale: status.minutes_stale(now),
        }
    }

    pub fn unavailable(&self, source: &str, reason: impl Into<String>) -> SourceSection {
        SourceSection::Unavailable {
            source: source.to_string(),
            reason: reason.into(),
        }
    }
}

/// Single-line excerpt of at most `max_chars` characters, `...` when cut.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        return flat;
    }
    let mut cut: String = flat.chars().take(max_chars).collect();
    cut.truncate(cut.trim_end().len());
    cut.push_str("...");
    cut
}
