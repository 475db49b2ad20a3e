// src/ingest/types.rs
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::error::RefineryError;

/// One payload file as produced by a collector. Consumed once.
#[derive(Debug, Clone)]
pub struct RawPayload {
    pub source_key: String, // e.g., "twitter", "polymarket"
    pub path: String,       // archive-relative, '/'-separated
    pub bytes: Vec<u8>,
}

/// Ledger row. Append-only: written once per content hash, never updated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IngestionMarker {
    pub content_hash: String,
    pub source_path: String,
    pub processed_at: DateTime<FixedOffset>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Content hash already in the ledger. Not an error.
    Duplicate,
}

#[derive(Debug)]
pub enum IngestOutcome {
    Inserted { signals: usize },
    Skipped(SkipReason),
    Failed(RefineryError),
}

/// Batch counters folded from per-payload outcomes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub scanned: usize,
    pub inserted: usize,
    pub duplicates: usize,
    pub failed: usize,
    pub signals: usize,
}

impl IngestReport {
    pub fn record(&mut self, outcome: &IngestOutcome) {
        self.scanned += 1;
        match outcome {
            IngestOutcome::Inserted { signals } => {
                self.inserted += 1;
                self.signals += signals;
            }
            IngestOutcome::Skipped(SkipReason::Duplicate) => self.duplicates += 1,
            IngestOutcome::Failed(_) => self.failed += 1,
        }
    }
}
