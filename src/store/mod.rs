//! Durable storage seam: the ingestion ledger plus one signal table per source.

pub mod memory;
pub mod rest;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};

use crate::error::RefineryError;
use crate::ingest::types::IngestionMarker;
use crate::model::CanonicalSignal;

pub use memory::MemoryStore;
pub use rest::RestStore;

/// Ledger table name.
pub const LEDGER_TABLE: &str = "processed_files";

#[async_trait]
pub trait SignalStore: Send + Sync {
    async fn has_marker(&self, content_hash: &str) -> Result<bool, RefineryError>;

    /// Atomic compare-and-insert. `true` iff this call created the marker;
    /// `false` when the hash was already present.
    async fn insert_marker(&self, marker: &IngestionMarker) -> Result<bool, RefineryError>;

    /// Insert or replace by `id`.
    async fn upsert_signals(
        &self,
        table: &str,
        signals: &[CanonicalSignal],
    ) -> Result<(), RefineryError>;

    async fn latest_timestamp(
        &self,
        table: &str,
    ) -> Result<Option<DateTime<FixedOffset>>, RefineryError>;

    /// Signals with `timestamp >= since`, newest first, at most `limit`.
    async fn signals_since(
        &self,
        table: &str,
        since: DateTime<FixedOffset>,
        limit: usize,
    ) -> Result<Vec<CanonicalSignal>, RefineryError>;
}
