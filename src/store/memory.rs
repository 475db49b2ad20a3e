//! In-process store. Used by tests and dry runs.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use std::collections::{BTreeMap, HashMap, HashSet};
use tokio::sync::Mutex;

use super::SignalStore;
use crate::error::RefineryError;
use crate::ingest::types::IngestionMarker;
use crate::model::CanonicalSignal;

#[derive(Default)]
pub struct MemoryStore {
    markers: Mutex<HashMap<String, IngestionMarker>>,
    tables: Mutex<BTreeMap<String, BTreeMap<String, CanonicalSignal>>>,
    /// Tables whose reads fail, for exercising transient-failure paths.
    broken: Mutex<Vec<String>>,
    /// Marker inserts still to fail.
    marker_failures: Mutex<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn marker_count(&self) -> usize {
        self.markers.lock().await.len()
    }

    pub async fn signal_count(&self, table: &str) -> usize {
        self.tables.lock().await.get(table).map_or(0, BTreeMap::len)
    }

    pub async fn break_table(&self, table: &str) {
        self.broken.lock().await.push(table.to_string());
    }

    /// Fail the next `n` marker inserts with a transient error.
    pub async fn fail_marker_inserts(&self, n: usize) {
        *self.marker_failures.lock().await = n;
    }

    async fn check(&self, table: &str) -> Result<(), RefineryError> {
        if self.broken.lock().await.iter().any(|t| t == table) {
            return Err(RefineryError::TransientExternal(format!(
                "table {table} unavailable"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl SignalStore for MemoryStore {
    async fn has_marker(&self, content_hash: &str) -> Result<bool, RefineryError> {
        Ok(self.markers.lock().await.contains_key(content_hash))
    }

    async fn insert_marker(&self, marker: &IngestionMarker) -> Result<bool, RefineryError> {
        {
            let mut pending = self.marker_failures.lock().await;
            if *pending > 0 {
                *pending -= 1;
                return Err(RefineryError::TransientExternal("ledger write timed out".into()));
            }
        }
        let mut markers = self.markers.lock().await;
        if markers.contains_key(&marker.content_hash) {
            return Ok(false);
        }
        markers.insert(marker.content_hash.clone(), marker.clone());
        Ok(true)
    }

    async fn upsert_signals(
        &self,
        table: &str,
        signals: &[CanonicalSignal],
    ) -> Result<(), RefineryError> {
        self.check(table).await?;
        let mut ids = HashSet::new();
        if let Some(dup) = signals.iter().find(|s| !ids.insert(s.id.as_str())) {
            // same rejection a SQL upsert gives for a row hit twice in one statement
            return Err(RefineryError::TransientExternal(format!(
                "upsert into {table} touches row {} twice",
                dup.id
            )));
        }
        let mut tables = self.tables.lock().await;
        let rows = tables.entry(table.to_string()).or_default();
        for s in signals {
            rows.insert(s.id.clone(), s.clone());
        }
        Ok(())
    }

    async fn latest_timestamp(
        &self,
        table: &str,
    ) -> Result<Option<DateTime<FixedOffset>>, RefineryError> {
        self.check(table).await?;
        let tables = self.tables.lock().await;
        Ok(tables
            .get(table)
            .and_then(|rows| rows.values().map(|s| s.timestamp).max()))
    }

    async fn signals_since(
        &self,
        table: &str,
        since: DateTime<FixedOffset>,
        limit: usize,
    ) -> Result<Vec<CanonicalSignal>, RefineryError> {
        self.check(table).await?;
        let tables = self.tables.lock().await;
        let mut out: Vec<CanonicalSignal> = tables
            .get(table)
            .map(|rows| {
                rows.values()
                    .filter(|s| s.timestamp >= since)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        out.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        out.truncate(limit);
        Ok(out)
    }
}
