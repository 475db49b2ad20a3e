// src/ingest/mod.rs
pub mod history;
pub mod providers;
pub mod scan;
pub mod types;

use chrono::{DateTime, FixedOffset, Utc};
use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::config::IngestSettings;
use crate::error::RefineryError;
use crate::ingest::providers::{NormalizeCtx, SourceRegistry};
use crate::ingest::scan::{PayloadLocation, PayloadSource, ScanMode};
use crate::ingest::types::{IngestOutcome, IngestReport, IngestionMarker, RawPayload, SkipReason};
use crate::model::{sha256_hex, CanonicalSignal};
use crate::store::SignalStore;

/// One-time metrics registration (so series show up on the exporter).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_payloads_total", "Payloads handed to the gateway.");
        describe_counter!(
            "ingest_inserted_total",
            "Payloads whose signals were stored and marker written."
        );
        describe_counter!(
            "ingest_duplicate_total",
            "Payloads skipped because their content hash was already in the ledger."
        );
        describe_counter!(
            "ingest_failed_total",
            "Payloads that failed to parse, normalize or store."
        );
        describe_counter!("ingest_signals_total", "Canonical signals upserted.");
    });
}

/// Normalize text: decode entities, strip tags, fold curly quotes, collapse
/// whitespace and cap the length at `max_chars` characters.
pub fn normalize_text(s: &str, max_chars: usize) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[a-z!][^>]*>").unwrap());
    out = re_tags.replace_all(&out, " ").to_string();

    // 3) Normalize “ ” ‘ ’ « » to ASCII quotes
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace
    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").trim().to_string();

    // 5) Length cap
    if out.chars().count() > max_chars {
        out = out.chars().take(max_chars).collect::<String>().trim_end().to_string();
    }

    out
}

/// Ledger key: SHA-256 hex over the exact payload bytes.
pub fn content_hash(bytes: &[u8]) -> String {
    sha256_hex(bytes)
}

/// Collapse signals sharing an id, keeping the last occurrence. A storage
/// upsert may not touch the same row twice in one statement.
pub fn dedup_by_id(signals: Vec<CanonicalSignal>) -> Vec<CanonicalSignal> {
    let last: HashMap<String, usize> = signals
        .iter()
        .enumerate()
        .map(|(i, s)| (s.id.clone(), i))
        .collect();
    signals
        .into_iter()
        .enumerate()
        .filter(|(i, s)| last.get(&s.id) == Some(i))
        .map(|(_, s)| s)
        .collect()
}

/// Exactly-once ingestion of raw payloads into the signal store.
///
/// Per payload: ledger check, normalize, upsert signals by id in chunks, then
/// compare-and-insert the marker. A marker that loses the race turns the
/// outcome into a duplicate skip; the upserts it already did were idempotent.
#[derive(Clone)]
pub struct Gateway {
    store: Arc<dyn SignalStore>,
    registry: Arc<SourceRegistry>,
    settings: IngestSettings,
    offset: FixedOffset,
}

impl Gateway {
    pub fn new(
        store: Arc<dyn SignalStore>,
        registry: Arc<SourceRegistry>,
        settings: IngestSettings,
    ) -> Result<Self, RefineryError> {
        let offset = settings.fixed_offset()?;
        Ok(Self {
            store,
            registry,
            settings,
            offset,
        })
    }

    pub async fn ingest(&self, payload: RawPayload, now: DateTime<Utc>) -> IngestOutcome {
        ensure_metrics_described();
        counter!("ingest_payloads_total").increment(1);

        let outcome = match self.try_ingest(&payload, now).await {
            Ok(o) => o,
            Err(e) => IngestOutcome::Failed(e),
        };
        match &outcome {
            IngestOutcome::Inserted { signals } => {
                counter!("ingest_inserted_total").increment(1);
                counter!("ingest_signals_total").increment(*signals as u64);
                tracing::debug!(path = %payload.path, signals, "payload ingested");
            }
            IngestOutcome::Skipped(SkipReason::Duplicate) => {
                counter!("ingest_duplicate_total").increment(1);
                tracing::debug!(path = %payload.path, "duplicate payload skipped");
            }
            IngestOutcome::Failed(err) => {
                counter!("ingest_failed_total").increment(1);
                tracing::warn!(path = %payload.path, source = %payload.source_key, error = %err, "payload failed");
            }
        }
        outcome
    }

    async fn try_ingest(
        &self,
        payload: &RawPayload,
        now: DateTime<Utc>,
    ) -> Result<IngestOutcome, RefineryError> {
        let hash = content_hash(&payload.bytes);
        if self.store.has_marker(&hash).await? {
            return Ok(IngestOutcome::Skipped(SkipReason::Duplicate));
        }

        let table = self
            .registry
            .get(&payload.source_key)
            .map(|e| e.table.clone())
            .ok_or_else(|| {
                RefineryError::MalformedInput(format!(
                    "no normalizer for source `{}`",
                    payload.source_key
                ))
            })?;

        let raw: serde_json::Value = serde_json::from_slice(&payload.bytes)?;
        let batch_time = now.with_timezone(&self.offset);
        let ctx = NormalizeCtx {
            path: payload.path.clone(),
            batch_time,
            offset: self.offset,
            max_text_chars: self.settings.max_text_chars,
        };
        let signals = dedup_by_id(self.registry.normalize(&payload.source_key, &raw, &ctx)?);

        for chunk in signals.chunks(self.settings.chunk_size.max(1)) {
            self.store.upsert_signals(&table, chunk).await?;
        }

        let marker = IngestionMarker {
            content_hash: hash,
            source_path: payload.path.clone(),
            processed_at: batch_time,
        };
        if !self.store.insert_marker(&marker).await? {
            // a concurrent ingester recorded the same content first
            return Ok(IngestOutcome::Skipped(SkipReason::Duplicate));
        }
        Ok(IngestOutcome::Inserted {
            signals: signals.len(),
        })
    }

    /// Fetch and ingest every location the source yields for `mode`, with at
    /// most `max_concurrency` payloads in flight.
    pub async fn sync(
        &self,
        source: Arc<dyn PayloadSource>,
        mode: ScanMode,
        now: DateTime<Utc>,
    ) -> IngestReport {
        let locations = match source.locations(mode, now).await {
            Ok(it) => it,
            Err(e) => {
                // nothing ingested; the next invocation scans again
                tracing::warn!(error = %e, ?mode, "payload discovery failed");
                return IngestReport::default();
            }
        };

        let permits = Arc::new(Semaphore::new(self.settings.max_concurrency.max(1)));
        let mut tasks: JoinSet<IngestOutcome> = JoinSet::new();

        for loc in locations {
            let Ok(permit) = permits.clone().acquire_owned().await else {
                break;
            };
            let gateway = self.clone();
            let source = source.clone();
            tasks.spawn(async move {
                let _permit = permit;
                gateway.fetch_and_ingest(source.as_ref(), loc, now).await
            });
        }

        let mut report = IngestReport::default();
        while let Some(joined) = tasks.join_next().await {
            let outcome = joined.unwrap_or_else(|e| {
                IngestOutcome::Failed(RefineryError::TransientExternal(format!("worker: {e}")))
            });
            report.record(&outcome);
        }

        tracing::info!(
            scanned = report.scanned,
            inserted = report.inserted,
            duplicates = report.duplicates,
            failed = report.failed,
            signals = report.signals,
            "ingest sync finished"
        );
        report
    }

    async fn fetch_and_ingest(
        &self,
        source: &dyn PayloadSource,
        loc: PayloadLocation,
        now: DateTime<Utc>,
    ) -> IngestOutcome {
        match source.fetch(&loc).await {
            Ok(bytes) => {
                let payload = RawPayload {
                    source_key: loc.source_key,
                    path: loc.path,
                    bytes,
                };
                self.ingest(payload, now).await
            }
            Err(err) => {
                ensure_metrics_described();
                counter!("ingest_payloads_total").increment(1);
                counter!("ingest_failed_total").increment(1);
                tracing::warn!(path = %loc.path, error = %err, "payload fetch failed");
                IngestOutcome::Failed(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RefineryConfig;
    use crate::store::MemoryStore;
    use chrono::TimeZone;

    #[test]
    fn normalize_text_collapses_ws_and_keeps_punct() {
        let s = "  Hello,&nbsp;&nbsp; world!!!  ";
        assert_eq!(normalize_text(s, 1500), "Hello, world!!!");
        assert_eq!(normalize_text("Will it pass?", 1500), "Will it pass?");
    }

    #[test]
    fn normalize_text_strips_tags_and_folds_quotes() {
        let s = "<p>He said \u{201C}ship it\u{201D}</p><br/>now";
        assert_eq!(normalize_text(s, 1500), "He said \"ship it\" now");
        assert_eq!(normalize_text("a < b and c > d", 1500), "a < b and c > d");
    }

    #[test]
    fn normalize_text_caps_by_chars() {
        let s = "é".repeat(20);
        assert_eq!(normalize_text(&s, 5).chars().count(), 5);
    }

    #[test]
    fn content_hash_is_byte_exact() {
        assert_eq!(content_hash(b"[]"), content_hash(b"[]"));
        assert_ne!(content_hash(b"[]"), content_hash(b"[ ]"));
        assert_eq!(content_hash(b"").len(), 64);
    }

    fn gateway(store: Arc<MemoryStore>) -> Gateway {
        let cfg = RefineryConfig::default_seed();
        let registry = Arc::new(SourceRegistry::from_config(&cfg).unwrap());
        Gateway::new(store, registry, cfg.ingest.clone()).unwrap()
    }

    fn payload(path: &str, body: &str) -> RawPayload {
        RawPayload {
            source_key: "twitter".into(),
            path: path.into(),
            bytes: body.as_bytes().to_vec(),
        }
    }

    #[tokio::test]
    async fn malformed_json_fails_without_marker() {
        let store = Arc::new(MemoryStore::new());
        let gw = gateway(store.clone());
        let out = gw.ingest(payload("twitter/bad.json", "{not json"), Utc::now()).await;
        assert!(matches!(out, IngestOutcome::Failed(RefineryError::MalformedInput(_))));
        assert_eq!(store.marker_count().await, 0);
    }

    #[tokio::test]
    async fn repeated_ids_in_one_payload_collapse_to_the_last() {
        let store = Arc::new(MemoryStore::new());
        let gw = gateway(store.clone());
        let body = r#"[
            {"name": "o/r", "description": "first", "stars": 1},
            {"name": "other/x", "stars": 2},
            {"name": "o/r", "description": "second", "stars": 3}
        ]"#;
        let out = gw
            .ingest(
                RawPayload {
                    source_key: "github".into(),
                    path: "github/trending.json".into(),
                    bytes: body.as_bytes().to_vec(),
                },
                Utc::now(),
            )
            .await;
        assert!(matches!(out, IngestOutcome::Inserted { signals: 2 }));
        assert_eq!(store.signal_count("github_logs").await, 2);
        assert_eq!(store.marker_count().await, 1);
    }

    #[test]
    fn dedup_keeps_last_occurrence_in_place() {
        let mk = |id: &str, text: &str| CanonicalSignal {
            id: id.into(),
            source: "github".into(),
            timestamp: FixedOffset::east_opt(0).unwrap().timestamp_opt(0, 0).unwrap(),
            author: "a".into(),
            display_text: text.into(),
            url: None,
            group_key: None,
            subject: None,
            metrics: Default::default(),
            tags: Default::default(),
            raw_payload: serde_json::Value::Null,
        };
        let out = dedup_by_id(vec![mk("a", "1"), mk("b", "2"), mk("a", "3")]);
        let got: Vec<(&str, &str)> = out.iter().map(|s| (s.id.as_str(), s.display_text.as_str())).collect();
        assert_eq!(got, vec![("b", "2"), ("a", "3")]);
    }

    #[tokio::test]
    async fn empty_payload_still_records_marker() {
        let store = Arc::new(MemoryStore::new());
        let gw = gateway(store.clone());
        let out = gw.ingest(payload("twitter/empty.json", "[]"), Utc::now()).await;
        assert!(matches!(out, IngestOutcome::Inserted { signals: 0 }));
        assert_eq!(store.marker_count().await, 1);
        let again = gw.ingest(payload("twitter/empty.json", "[]"), Utc::now()).await;
        assert!(matches!(again, IngestOutcome::Skipped(SkipReason::Duplicate)));
    }
}
