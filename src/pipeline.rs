//! One invocation: ingestion sync, digest generation, publish.

use chrono::{DateTime, Duration, FixedOffset, Utc};
use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use std::collections::HashSet;
use std::sync::Arc;

use crate::config::{AppEnv, IngestMode, RefineryConfig};
use crate::digest::{
    publish_digest, sink_from_env, Digest, DigestAssembler, DigestSink, SourceSection,
};
use crate::error::RefineryError;
use crate::freshness::FreshnessMonitor;
use crate::ingest::providers::{SourceEntry, SourceRegistry};
use crate::ingest::history::GithubChangeLog;
use crate::ingest::scan::{FsPayloadSource, PayloadSource};
use crate::ingest::types::IngestReport;
use crate::ingest::Gateway;
use crate::model::{CanonicalSignal, ScoredSignal};
use crate::select::{
    build_pools, select_top_n, split_featured, GroupSelector, PoolShares, QuotaAllocator,
};
use crate::store::{RestStore, SignalStore};

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "digest_stale_sources_total",
            "Sources collapsed to a placeholder because their data was stale."
        );
        describe_counter!("digest_rows_total", "Rows rendered into digests.");
    });
}

/// Score, anti-flood, featured pools, quota and diversity for one fresh
/// source's signals. Returns (table name, score-ordered rows): featured pools
/// first in configuration order, then categories alphabetically.
pub fn select_for_source(
    entry: &SourceEntry,
    cfg: &RefineryConfig,
    signals: Vec<CanonicalSignal>,
) -> Vec<(String, Vec<ScoredSignal>)> {
    let scored: Vec<ScoredSignal> = signals
        .into_iter()
        .map(|s| entry.engine.score_signal(s))
        .collect();

    let grouped = GroupSelector::new(cfg.selection).select_all(scored.clone());
    let split = split_featured(grouped, &entry.profile.featured);

    let names: Vec<&str> = entry
        .engine
        .profile()
        .categories
        .iter()
        .map(|c| c.name.as_str())
        .collect();
    let multi_tag = entry.profile.multi_tag;

    // quota shares come from the category pools as fetched, before anti-flood
    let unthinned: Vec<ScoredSignal> = scored.into_iter().filter(|s| !split.excludes(s)).collect();
    let shares = PoolShares::of(&build_pools(&unthinned, multi_tag, names.iter().copied()));

    let pools = build_pools(&split.rest, multi_tag, names.iter().copied());
    let allocation = QuotaAllocator::new(cfg.selection.floor_quota).allocate_with(
        pools,
        &shares,
        entry.profile.target_quota,
    );

    let mut tables: Vec<(String, Vec<ScoredSignal>)> = split.featured;
    tables.extend(allocation);

    // diversity runs once over the distinct signals of every table
    let mut seen = HashSet::new();
    let distinct: Vec<ScoredSignal> = tables
        .iter()
        .flat_map(|(_, list)| list)
        .filter(|s| seen.insert(s.id().to_string()))
        .cloned()
        .collect();
    let survivors: HashSet<String> = select_top_n(
        distinct,
        entry.profile.max_items,
        entry.profile.per_author_cap,
    )
    .into_iter()
    .map(|s| s.signal.id)
    .collect();

    for (_, list) in tables.iter_mut() {
        list.retain(|s| survivors.contains(s.id()));
    }
    tables.retain(|(_, list)| !list.is_empty());
    tables
}

/// Build the digest for every registered source, in registry order.
pub async fn run_digest(
    store: &dyn SignalStore,
    registry: &SourceRegistry,
    cfg: &RefineryConfig,
    now: DateTime<Utc>,
) -> Result<Digest, RefineryError> {
    ensure_metrics_described();
    let offset: FixedOffset = cfg.ingest.fixed_offset()?;
    let local_now = now.with_timezone(&offset);
    let monitor = FreshnessMonitor::new(cfg.freshness.threshold_minutes);
    let assembler = DigestAssembler::new(cfg.digest.excerpt_chars);

    let mut sections = Vec::new();
    for (key, entry) in registry.iter() {
        let last_seen = match store.latest_timestamp(&entry.table).await {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(source = key, error = %e, "freshness check failed; skipping source");
                sections.push(assembler.unavailable(key, format!("freshness check failed: {e}")));
                continue;
            }
        };

        let status = monitor.evaluate(key, last_seen, local_now);
        if !status.is_fresh {
            tracing::info!(source = key, last_seen = ?status.last_seen_at, "source stale; collapsed");
            counter!("digest_stale_sources_total").increment(1);
            sections.push(assembler.stale(&status, local_now));
            continue;
        }

        let since = local_now - Duration::hours(cfg.digest.lookback_hours);
        let signals = match store
            .signals_since(&entry.table, since, cfg.digest.fetch_limit)
            .await
        {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(source = key, error = %e, "signal query failed; skipping source");
                sections.push(assembler.unavailable(key, format!("signal query failed: {e}")));
                continue;
            }
        };

        let fetched = signals.len();
        let allocation = select_for_source(entry, cfg, signals);
        let section = assembler.fresh(key, allocation);
        tracing::info!(source = key, fetched, rows = section.row_count(), "source selected");
        counter!("digest_rows_total").increment(section.row_count() as u64);
        sections.push(section);
    }

    Ok(Digest {
        generated_at: local_now,
        sections,
    })
}

#[derive(Debug)]
pub struct CycleSummary {
    pub ingest: IngestReport,
    pub fresh_sources: usize,
    pub rows: usize,
}

/// Ingestion sync, digest and publish against an already-built store and sink.
pub async fn run_cycle_with(
    store: Arc<dyn SignalStore>,
    source: Arc<dyn PayloadSource>,
    sink: &dyn DigestSink,
    cfg: &RefineryConfig,
    env_mode: IngestMode,
    now: DateTime<Utc>,
) -> Result<CycleSummary, RefineryError> {
    let registry = Arc::new(SourceRegistry::from_config(cfg)?);
    let gateway = Gateway::new(store.clone(), registry.clone(), cfg.ingest.clone())?;

    let mode = env_mode.scan_mode(cfg.ingest.incremental_window_hours);
    let report = gateway.sync(source, mode, now).await;

    let digest = run_digest(store.as_ref(), &registry, cfg, now).await?;
    let fresh_sources = digest
        .sections
        .iter()
        .filter(|s| matches!(s, SourceSection::Fresh { .. }))
        .count();
    publish_digest(sink, &digest).await?;

    Ok(CycleSummary {
        ingest: report,
        fresh_sources,
        rows: digest.row_count(),
    })
}

/// Production wiring from the environment.
pub async fn run_cycle(env: &AppEnv, cfg: &RefineryConfig) -> Result<CycleSummary, RefineryError> {
    let store: Arc<dyn SignalStore> = Arc::new(RestStore::from_env(env)?);
    let mut fs_source = FsPayloadSource::new(env.vault_dir.clone(), cfg.sources.keys().cloned());
    if let Some(history) = &env.vault_history {
        let log = GithubChangeLog::new(&history.repo, history.token.as_deref(), env.http_timeout)?;
        fs_source = fs_source.with_change_log(Arc::new(log));
    }
    let source: Arc<dyn PayloadSource> = Arc::new(fs_source);
    let sink = sink_from_env(env)?;
    tracing::info!(mode = ?env.mode, vault = %env.vault_dir.display(), "cycle starting");
    run_cycle_with(store, source, sink.as_ref(), cfg, env.mode, Utc::now()).await
}
