//! signal-refinery: one batch per invocation.
//! Syncs new collector payloads into the store, builds the digest and
//! publishes it, then exits.

use anyhow::Context;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use signal_refinery::config::{AppEnv, RefineryConfig};
use signal_refinery::pipeline;

const ENV_LOG_JSON: &str = "REFINERY_LOG_JSON";

/// `RUST_LOG` filter (default `signal_refinery=info,warn`); JSON lines when
/// REFINERY_LOG_JSON=1.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("signal_refinery=info,warn"));

    let json = std::env::var(ENV_LOG_JSON).ok().is_some_and(|v| v == "1");
    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let env = AppEnv::from_env().context("reading environment")?;
    let cfg = RefineryConfig::load_default().context("loading tuning config")?;

    match pipeline::run_cycle(&env, &cfg).await {
        Ok(summary) => {
            tracing::info!(
                scanned = summary.ingest.scanned,
                inserted = summary.ingest.inserted,
                duplicates = summary.ingest.duplicates,
                failed = summary.ingest.failed,
                fresh_sources = summary.fresh_sources,
                rows = summary.rows,
                "cycle finished"
            );
            Ok(())
        }
        Err(e) if e.is_fatal() => Err(e).context("configuration"),
        Err(e) => {
            // transient: the next scheduled run picks the work up again
            tracing::error!(error = %e, "cycle incomplete");
            Ok(())
        }
    }
}
