//! PostgREST-style HTTP adapter (`/rest/v1/<table>`).

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use std::time::Duration;

use super::{SignalStore, LEDGER_TABLE};
use crate::config::AppEnv;
use crate::error::RefineryError;
use crate::ingest::types::IngestionMarker;
use crate::model::CanonicalSignal;

pub struct RestStore {
    base_url: String,
    key: String,
    client: Client,
}

#[derive(Deserialize)]
struct TimestampRow {
    timestamp: DateTime<FixedOffset>,
}

impl RestStore {
    pub fn new(
        base_url: impl Into<String>,
        key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, RefineryError> {
        let client = Client::builder()
            .user_agent(concat!("signal-refinery/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(5).min(timeout))
            .timeout(timeout)
            .build()
            .map_err(|e| RefineryError::Configuration(format!("http client: {e}")))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            key: key.into(),
            client,
        })
    }

    pub fn from_env(env: &AppEnv) -> Result<Self, RefineryError> {
        Self::new(&env.store_url, &env.store_key, env.http_timeout)
    }

    pub fn endpoint(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn authed(&self, req: RequestBuilder) -> RequestBuilder {
        req.header("apikey", &self.key).bearer_auth(&self.key)
    }

    async fn checked(resp: Response, what: &str) -> Result<Response, RefineryError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        let detail = format!("{what}: HTTP {status}: {}", body.chars().take(200).collect::<String>());
        if status.is_client_error() {
            // 4xx means our row or query was rejected, not that the store is down
            Err(RefineryError::MalformedInput(detail))
        } else {
            Err(RefineryError::TransientExternal(detail))
        }
    }
}

#[async_trait]
impl SignalStore for RestStore {
    async fn has_marker(&self, content_hash: &str) -> Result<bool, RefineryError> {
        let req = self
            .client
            .get(self.endpoint(LEDGER_TABLE))
            .query(&[
                ("select", "content_hash".to_string()),
                ("content_hash", format!("eq.{content_hash}")),
                ("limit", "1".to_string()),
            ]);
        let resp = Self::checked(self.authed(req).send().await?, "ledger lookup").await?;
        let rows: Vec<serde_json::Value> = resp.json().await?;
        Ok(!rows.is_empty())
    }

    async fn insert_marker(&self, marker: &IngestionMarker) -> Result<bool, RefineryError> {
        let req = self
            .client
            .post(self.endpoint(LEDGER_TABLE))
            .query(&[("on_conflict", "content_hash")])
            .header("Prefer", "resolution=ignore-duplicates,return=representation")
            .json(&[marker]);
        let resp = Self::checked(self.authed(req).send().await?, "ledger insert").await?;
        // ignored duplicates come back as an empty representation
        let rows: Vec<serde_json::Value> = resp.json().await?;
        Ok(!rows.is_empty())
    }

    async fn upsert_signals(
        &self,
        table: &str,
        signals: &[CanonicalSignal],
    ) -> Result<(), RefineryError> {
        if signals.is_empty() {
            return Ok(());
        }
        let req = self
            .client
            .post(self.endpoint(table))
            .query(&[("on_conflict", "id")])
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(signals);
        Self::checked(self.authed(req).send().await?, "signal upsert").await?;
        Ok(())
    }

    async fn latest_timestamp(
        &self,
        table: &str,
    ) -> Result<Option<DateTime<FixedOffset>>, RefineryError> {
        let req = self.client.get(self.endpoint(table)).query(&[
            ("select", "timestamp"),
            ("order", "timestamp.desc"),
            ("limit", "1"),
        ]);
        let resp = Self::checked(self.authed(req).send().await?, "freshness query").await?;
        let rows: Vec<TimestampRow> = resp.json().await?;
        Ok(rows.into_iter().next().map(|r| r.timestamp))
    }

    async fn signals_since(
        &self,
        table: &str,
        since: DateTime<FixedOffset>,
        limit: usize,
    ) -> Result<Vec<CanonicalSignal>, RefineryError> {
        let req = self.client.get(self.endpoint(table)).query(&[
            ("select", "*".to_string()),
            ("timestamp", format!("gte.{}", since.to_rfc3339())),
            ("order", "timestamp.desc".to_string()),
            ("limit", limit.to_string()),
        ]);
        let resp = Self::checked(self.authed(req).send().await?, "signal query").await?;
        Ok(resp.json().await?)
    }
}
