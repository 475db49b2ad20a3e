// src/ingest/history.rs
//! Commit history of the collector archive, read through the GitHub REST API.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::time::Duration;

use super::scan::ChangeLog;
use crate::error::RefineryError;

const PER_PAGE: usize = 100;
const MAX_PAGES: usize = 10;

#[derive(Debug, Deserialize)]
struct CommitRef {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct CommitDetail {
    #[serde(default)]
    files: Vec<CommitFile>,
}

#[derive(Debug, Deserialize)]
struct CommitFile {
    filename: String,
    #[serde(default)]
    status: String,
}

pub struct GithubChangeLog {
    repo: String,
    token: Option<String>,
    api_base: String,
    client: Client,
}

impl GithubChangeLog {
    pub fn new(repo: &str, token: Option<&str>, timeout: Duration) -> Result<Self, RefineryError> {
        let client = Client::builder()
            .user_agent(concat!("signal-refinery/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| RefineryError::Configuration(format!("http client: {e}")))?;
        Ok(Self {
            repo: repo.to_string(),
            token: token.map(str::to_string),
            api_base: "https://api.github.com".to_string(),
            client,
        })
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn commits_url(&self) -> String {
        format!("{}/repos/{}/commits", self.api_base, self.repo)
    }

    fn get(&self, url: &str) -> RequestBuilder {
        let req = self
            .client
            .get(url)
            .header("Accept", "application/vnd.github+json");
        match &self.token {
            Some(t) => req.bearer_auth(t),
            None => req,
        }
    }

    async fn commits_since(&self, since: DateTime<Utc>) -> Result<Vec<String>, RefineryError> {
        let since = since.to_rfc3339_opts(SecondsFormat::Secs, true);
        let mut shas = Vec::new();
        for page in 1..=MAX_PAGES {
            let refs: Vec<CommitRef> = self
                .get(&self.commits_url())
                .query(&[
                    ("since", since.clone()),
                    ("per_page", PER_PAGE.to_string()),
                    ("page", page.to_string()),
                ])
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;
            let last_page = refs.len() < PER_PAGE;
            shas.extend(refs.into_iter().map(|c| c.sha));
            if last_page {
                return Ok(shas);
            }
        }
        tracing::warn!(repo = %self.repo, commits = shas.len(), "commit listing truncated");
        Ok(shas)
    }

    async fn files_of(&self, sha: &str) -> Result<Vec<CommitFile>, RefineryError> {
        let detail: CommitDetail = self
            .get(&format!("{}/{sha}", self.commits_url()))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(detail.files)
    }
}

/// JSON payload paths a set of commit file lists still holds.
fn touched_payloads<I>(files: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = CommitFile>,
{
    files
        .into_iter()
        .filter(|f| f.status != "removed" && f.filename.ends_with(".json"))
        .map(|f| f.filename)
        .collect()
}

#[async_trait]
impl ChangeLog for GithubChangeLog {
    async fn touched_since(&self, since: DateTime<Utc>) -> Result<BTreeSet<String>, RefineryError> {
        let shas = self.commits_since(since).await?;
        let mut files = Vec::new();
        for sha in &shas {
            files.extend(self.files_of(sha).await?);
        }
        let touched = touched_payloads(files);
        tracing::debug!(repo = %self.repo, commits = shas.len(), paths = touched.len(), "history read");
        Ok(touched)
    }
}
