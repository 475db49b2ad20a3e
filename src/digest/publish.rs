// src/digest/publish.rs
use base64::Engine;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use super::assemble::Digest;
use super::render::{render_json, render_markdown, time_tags};
use crate::config::{AppEnv, ArtifactTarget};
use crate::error::RefineryError;

pub const LATEST_PATH: &str = "reports/latest_brief.md";

#[async_trait::async_trait]
pub trait DigestSink: Send + Sync {
    /// Store (path, content) pairs, best-effort per file. Fails if any file failed.
    async fn store(&self, items: Vec<(String, String)>) -> Result<(), RefineryError>;
}

/// The files one digest produces: the rolling latest brief plus the hourly
/// archive in Markdown and JSON.
pub fn digest_files(digest: &Digest) -> Result<Vec<(String, String)>, RefineryError> {
    let (date_tag, hour_tag) = time_tags(digest);
    let md = render_markdown(digest);
    let json = render_json(digest)?;
    Ok(vec![
        (LATEST_PATH.to_string(), md.clone()),
        (format!("reports/hourly/{date_tag}_{hour_tag}.md"), md),
        (format!("reports/hourly/{date_tag}_{hour_tag}.json"), json),
    ])
}

pub async fn publish_digest(sink: &dyn DigestSink, digest: &Digest) -> Result<(), RefineryError> {
    let files = digest_files(digest)?;
    let paths: Vec<String> = files.iter().map(|(p, _)| p.clone()).collect();
    sink.store(files).await?;
    tracing::info!(?paths, rows = digest.row_count(), "digest published");
    Ok(())
}

/// Build the sink the environment asks for.
pub fn sink_from_env(env: &AppEnv) -> Result<Box<dyn DigestSink>, RefineryError> {
    let sink: Box<dyn DigestSink> = match &env.artifacts {
        ArtifactTarget::Directory(root) => Box::new(FsDigestSink::new(root.clone())),
        ArtifactTarget::Github { repo, token } => {
            Box::new(GithubDigestSink::new(repo, token, env.http_timeout)?)
        }
    };
    Ok(sink)
}

/// Writes under a local directory (archive checkout or scratch dir).
pub struct FsDigestSink {
    root: PathBuf,
}

impl FsDigestSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait::async_trait]
impl DigestSink for FsDigestSink {
    async fn store(&self, items: Vec<(String, String)>) -> Result<(), RefineryError> {
        for (path, content) in items {
            let full = self.root.join(&path);
            if let Some(parent) = full.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&full, content).await?;
        }
        Ok(())
    }
}

/// Commits each file through the GitHub contents API (create or update).
pub struct GithubDigestSink {
    repo: String,
    token: String,
    api_base: String,
    client: Client,
}

#[derive(Deserialize)]
struct ContentMeta {
    sha: String,
}

impl GithubDigestSink {
    pub fn new(repo: &str, token: &str, timeout: Duration) -> Result<Self, RefineryError> {
        let client = Client::builder()
            .user_agent(concat!("signal-refinery/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| RefineryError::Configuration(format!("http client: {e}")))?;
        Ok(Self {
            repo: repo.to_string(),
            token: token.to_string(),
            api_base: "https://api.github.com".to_string(),
            client,
        })
    }

    /// Point at another API host (GitHub Enterprise, tests).
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn contents_url(&self, path: &str) -> String {
        format!("{}/repos/{}/contents/{}", self.api_base, self.repo, path)
    }

    async fn existing_sha(&self, url: &str) -> Result<Option<String>, RefineryError> {
        let resp = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .send()
            .await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let meta: ContentMeta = resp.error_for_status()?.json().await?;
        Ok(Some(meta.sha))
    }

    async fn put(&self, path: &str, content: &str) -> Result<(), RefineryError> {
        let url = self.contents_url(path);
        let sha = self.existing_sha(&url).await?;
        let verb = if sha.is_some() { "Update" } else { "Create" };
        let mut body = serde_json::json!({
            "message": format!("{verb} {path}"),
            "content": base64::engine::general_purpose::STANDARD.encode(content),
        });
        if let Some(sha) = sha {
            body["sha"] = serde_json::Value::String(sha);
        }
        self.client
            .put(&url)
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl DigestSink for GithubDigestSink {
    async fn store(&self, items: Vec<(String, String)>) -> Result<(), RefineryError> {
        let mut failed = Vec::new();
        for (path, content) in items {
            if let Err(e) = self.put(&path, &content).await {
                tracing::warn!(%path, error = %e, "artifact write failed");
                failed.push(path);
            }
        }
        if failed.is_empty() {
            Ok(())
        } else {
            Err(RefineryError::TransientExternal(format!(
                "artifact writes failed: {}",
                failed.join(", ")
            )))
        }
    }
}

// --- Test helper ---
#[derive(Default)]
pub struct MockSink {
    pub calls: std::sync::Mutex<Vec<Vec<(String, String)>>>,
}

impl MockSink {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl DigestSink for MockSink {
    async fn store(&self, items: Vec<(String, String)>) -> Result<(), RefineryError> {
        self.calls
            .lock()
            .map_err(|_| RefineryError::TransientExternal("mock sink poisoned".into()))?
            .push(items);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digest::assemble::SourceSection;
    use chrono::{FixedOffset, TimeZone};

    fn digest() -> Digest {
        Digest {
            generated_at: FixedOffset::east_opt(8 * 3600)
                .unwrap()
                .with_ymd_and_hms(2026, 2, 5, 14, 2, 0)
                .unwrap(),
            sections: vec![SourceSection::Stale {
                source: "reddit".into(),
                last_seen_at: None,
                minutes_stale: None,
            }],
        }
    }

    #[test]
    fn file_layout() {
        let files = digest_files(&digest()).unwrap();
        let paths: Vec<&str> = files.iter().map(|(p, _)| p.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "reports/latest_brief.md",
                "reports/hourly/20260205_14.md",
                "reports/hourly/20260205_14.json",
            ]
        );
        assert_eq!(files[0].1, files[1].1);
    }

    #[tokio::test]
    async fn fs_sink_writes_tree() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FsDigestSink::new(dir.path());
        publish_digest(&sink, &digest()).await.unwrap();
        let latest = std::fs::read_to_string(dir.path().join(LATEST_PATH)).unwrap();
        assert!(latest.contains("REDDIT"));
        assert!(dir.path().join("reports/hourly/20260205_14.json").exists());
    }

    #[tokio::test]
    async fn mock_sink_records_call() {
        let sink = MockSink::new();
        publish_digest(&sink, &digest()).await.unwrap();
        assert_eq!(sink.calls.lock().unwrap()[0].len(), 3);
    }

    #[test]
    fn github_contents_url() {
        let s = GithubDigestSink::new("me/vault", "t", Duration::from_secs(5))
            .unwrap()
            .with_api_base("http://localhost:1/");
        assert_eq!(
            s.contents_url(LATEST_PATH),
            "http://localhost:1/repos/me/vault/contents/reports/latest_brief.md"
        );
    }
}
