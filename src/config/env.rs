// src/config/env.rs
//! Credentials and invocation flags read from the environment (`.env` honoured).
//! A missing required credential is a `ConfigurationFailure`: nothing runs.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::RefineryError;
use crate::ingest::scan::ScanMode;

pub const ENV_STORE_URL: &str = "REFINERY_STORE_URL";
pub const ENV_STORE_KEY: &str = "REFINERY_STORE_KEY";
pub const ENV_INGEST_MODE: &str = "REFINERY_INGEST_MODE";
pub const ENV_VAULT_DIR: &str = "REFINERY_VAULT_DIR";
pub const ENV_ARCHIVE_DIR: &str = "REFINERY_ARCHIVE_DIR";
pub const ENV_VAULT_REPO: &str = "REFINERY_VAULT_REPO";
pub const ENV_VAULT_TOKEN: &str = "REFINERY_VAULT_TOKEN";
pub const ENV_ARTIFACT_REPO: &str = "REFINERY_ARTIFACT_REPO";
pub const ENV_ARTIFACT_TOKEN: &str = "REFINERY_ARTIFACT_TOKEN";
pub const ENV_HTTP_TIMEOUT_SECS: &str = "REFINERY_HTTP_TIMEOUT_SECS";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestMode {
    Incremental,
    Full,
}

impl IngestMode {
    pub fn parse(raw: &str) -> Result<Self, RefineryError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "incremental" => Ok(IngestMode::Incremental),
            "full" => Ok(IngestMode::Full),
            other => Err(RefineryError::Configuration(format!(
                "{ENV_INGEST_MODE} must be `incremental` or `full`, got `{other}`"
            ))),
        }
    }

    pub fn scan_mode(self, incremental_window_hours: i64) -> ScanMode {
        match self {
            IngestMode::Incremental => ScanMode::Incremental {
                window: chrono::Duration::hours(incremental_window_hours),
            },
            IngestMode::Full => ScanMode::Full,
        }
    }
}

/// Where rendered digests go.
#[derive(Debug, Clone)]
pub enum ArtifactTarget {
    Directory(PathBuf),
    Github { repo: String, token: String },
}

/// Hosted repository whose commit history drives incremental scans.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultHistory {
    pub repo: String,
    pub token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppEnv {
    pub store_url: String,
    pub store_key: String,
    pub mode: IngestMode,
    pub vault_dir: PathBuf,
    pub vault_history: Option<VaultHistory>,
    pub artifacts: ArtifactTarget,
    pub http_timeout: Duration,
}

impl AppEnv {
    pub fn from_env() -> Result<Self, RefineryError> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Same rules as `from_env`, over any key lookup (tests pass a map).
    pub fn from_lookup<F>(get: F) -> Result<Self, RefineryError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> Result<String, RefineryError> {
            get(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| RefineryError::Configuration(format!("missing {key}")))
        };
        let optional = |key: &str| get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let store_url = required(ENV_STORE_URL)?;
        let store_key = required(ENV_STORE_KEY)?;
        let mode = IngestMode::parse(&optional(ENV_INGEST_MODE).unwrap_or_default())?;

        let artifacts = match optional(ENV_ARTIFACT_REPO) {
            Some(repo) => ArtifactTarget::Github {
                repo,
                token: required(ENV_ARTIFACT_TOKEN)?,
            },
            None => ArtifactTarget::Directory(PathBuf::from(
                optional(ENV_ARCHIVE_DIR).unwrap_or_else(|| ".".to_string()),
            )),
        };

        let vault_history = optional(ENV_VAULT_REPO).map(|repo| VaultHistory {
            repo,
            token: optional(ENV_VAULT_TOKEN).or_else(|| match &artifacts {
                ArtifactTarget::Github { token, .. } => Some(token.clone()),
                ArtifactTarget::Directory(_) => None,
            }),
        });

        let http_timeout = match optional(ENV_HTTP_TIMEOUT_SECS) {
            Some(raw) => raw.parse::<u64>().map(Duration::from_secs).map_err(|_| {
                RefineryError::Configuration(format!("{ENV_HTTP_TIMEOUT_SECS} is not a number"))
            })?,
            None => Duration::from_secs(30),
        };

        Ok(Self {
            store_url: store_url.trim_end_matches('/').to_string(),
            store_key,
            mode,
            vault_dir: PathBuf::from(optional(ENV_VAULT_DIR).unwrap_or_else(|| "vault".into())),
            vault_history,
            artifacts,
            http_timeout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn missing_store_credentials_is_fatal() {
        let err = AppEnv::from_lookup(lookup(&[(ENV_STORE_URL, "http://db")])).unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains(ENV_STORE_KEY));
    }

    #[test]
    fn defaults_apply() {
        let env = AppEnv::from_lookup(lookup(&[
            (ENV_STORE_URL, "http://db/"),
            (ENV_STORE_KEY, "k"),
        ]))
        .unwrap();
        assert_eq!(env.store_url, "http://db");
        assert_eq!(env.mode, IngestMode::Incremental);
        assert_eq!(env.http_timeout, Duration::from_secs(30));
        assert!(matches!(env.artifacts, ArtifactTarget::Directory(_)));
    }

    #[test]
    fn artifact_repo_requires_token() {
        let err = AppEnv::from_lookup(lookup(&[
            (ENV_STORE_URL, "http://db"),
            (ENV_STORE_KEY, "k"),
            (ENV_ARTIFACT_REPO, "acme/bank"),
        ]))
        .unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn vault_history_borrows_artifact_token() {
        let env = AppEnv::from_lookup(lookup(&[
            (ENV_STORE_URL, "http://db"),
            (ENV_STORE_KEY, "k"),
            (ENV_ARTIFACT_REPO, "acme/bank"),
            (ENV_ARTIFACT_TOKEN, "tok"),
            (ENV_VAULT_REPO, "acme/bank"),
        ]))
        .unwrap();
        assert_eq!(
            env.vault_history,
            Some(VaultHistory {
                repo: "acme/bank".into(),
                token: Some("tok".into()),
            })
        );

        let local = AppEnv::from_lookup(lookup(&[(ENV_STORE_URL, "http://db"), (ENV_STORE_KEY, "k")]))
            .unwrap();
        assert!(local.vault_history.is_none());
    }

    #[test]
    fn mode_flag_parses() {
        assert_eq!(IngestMode::parse("FULL").unwrap(), IngestMode::Full);
        assert_eq!(IngestMode::parse("").unwrap(), IngestMode::Incremental);
        assert!(IngestMode::parse("sometimes").is_err());
    }
}
