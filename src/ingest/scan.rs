// src/ingest/scan.rs
//! Candidate payload discovery.
//!
//! Full and incremental scans yield the same `PayloadLocation`s and feed the
//! same per-payload gateway; they differ only in which locations pass the
//! recency filter. Incremental recency comes from version-control history
//! when a `ChangeLog` is attached, from file modification times otherwise.
//! Every call to `locations()` starts a new walk, so a scan can be restarted
//! at any point.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeSet, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::RefineryError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// Only payloads touched within `window` of now.
    Incremental { window: Duration },
    /// Everything, recursively. Recovers from missed incremental windows.
    Full,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadLocation {
    pub source_key: String,
    pub path: String,
    pub modified: Option<DateTime<Utc>>,
}

pub type LocationIter = Box<dyn Iterator<Item = PayloadLocation> + Send>;

#[async_trait]
pub trait PayloadSource: Send + Sync {
    async fn locations(&self, mode: ScanMode, now: DateTime<Utc>)
        -> Result<LocationIter, RefineryError>;

    async fn fetch(&self, location: &PayloadLocation) -> Result<Vec<u8>, RefineryError>;
}

/// Archive-relative paths touched by commits since a point in time.
#[async_trait]
pub trait ChangeLog: Send + Sync {
    async fn touched_since(&self, since: DateTime<Utc>) -> Result<BTreeSet<String>, RefineryError>;
}

enum Recency {
    Any,
    Touched(BTreeSet<String>),
    ModifiedSince(DateTime<Utc>),
}

impl Recency {
    fn admits(&self, loc: &PayloadLocation) -> bool {
        match self {
            Recency::Any => true,
            Recency::Touched(paths) => paths.contains(&loc.path),
            Recency::ModifiedSince(cutoff) => match loc.modified {
                Some(m) => m >= *cutoff,
                // unknown mtime: let the ledger decide
                None => true,
            },
        }
    }
}

/// Local checkout of the collector archive: `<root>/<source_key>/.../*.json`.
pub struct FsPayloadSource {
    root: PathBuf,
    known_keys: Arc<BTreeSet<String>>,
    change_log: Option<Arc<dyn ChangeLog>>,
}

impl FsPayloadSource {
    pub fn new<I, S>(root: impl Into<PathBuf>, known_keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            root: root.into(),
            known_keys: Arc::new(known_keys.into_iter().map(Into::into).collect()),
            change_log: None,
        }
    }

    /// Decide incremental recency from commit history instead of mtimes.
    /// A fresh checkout stamps every file with the clone time.
    pub fn with_change_log(mut self, log: Arc<dyn ChangeLog>) -> Self {
        self.change_log = Some(log);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl PayloadSource for FsPayloadSource {
    async fn locations(
        &self,
        mode: ScanMode,
        now: DateTime<Utc>,
    ) -> Result<LocationIter, RefineryError> {
        let recency = match (mode, &self.change_log) {
            (ScanMode::Full, _) => Recency::Any,
            (ScanMode::Incremental { window }, Some(log)) => {
                let touched = log.touched_since(now - window).await?;
                tracing::debug!(paths = touched.len(), "change log consulted");
                Recency::Touched(touched)
            }
            (ScanMode::Incremental { window }, None) => Recency::ModifiedSince(now - window),
        };
        let known = self.known_keys.clone();
        let walk = PayloadWalk::new(&self.root).filter(move |loc| {
            if !known.contains(&loc.source_key) {
                tracing::debug!(path = %loc.path, "no normalizer for source key; skipping");
                return false;
            }
            recency.admits(loc)
        });
        Ok(Box::new(walk))
    }

    async fn fetch(&self, location: &PayloadLocation) -> Result<Vec<u8>, RefineryError> {
        let full = self.root.join(&location.path);
        Ok(tokio::fs::read(&full).await?)
    }
}

/// Lazy depth-first walk; directories are read only when reached.
pub struct PayloadWalk {
    root: PathBuf,
    dirs: Vec<PathBuf>,
    files: VecDeque<PayloadLocation>,
}

impl PayloadWalk {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            dirs: vec![root.to_path_buf()],
            files: VecDeque::new(),
        }
    }

    fn expand(&mut self, dir: &Path) {
        let entries = match fs::read_dir(dir) {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!(error = %e, dir = %dir.display(), "payload dir unreadable");
                return;
            }
        };
        let mut paths: Vec<PathBuf> = entries.flatten().map(|e| e.path()).collect();
        paths.sort();

        let mut subdirs = Vec::new();
        for path in paths {
            let hidden = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with('.'));
            if hidden {
                continue;
            }
            if path.is_dir() {
                subdirs.push(path);
            } else if path.extension().and_then(|s| s.to_str()) == Some("json") {
                if let Some(loc) = self.location_for(&path) {
                    self.files.push_back(loc);
                }
            }
        }
        // reversed so the stack pops them in sorted order
        self.dirs.extend(subdirs.into_iter().rev());
    }

    fn location_for(&self, path: &Path) -> Option<PayloadLocation> {
        let rel = path.strip_prefix(&self.root).ok()?;
        let parts: Vec<String> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().to_string())
            .collect();
        // files directly under the root have no source key
        if parts.len() < 2 {
            return None;
        }
        let modified = fs::metadata(path)
            .and_then(|m| m.modified())
            .ok()
            .map(DateTime::<Utc>::from);
        Some(PayloadLocation {
            source_key: parts[0].clone(),
            path: parts.join("/"),
            modified,
        })
    }
}

impl Iterator for PayloadWalk {
    type Item = PayloadLocation;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(f) = self.files.pop_front() {
                return Some(f);
            }
            let dir = self.dirs.pop()?;
            self.expand(&dir);
        }
    }
}
