// src/ingest/providers/mod.rs
//! Per-source raw → canonical mapping, plus the cleanup helpers they share.

pub mod github;
pub mod papers;
pub mod polymarket;
pub mod reddit;
pub mod registry;
pub mod twitter;

pub use registry::{SourceEntry, SourceRegistry};

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone};
use serde_json::Value;
use std::collections::BTreeSet;

use crate::error::RefineryError;
use crate::model::CanonicalSignal;

/// Per-payload context handed to every normalizer.
#[derive(Debug, Clone)]
pub struct NormalizeCtx {
    pub path: String,
    /// One timestamp for the whole payload; used when an item has none.
    pub batch_time: DateTime<FixedOffset>,
    pub offset: FixedOffset,
    pub max_text_chars: usize,
}

impl NormalizeCtx {
    pub fn timestamp_or_batch(&self, raw: Option<&Value>) -> DateTime<FixedOffset> {
        raw.and_then(|v| parse_timestamp_value(v, self.offset))
            .unwrap_or(self.batch_time)
    }

    pub fn clean_text(&self, raw: &str) -> String {
        crate::ingest::normalize_text(raw, self.max_text_chars)
    }
}

pub trait SourceNormalizer: Send + Sync {
    fn key(&self) -> &'static str;

    /// Map one parsed payload to canonical signals. Item-level problems drop
    /// the item; a payload of the wrong overall shape is `MalformedInput`.
    fn process(&self, raw: &Value, ctx: &NormalizeCtx) -> Result<Vec<CanonicalSignal>, RefineryError>;
}

/// Built-in normalizer for a source key, if one exists.
pub fn builtin(key: &str) -> Option<Box<dyn SourceNormalizer>> {
    match key {
        "polymarket" => Some(Box::new(polymarket::PolymarketNormalizer)),
        "twitter" => Some(Box::new(twitter::TwitterNormalizer)),
        "reddit" => Some(Box::new(reddit::RedditNormalizer)),
        "github" => Some(Box::new(github::GithubNormalizer)),
        "papers" => Some(Box::new(papers::PapersNormalizer)),
        _ => None,
    }
}

/// Strip thousands separators, currency and percent signs. Anything that is
/// still not a number reads as 0.
pub fn parse_num(v: Option<&Value>) -> f64 {
    let n = match v {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => {
            let cleaned: String = s
                .chars()
                .filter(|c| !matches!(c, ',' | '$' | '%') && !c.is_whitespace())
                .collect();
            cleaned.parse::<f64>().unwrap_or(0.0)
        }
        _ => 0.0,
    };
    if n.is_finite() {
        n
    } else {
        0.0
    }
}

/// Parse the timestamp formats collectors emit and shift into `offset`.
/// Naive timestamps are taken to already be in `offset`.
pub fn parse_timestamp(raw: &str, offset: FixedOffset) -> Option<DateTime<FixedOffset>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&offset));
    }
    // Twitter: "Wed Feb 04 17:23:38 +0000 2026"
    if let Ok(dt) = DateTime::parse_from_str(s, "%a %b %d %H:%M:%S %z %Y") {
        return Some(dt.with_timezone(&offset));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&offset));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return offset.from_local_datetime(&naive).single();
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        let naive = date.and_hms_opt(0, 0, 0)?;
        return offset.from_local_datetime(&naive).single();
    }
    None
}

/// Strings go through `parse_timestamp`; numbers are unix seconds
/// (milliseconds when implausibly large).
pub fn parse_timestamp_value(v: &Value, offset: FixedOffset) -> Option<DateTime<FixedOffset>> {
    match v {
        Value::String(s) => parse_timestamp(s, offset),
        Value::Number(n) => {
            let raw = n.as_i64()?;
            let secs = if raw > 100_000_000_000 { raw / 1000 } else { raw };
            DateTime::<chrono::Utc>::from_timestamp(secs, 0).map(|dt| dt.with_timezone(&offset))
        }
        _ => None,
    }
}

/// Non-empty trimmed string field.
pub fn str_field<'a>(item: &'a Value, key: &str) -> Option<&'a str> {
    item.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Tags may arrive as an array or as a JSON-encoded string of an array.
pub fn tag_set(v: Option<&Value>) -> BTreeSet<String> {
    let arr = match v {
        Some(Value::Array(a)) => a.clone(),
        Some(Value::String(s)) => match serde_json::from_str::<Value>(s) {
            Ok(Value::Array(a)) => a,
            _ => vec![Value::String(s.clone())],
        },
        _ => Vec::new(),
    };
    arr.iter()
        .filter_map(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Unwrap the common envelopes: `{items, meta}`, a bare list, or one object.
/// Returns the items and the envelope's scan time, if any.
pub fn items_with_meta<'a>(
    raw: &'a Value,
    meta_time_key: &str,
) -> Result<(Vec<&'a Value>, Option<&'a Value>), RefineryError> {
    match raw {
        Value::Object(map) if map.contains_key("items") => {
            let items = map
                .get("items")
                .and_then(Value::as_array)
                .ok_or_else(|| RefineryError::MalformedInput("`items` is not a list".into()))?;
            let meta_time = map.get("meta").and_then(|m| m.get(meta_time_key));
            Ok((items.iter().collect(), meta_time))
        }
        Value::Array(items) => Ok((items.iter().collect(), None)),
        Value::Object(_) => Ok((vec![raw], None)),
        other => Err(RefineryError::MalformedInput(format!(
            "expected object or list, got {}",
            json_kind(other)
        ))),
    }
}

pub(crate) fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

/// Items that are not objects are skipped with a warning, never fatal.
pub(crate) fn objects<'a>(items: Vec<&'a Value>, source: &str, path: &str) -> Vec<&'a Value> {
    items
        .into_iter()
        .filter(|it| {
            let ok = it.is_object();
            if !ok {
                tracing::warn!(source, path, kind = json_kind(it), "skipping non-object item");
            }
            ok
        })
        .collect()
}
