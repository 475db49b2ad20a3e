// src/ingest/providers/papers.rs
use serde_json::Value;
use std::collections::BTreeMap;

use super::{
    items_with_meta, objects, parse_num, parse_timestamp_value, str_field, tag_set, NormalizeCtx,
    SourceNormalizer,
};
use crate::error::RefineryError;
use crate::model::{signal_id, CanonicalSignal};

/// Citation radar. `signal_type` flags breakout papers (NUCLEAR) and early
/// risers (EARLY); both become 0/1 metrics so scoring weights can lift them.
///
/// Signals are stamped with the scan time, not the publication date: a
/// paper found this hour is fresh news even if it was published months ago.
/// The publication date stays in the raw payload and as `published_days_ago`.
pub struct PapersNormalizer;

fn first_author(item: &Value) -> Option<String> {
    let name = match item.get("authors") {
        Some(Value::Array(a)) => a.iter().find_map(Value::as_str).map(|s| s.trim().to_string()),
        Some(Value::String(s)) => s.split(',').next().map(|s| s.trim().to_string()),
        _ => None,
    };
    name.filter(|s| !s.is_empty())
}

impl SourceNormalizer for PapersNormalizer {
    fn key(&self) -> &'static str {
        "papers"
    }

    fn process(&self, raw: &Value, ctx: &NormalizeCtx) -> Result<Vec<CanonicalSignal>, RefineryError> {
        let (items, meta_time) = items_with_meta(raw, "scanned_at_bj")?;
        let scanned = ctx.timestamp_or_batch(meta_time);

        let mut out = Vec::new();
        for item in objects(items, self.key(), &ctx.path) {
            let title = str_field(item, "title").unwrap_or_default();
            let signal_type = str_field(item, "signal_type").unwrap_or_default().to_ascii_uppercase();

            let mut metrics = BTreeMap::new();
            metrics.insert("citations".to_string(), parse_num(item.get("citations")));
            let flag = |hit: bool| if hit { 1.0 } else { 0.0 };
            metrics.insert("nuclear".to_string(), flag(signal_type.contains("NUCLEAR")));
            metrics.insert("early".to_string(), flag(signal_type.contains("EARLY")));

            let mut tags = tag_set(item.get("strategies"));
            if !signal_type.is_empty() {
                tags.insert(signal_type.to_ascii_lowercase());
            }

            if let Some(published) = item
                .get("published")
                .and_then(|v| parse_timestamp_value(v, ctx.offset))
            {
                let age = (scanned - published).num_days().max(0);
                metrics.insert("published_days_ago".to_string(), age as f64);
            }

            out.push(CanonicalSignal {
                id: signal_id(&[title], item),
                source: self.key().to_string(),
                timestamp: scanned,
                author: first_author(item).unwrap_or_else(|| "arXiv".to_string()),
                display_text: ctx.clean_text(title),
                url: str_field(item, "url").map(str::to_string),
                group_key: None,
                subject: None,
                metrics,
                tags,
                raw_payload: item.clone(),
            });
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};
    use serde_json::json;

    #[test]
    fn signal_type_becomes_flags_and_tag() {
        let offset = FixedOffset::east_opt(8 * 3600).unwrap();
        let ctx = NormalizeCtx {
            path: "papers/radar.json".into(),
            batch_time: offset.with_ymd_and_hms(2026, 2, 5, 10, 0, 0).unwrap(),
            offset,
            max_text_chars: 1500,
        };
        let raw = json!([
            {"title": "Scaling laws for protein folding", "citations": "1,204", "signal_type": "NUCLEAR", "authors": ["A. Lee", "B. Kim"], "strategies": ["Bio"]},
            {"title": "Tiny paper", "citations": 3, "signal_type": "early riser", "authors": "C. Diaz, D. Wu"}
        ]);
        let out = PapersNormalizer.process(&raw, &ctx).unwrap();
        assert_eq!(out[0].metric("nuclear"), 1.0);
        assert_eq!(out[0].metric("citations"), 1204.0);
        assert_eq!(out[0].author, "A. Lee");
        assert!(out[0].tags.contains("nuclear") && out[0].tags.contains("Bio"));
        assert_eq!(out[1].metric("early"), 1.0);
        assert_eq!(out[1].author, "C. Diaz");
        assert_eq!(out[1].timestamp, ctx.batch_time);
    }

    #[test]
    fn scan_time_stamps_old_papers() {
        let offset = FixedOffset::east_opt(8 * 3600).unwrap();
        let ctx = NormalizeCtx {
            path: "papers/radar.json".into(),
            batch_time: offset.with_ymd_and_hms(2026, 2, 5, 10, 0, 0).unwrap(),
            offset,
            max_text_chars: 1500,
        };
        let raw = json!({
            "meta": {"scanned_at_bj": "2026-02-05T09:50:00+08:00"},
            "items": [{"title": "Old but rising", "published": "2026-01-20", "citations": 40}]
        });
        let out = PapersNormalizer.process(&raw, &ctx).unwrap();
        let scanned = offset.with_ymd_and_hms(2026, 2, 5, 9, 50, 0).unwrap();
        assert_eq!(out[0].timestamp, scanned);
        assert_eq!(out[0].metric("published_days_ago"), 16.0);
        assert_eq!(out[0].raw_payload["published"], "2026-01-20");
    }
}
