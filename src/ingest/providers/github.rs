// src/ingest/providers/github.rs
use serde_json::Value;
use std::collections::BTreeMap;

use super::{items_with_meta, objects, parse_num, str_field, tag_set, NormalizeCtx, SourceNormalizer};
use crate::error::RefineryError;
use crate::model::{signal_id, CanonicalSignal};

/// Trending-repository snapshots. The repo's full name is the stable id, so
/// later snapshots of the same repo overwrite earlier ones in storage.
pub struct GithubNormalizer;

impl SourceNormalizer for GithubNormalizer {
    fn key(&self) -> &'static str {
        "github"
    }

    fn process(&self, raw: &Value, ctx: &NormalizeCtx) -> Result<Vec<CanonicalSignal>, RefineryError> {
        let (items, meta_time) = items_with_meta(raw, "scanned_at_bj")?;
        let scanned = ctx.timestamp_or_batch(meta_time);

        let mut out = Vec::new();
        for item in objects(items, self.key(), &ctx.path) {
            let name = str_field(item, "name").unwrap_or_default();
            let owner = name.split('/').next().filter(|o| !o.is_empty() && name.contains('/'));
            let text = match str_field(item, "description") {
                Some(desc) => format!("{name}: {desc}"),
                None => name.to_string(),
            };

            let mut metrics = BTreeMap::new();
            metrics.insert("stars".to_string(), parse_num(item.get("stars")));
            metrics.insert("forks".to_string(), parse_num(item.get("forks")));

            out.push(CanonicalSignal {
                id: signal_id(&[name], item),
                source: self.key().to_string(),
                timestamp: scanned,
                author: owner.unwrap_or("GitHub").to_string(),
                display_text: ctx.clean_text(&text),
                url: str_field(item, "url").map(str::to_string),
                group_key: None,
                subject: None,
                metrics,
                tags: tag_set(item.get("tags")),
                raw_payload: item.clone(),
            });
        }
        Ok(out)
    }
}
