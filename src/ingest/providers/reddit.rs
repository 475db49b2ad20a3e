// src/ingest/providers/reddit.rs
//! Forum digests: `[{timestamp, data: [{subreddit, champions: [post]}]}]`.

use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

use super::{items_with_meta, objects, parse_num, str_field, NormalizeCtx, SourceNormalizer};
use crate::error::RefineryError;
use crate::model::{signal_id, CanonicalSignal};

pub struct RedditNormalizer;

impl SourceNormalizer for RedditNormalizer {
    fn key(&self) -> &'static str {
        "reddit"
    }

    fn process(&self, raw: &Value, ctx: &NormalizeCtx) -> Result<Vec<CanonicalSignal>, RefineryError> {
        let (batches, _) = items_with_meta(raw, "timestamp")?;

        let mut out = Vec::new();
        for batch in objects(batches, self.key(), &ctx.path) {
            // every post in a batch shares the batch timestamp
            let ts = ctx.timestamp_or_batch(batch.get("timestamp"));
            let boards = batch.get("data").and_then(Value::as_array);
            for board in boards.into_iter().flatten() {
                let subreddit = str_field(board, "subreddit").unwrap_or("unknown");
                let posts = board.get("champions").and_then(Value::as_array);
                for post in posts.into_iter().flatten().filter(|p| p.is_object()) {
                    let url = str_field(post, "url").map(str::to_string);
                    let title = str_field(post, "title").unwrap_or_default();
                    let text = match str_field(post, "summary") {
                        Some(summary) => format!("{title}: {summary}"),
                        None => title.to_string(),
                    };

                    let mut metrics = BTreeMap::new();
                    metrics.insert("upvotes".to_string(), parse_num(post.get("score")));
                    metrics.insert("comments".to_string(), parse_num(post.get("comments")));
                    metrics.insert("vibe".to_string(), parse_num(post.get("vibe")));

                    let mut tags = BTreeSet::new();
                    tags.insert(subreddit.to_ascii_lowercase());

                    out.push(CanonicalSignal {
                        id: signal_id(&[url.as_deref().unwrap_or_default()], post),
                        source: self.key().to_string(),
                        timestamp: ts,
                        author: format!("r/{subreddit}"),
                        display_text: ctx.clean_text(&text),
                        url,
                        group_key: None,
                        subject: None,
                        metrics,
                        tags,
                        raw_payload: post.clone(),
                    });
                }
            }
        }
        Ok(out)
    }
}
