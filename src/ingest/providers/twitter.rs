// src/ingest/providers/twitter.rs
use serde_json::Value;
use std::collections::BTreeMap;

use super::{items_with_meta, objects, parse_num, str_field, tag_set, NormalizeCtx, SourceNormalizer};
use crate::error::RefineryError;
use crate::model::{signal_id, CanonicalSignal};

const ENGAGEMENT: [&str; 6] = ["likes", "retweets", "replies", "quotes", "bookmarks", "views"];
const GROWTH: [&str; 4] = ["views", "likes", "retweets", "replies"];

pub struct TwitterNormalizer;

impl SourceNormalizer for TwitterNormalizer {
    fn key(&self) -> &'static str {
        "twitter"
    }

    fn process(&self, raw: &Value, ctx: &NormalizeCtx) -> Result<Vec<CanonicalSignal>, RefineryError> {
        let (items, _) = items_with_meta(raw, "scanned_at_bj")?;

        let mut out = Vec::new();
        for item in objects(items, self.key(), &ctx.path) {
            let user = item.get("user").unwrap_or(&Value::Null);
            let author = str_field(user, "screenName")
                .or_else(|| str_field(user, "name"))
                .unwrap_or("unknown")
                .to_string();
            let url = str_field(item, "tweetUrl").map(str::to_string);
            let text = str_field(item, "fullText").unwrap_or_default();

            let mut metrics = BTreeMap::new();
            let counts = item.get("metrics").unwrap_or(&Value::Null);
            for name in ENGAGEMENT {
                metrics.insert(name.to_string(), parse_num(counts.get(name)));
            }
            let growth = item.get("growth").unwrap_or(&Value::Null);
            for name in GROWTH {
                metrics.insert(format!("growth_{name}"), parse_num(growth.get(name)));
            }
            metrics.insert(
                "followers".to_string(),
                parse_num(user.get("followersCount")),
            );

            out.push(CanonicalSignal {
                id: signal_id(&[url.as_deref().unwrap_or_default()], item),
                source: self.key().to_string(),
                timestamp: ctx.timestamp_or_batch(item.get("createdAt")),
                author,
                display_text: ctx.clean_text(text),
                url,
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

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone, Timelike};
    use serde_json::json;

    #[test]
    fn tweet_fields_and_timestamp() {
        let offset = FixedOffset::east_opt(8 * 3600).unwrap();
        let ctx = NormalizeCtx {
            path: "twitter/2026/02/05.json".into(),
            batch_time: offset.with_ymd_and_hms(2026, 2, 5, 10, 0, 0).unwrap(),
            offset,
            max_text_chars: 1500,
        };
        let raw = json!([
            {
                "user": {"name": "Elon", "screenName": "elonmusk", "followersCount": "1,000"},
                "fullText": "Chips &amp; tariffs   ahead",
                "tweetUrl": "https://x.com/elonmusk/status/1",
                "tags": ["Tech", "Economy"],
                "metrics": {"likes": 10, "retweets": "2", "bookmarks": 3},
                "growth": {"likes": 4},
                "createdAt": "Wed Feb 04 17:23:38 +0000 2026"
            },
            {"fullText": "no date", "createdAt": "garbage"},
            42
        ]);
        let out = TwitterNormalizer.process(&raw, &ctx).unwrap();
        assert_eq!(out.len(), 2);
        let t = &out[0];
        assert_eq!(t.author, "elonmusk");
        assert_eq!(t.display_text, "Chips & tariffs ahead");
        assert_eq!(t.metric("retweets"), 2.0);
        assert_eq!(t.metric("growth_likes"), 4.0);
        assert_eq!(t.metric("quotes"), 0.0);
        assert_eq!(t.metric("followers"), 1000.0);
        assert_eq!(t.timestamp.hour(), 1);
        assert_eq!(t.tags.len(), 2);
        // unparseable createdAt falls back to the batch time
        assert_eq!(out[1].timestamp, ctx.batch_time);
        assert_eq!(out[1].author, "unknown");
    }
}
