// src/ingest/providers/polymarket.rs
//! Prediction-market quotes. One signal per (event, question) quote.

use serde_json::Value;
use std::collections::BTreeMap;

use super::{items_with_meta, objects, parse_num, str_field, tag_set, NormalizeCtx, SourceNormalizer};
use crate::error::RefineryError;
use crate::model::{signal_id, CanonicalSignal, IMPLIED_PROBABILITY};

pub struct PolymarketNormalizer;

/// Leading-outcome probability from strings like `"Yes: 92.5% | No: 7.5%"` or
/// `"Up: 61%"`. Anything else is a coin flip.
pub fn implied_probability(prices: &str) -> f64 {
    for marker in ["Yes: ", "Up: "] {
        if let Some(rest) = prices.split(marker).nth(1) {
            let num = rest.split('%').next().unwrap_or_default().trim();
            if let Ok(p) = num.parse::<f64>() {
                return p;
            }
        }
    }
    50.0
}

fn prices_string(v: Option<&Value>) -> String {
    match v {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

impl SourceNormalizer for PolymarketNormalizer {
    fn key(&self) -> &'static str {
        "polymarket"
    }

    fn process(&self, raw: &Value, ctx: &NormalizeCtx) -> Result<Vec<CanonicalSignal>, RefineryError> {
        let (items, _) = items_with_meta(raw, "scanned_at_bj")?;
        let engine = if ctx.path.to_ascii_lowercase().contains("sniper") {
            "sniper"
        } else {
            "radar"
        };

        let mut out = Vec::new();
        for item in objects(items, self.key(), &ctx.path) {
            let title = str_field(item, "eventTitle").unwrap_or_default();
            let question = str_field(item, "question").unwrap_or_default();
            let slug = str_field(item, "slug").map(str::to_string);

            let vol24h = parse_num(item.get("vol24h"));
            let day_change = parse_num(item.get("dayChange"));
            let mut metrics = BTreeMap::new();
            metrics.insert("volume".to_string(), parse_num(item.get("volume")));
            metrics.insert("liquidity".to_string(), parse_num(item.get("liquidity")));
            metrics.insert("vol24h".to_string(), vol24h);
            metrics.insert("day_change".to_string(), day_change);
            metrics.insert("momentum".to_string(), vol24h * (day_change.abs() + 1.0));
            metrics.insert(
                IMPLIED_PROBABILITY.to_string(),
                implied_probability(&prices_string(item.get("prices"))),
            );

            let mut tags = tag_set(item.get("strategy_tags"));
            if let Some(cat) = str_field(item, "category") {
                tags.insert(cat.to_ascii_lowercase());
            }
            tags.insert(engine.to_string());

            let author = str_field(item, "ticker")
                .map(str::to_string)
                .or_else(|| slug.clone())
                .unwrap_or_else(|| "polymarket".to_string());

            let text = match (title.is_empty(), question.is_empty()) {
                (false, false) => format!("{title} -> {question}"),
                (false, true) => title.to_string(),
                _ => question.to_string(),
            };

            out.push(CanonicalSignal {
                id: signal_id(&[title, question], item),
                source: self.key().to_string(),
                timestamp: ctx.timestamp_or_batch(item.get("updatedAt")),
                author,
                display_text: ctx.clean_text(&text),
                url: slug
                    .as_deref()
                    .map(|s| format!("https://polymarket.com/event/{s}")),
                group_key: slug,
                subject: Some(ctx.clean_text(question)).filter(|q| !q.is_empty()),
                metrics,
                tags,
                raw_payload: item.clone(),
            });
        }
        Ok(out)
    }
}
