// tests/common/mod.rs
#![allow(dead_code)]

use chrono::{DateTime, FixedOffset, TimeZone};
use signal_refinery::model::{CanonicalSignal, ScoredSignal, IMPLIED_PROBABILITY};
use std::collections::{BTreeMap, BTreeSet};

pub fn bj() -> FixedOffset {
    FixedOffset::east_opt(8 * 3600).unwrap()
}

pub fn at(h: u32, m: u32) -> DateTime<FixedOffset> {
    bj().with_ymd_and_hms(2026, 2, 5, h, m, 0).unwrap()
}

pub fn signal(id: &str, author: &str, text: &str) -> CanonicalSignal {
    CanonicalSignal {
        id: id.to_string(),
        source: "twitter".into(),
        timestamp: at(9, 0),
        author: author.to_string(),
        display_text: text.to_string(),
        url: None,
        group_key: None,
        subject: None,
        metrics: BTreeMap::new(),
        tags: BTreeSet::new(),
        raw_payload: serde_json::Value::Null,
    }
}

pub fn scored(id: &str, author: &str, category: &str, score: f64) -> ScoredSignal {
    ScoredSignal::new(signal(id, author, id), score, category)
}

pub fn quote(id: &str, group: &str, prob: f64, score: f64) -> ScoredSignal {
    let mut s = signal(id, group, &format!("question {id}"));
    s.group_key = Some(group.to_string());
    s.metrics.insert(IMPLIED_PROBABILITY.to_string(), prob);
    ScoredSignal::new(s, score, "General")
}
