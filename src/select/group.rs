//! Anti-flood: reduce one event's many quotes to at most `group_cap` rows.
//!
//! Picks the strongest consensus quote (implied probability above
//! `consensus_above`) and the strongest conflict quote (below
//! `conflict_below`). With neither, the top-scoring quote stands alone. A
//! lone pick is backfilled with the next materially different quote if it
//! scores above `backfill_ratio` of the pick, so a close second storyline is
//! not hidden.

use std::collections::BTreeMap;

use crate::config::SelectionSettings;
use crate::model::{by_score_desc, ScoredSignal};

#[derive(Debug, Clone, Copy)]
pub struct GroupSelector {
    settings: SelectionSettings,
}

impl GroupSelector {
    pub fn new(settings: SelectionSettings) -> Self {
        Self { settings }
    }

    pub fn select(&self, mut group: Vec<ScoredSignal>) -> Vec<ScoredSignal> {
        let s = &self.settings;
        if group.is_empty() {
            return group;
        }
        group.sort_by(by_score_desc);

        let consensus = group
            .iter()
            .position(|g| g.signal.implied_probability() > s.consensus_above);
        let conflict = group
            .iter()
            .position(|g| g.signal.implied_probability() < s.conflict_below);

        let mut picks: Vec<usize> = consensus.into_iter().chain(conflict).collect();
        if picks.is_empty() {
            picks.push(0);
        }

        let mut backfill = None;
        if picks.len() < 2 && group.len() > 1 {
            let top = &group[picks[0]];
            backfill = group.iter().position(|cand| {
                cand.id() != top.id()
                    && !self.same_subject(subject(cand), subject(top))
                    && cand.score > top.score * s.backfill_ratio
            });
        }

        let mut out: Vec<ScoredSignal> = Vec::with_capacity(2);
        let mut slots: Vec<Option<ScoredSignal>> = group.into_iter().map(Some).collect();
        for i in picks {
            if let Some(item) = slots[i].take() {
                out.push(item);
            }
        }
        if let Some(i) = backfill {
            if let Some(mut item) = slots[i].take() {
                item.is_backfill = true;
                out.push(item);
            }
        }
        out.truncate(s.group_cap);
        out
    }

    /// Reduce every group; signals without a group key pass through untouched.
    pub fn select_all(&self, signals: Vec<ScoredSignal>) -> Vec<ScoredSignal> {
        let mut groups: BTreeMap<String, Vec<ScoredSignal>> = BTreeMap::new();
        let mut out = Vec::with_capacity(signals.len());
        for sig in signals {
            match sig.signal.group_key.clone() {
                Some(key) => groups.entry(key).or_default().push(sig),
                None => out.push(sig),
            }
        }
        for (_, group) in groups {
            out.extend(self.select(group));
        }
        out
    }

    /// Near-identical subjects are one storyline. Compared word by word, so
    /// "Will A win?" and "Will B win?" stay distinct.
    fn same_subject(&self, a: &str, b: &str) -> bool {
        let a = words(a);
        let b = words(b);
        if a == b {
            return true;
        }
        let longest = a.len().max(b.len());
        let distance = strsim::generic_levenshtein(&a, &b);
        1.0 - distance as f64 / longest as f64 >= self.settings.duplicate_similarity
    }
}

fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn subject(s: &ScoredSignal) -> &str {
    s.signal
        .subject
        .as_deref()
        .unwrap_or(&s.signal.display_text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CanonicalSignal, IMPLIED_PROBABILITY};
    use chrono::{FixedOffset, TimeZone};
    use std::collections::{BTreeMap, BTreeSet};

    fn quote(id: &str, question: &str, prob: f64, score: f64) -> ScoredSignal {
        let offset = FixedOffset::east_opt(8 * 3600).unwrap();
        let mut metrics = BTreeMap::new();
        metrics.insert(IMPLIED_PROBABILITY.to_string(), prob);
        ScoredSignal::new(
            CanonicalSignal {
                id: id.into(),
                source: "polymarket".into(),
                timestamp: offset.with_ymd_and_hms(2026, 2, 5, 9, 0, 0).unwrap(),
                author: "EVT".into(),
                display_text: question.into(),
                url: None,
                group_key: Some("evt".into()),
                subject: Some(question.into()),
                metrics,
                tags: BTreeSet::new(),
                raw_payload: serde_json::Value::Null,
            },
            score,
            "Politics",
        )
    }

    fn ids(v: &[ScoredSignal]) -> Vec<&str> {
        v.iter().map(|s| s.id()).collect()
    }

    fn selector() -> GroupSelector {
        GroupSelector::new(SelectionSettings::default())
    }

    #[test]
    fn both_extremes_are_kept() {
        let out = selector().select(vec![
            quote("mid", "Will B win?", 50.0, 900.0),
            quote("low", "Will C win?", 5.0, 100.0),
            quote("high", "Will A win?", 92.0, 300.0),
        ]);
        assert_eq!(ids(&out), vec!["high", "low"]);
        assert!(out.iter().all(|s| !s.is_backfill));
    }

    #[test]
    fn no_extreme_takes_top_and_backfills_distinct_question() {
        let out = selector().select(vec![
            quote("a", "Will the bill pass the Senate?", 50.0, 100.0),
            quote("b", "Will the governor resign before June?", 40.0, 30.0),
            quote("c", "Will turnout exceed 60%?", 60.0, 10.0),
        ]);
        assert_eq!(ids(&out), vec!["a", "b"]);
        assert!(out[1].is_backfill);
    }

    #[test]
    fn weak_second_is_not_backfilled() {
        let out = selector().select(vec![
            quote("a", "Will the bill pass?", 50.0, 100.0),
            quote("b", "Will the governor resign?", 40.0, 20.0),
        ]);
        assert_eq!(ids(&out), vec!["a"]);
    }

    #[test]
    fn near_duplicate_question_is_not_backfilled() {
        let out = selector().select(vec![
            quote("a", "Will the bill pass the Senate?", 50.0, 100.0),
            quote("b", "Will the bill pass the Senate ?", 55.0, 90.0),
            quote("c", "Will the House adjourn early?", 45.0, 50.0),
        ]);
        assert_eq!(ids(&out), vec!["a", "c"]);
    }

    #[test]
    fn one_word_apart_in_a_long_question_is_a_duplicate() {
        let sel = selector();
        assert!(sel.same_subject(
            "Will the Fed cut rates at the March meeting by fifty basis points",
            "Will the Fed cut rates at the March meeting by fifty basis points?"
        ));
        assert!(sel.same_subject(
            "Will the Fed cut rates at the March meeting by at least fifty basis points",
            "Will the Fed cut rates at the March meeting by at least 50 basis points"
        ));
        assert!(!sel.same_subject("Will A win?", "Will B win?"));
    }

    #[test]
    fn normalized_markets_under_one_event_backfill_the_second_question() {
        use crate::ingest::providers::{polymarket::PolymarketNormalizer, NormalizeCtx, SourceNormalizer};

        let offset = FixedOffset::east_opt(8 * 3600).unwrap();
        let ctx = NormalizeCtx {
            path: "polymarket/radar/race.json".into(),
            batch_time: offset.with_ymd_and_hms(2026, 2, 5, 9, 0, 0).unwrap(),
            offset,
            max_text_chars: 1500,
        };
        let raw = serde_json::json!([
            {"eventTitle": "Who wins the race", "question": "Will A win?", "slug": "race",
             "ticker": "RACE", "prices": "Yes: 50% | No: 50%", "vol24h": "9,000"},
            {"eventTitle": "Who wins the race", "question": "Will B win?", "slug": "race",
             "ticker": "RACE", "prices": "Yes: 40% | No: 60%", "vol24h": "8,000"}
        ]);
        let signals = PolymarketNormalizer.process(&raw, &ctx).unwrap();
        assert_eq!(signals[0].group_key, signals[1].group_key);
        assert!(signals[0].display_text.starts_with("Who wins the race"));

        let scored: Vec<ScoredSignal> = signals
            .into_iter()
            .map(|s| {
                let score = s.metrics["vol24h"];
                ScoredSignal::new(s, score, "General")
            })
            .collect();
        let out = selector().select_all(scored);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].signal.subject.as_deref(), Some("Will A win?"));
        assert_eq!(out[1].signal.subject.as_deref(), Some("Will B win?"));
        assert!(out[1].is_backfill);
    }

    #[test]
    fn select_all_caps_each_group_and_passes_ungrouped() {
        let mut loose = quote("solo", "x", 50.0, 1.0);
        loose.signal.group_key = None;
        let mut other = quote("o1", "Will Z happen?", 99.0, 5.0);
        other.signal.group_key = Some("other".into());
        let out = selector().select_all(vec![
            loose,
            quote("e1", "Will A happen?", 95.0, 10.0),
            quote("e2", "Will B happen?", 3.0, 9.0),
            quote("e3", "Will C happen?", 50.0, 8.0),
            other,
        ]);
        assert_eq!(out.len(), 4);
        assert!(ids(&out).contains(&"solo"));
        assert!(!ids(&out).contains(&"e3"));
    }
}
