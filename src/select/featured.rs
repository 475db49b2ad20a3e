//! Quota-exempt featured pools.
//!
//! Tagged pools claim every signal carrying their tag; an untagged pool takes
//! the top of whatever no tagged pool claimed. Signals carrying a featured tag
//! never reach the category quotas, even when the pool's limit cut them.

use std::collections::HashSet;

use crate::config::FeaturedPool;
use crate::model::{by_score_desc, ScoredSignal};

#[derive(Debug, Default)]
pub struct FeaturedSplit {
    /// (pool name, score-ordered members), in configuration order.
    pub featured: Vec<(String, Vec<ScoredSignal>)>,
    /// Everything left for the category quotas.
    pub rest: Vec<ScoredSignal>,
    tags: Vec<String>,
    taken: HashSet<String>,
}

impl FeaturedSplit {
    /// True when `s` belongs to a featured pool rather than the categories.
    pub fn excludes(&self, s: &ScoredSignal) -> bool {
        self.taken.contains(s.id()) || carries_any(s, &self.tags)
    }
}

fn carries_any(s: &ScoredSignal, tags: &[String]) -> bool {
    s.signal
        .tags
        .iter()
        .any(|t| tags.iter().any(|f| f.eq_ignore_ascii_case(t)))
}

pub fn split_featured(signals: Vec<ScoredSignal>, pools: &[FeaturedPool]) -> FeaturedSplit {
    let tags: Vec<String> = pools.iter().filter_map(|p| p.tag.clone()).collect();
    let mut remaining = signals;
    let mut featured = Vec::with_capacity(pools.len());
    let mut taken = HashSet::new();

    for pool in pools {
        let (mut members, rest): (Vec<ScoredSignal>, Vec<ScoredSignal>) =
            remaining.into_iter().partition(|s| match &pool.tag {
                Some(tag) => carries_any(s, std::slice::from_ref(tag)),
                None => !carries_any(s, &tags),
            });
        remaining = rest;
        members.sort_by(by_score_desc);

        if pool.limit > 0 && members.len() > pool.limit {
            let spill = members.split_off(pool.limit);
            // untagged overflow goes back to the categories
            if pool.tag.is_none() {
                remaining.extend(spill);
            }
        }
        taken.extend(members.iter().map(|s| s.id().to_string()));
        if !members.is_empty() {
            featured.push((pool.name.clone(), members));
        }
    }

    let rest = remaining
        .into_iter()
        .filter(|s| !carries_any(s, &tags))
        .collect();
    FeaturedSplit {
        featured,
        rest,
        tags,
        taken,
    }
}
