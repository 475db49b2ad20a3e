//! Proportional per-category quota with a starvation floor.
//!
//! quota(c) = max(floor, ceil(|pool(c)| / T × target)), where T is the number
//! of distinct signals across all pools. With multi-tagged signals the quotas
//! can add up to more than `target`; that overlap is accepted as is.

use std::collections::{BTreeMap, HashSet};

use crate::model::{by_score_desc, ScoredSignal};

#[derive(Debug, Clone, Copy)]
pub struct QuotaAllocator {
    floor: usize,
}

impl QuotaAllocator {
    pub fn new(floor: usize) -> Self {
        Self { floor }
    }

    pub fn quota_for(&self, pool_size: usize, total_pool_size: usize, target: usize) -> usize {
        if total_pool_size == 0 {
            return 0;
        }
        // ceil(pool_size * target / total) in integers
        let share = (pool_size * target).div_ceil(total_pool_size);
        self.floor.max(share)
    }

    pub fn allocate(
        &self,
        pools: BTreeMap<String, Vec<ScoredSignal>>,
        target: usize,
    ) -> BTreeMap<String, Vec<ScoredSignal>> {
        let shares = PoolShares::of(&pools);
        self.allocate_with(pools, &shares, target)
    }

    /// Truncate `pools` to quotas computed from `shares`, which may describe
    /// the pools at an earlier stage (before anti-flood thinned them).
    /// A category missing from `shares` is sized by its own pool.
    pub fn allocate_with(
        &self,
        pools: BTreeMap<String, Vec<ScoredSignal>>,
        shares: &PoolShares,
        target: usize,
    ) -> BTreeMap<String, Vec<ScoredSignal>> {
        let mut out = BTreeMap::new();
        for (category, mut pool) in pools {
            if pool.is_empty() {
                continue;
            }
            let size = shares.sizes.get(&category).copied().unwrap_or(pool.len());
            let total = shares.total.max(size);
            let quota = self.quota_for(size, total, target);
            pool.sort_by(by_score_desc);
            pool.truncate(quota);
            out.insert(category, pool);
        }
        out
    }
}

/// Pool sizes and the distinct-signal total the quota shares are taken from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolShares {
    pub sizes: BTreeMap<String, usize>,
    pub total: usize,
}

impl PoolShares {
    pub fn of(pools: &BTreeMap<String, Vec<ScoredSignal>>) -> Self {
        let total = pools
            .values()
            .flatten()
            .map(|s| s.id())
            .collect::<HashSet<_>>()
            .len();
        Self {
            sizes: pools.iter().map(|(k, v)| (k.clone(), v.len())).collect(),
            total,
        }
    }
}

/// Bucket signals by category. With `multi_tag`, a signal also joins every
/// pool whose name matches one of its tags (case-insensitive) among `known`.
pub fn build_pools<'a>(
    signals: &[ScoredSignal],
    multi_tag: bool,
    known: impl IntoIterator<Item = &'a str>,
) -> BTreeMap<String, Vec<ScoredSignal>> {
    let known: Vec<&str> = known.into_iter().collect();
    let mut pools: BTreeMap<String, Vec<ScoredSignal>> = BTreeMap::new();
    for sig in signals {
        pools.entry(sig.category.clone()).or_default().push(sig.clone());
        if !multi_tag {
            continue;
        }
        for tag in &sig.signal.tags {
            let Some(name) = known.iter().find(|k| k.eq_ignore_ascii_case(tag)) else {
                continue;
            };
            if *name == sig.category {
                continue;
            }
            let pool = pools.entry(name.to_string()).or_default();
            if !pool.iter().any(|p| p.id() == sig.id()) {
                pool.push(sig.clone());
            }
        }
    }
    pools
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CanonicalSignal;
    use chrono::{FixedOffset, TimeZone};
    use std::collections::{BTreeMap, BTreeSet};

    fn sig(id: usize, category: &str, score: f64, tags: &[&str]) -> ScoredSignal {
        let offset = FixedOffset::east_opt(8 * 3600).unwrap();
        ScoredSignal::new(
            CanonicalSignal {
                id: format!("s{id}"),
                source: "twitter".into(),
                timestamp: offset.with_ymd_and_hms(2026, 2, 5, 9, 0, 0).unwrap(),
                author: format!("a{id}"),
                display_text: "t".into(),
                url: None,
                group_key: None,
                subject: None,
                metrics: BTreeMap::new(),
                tags: tags.iter().map(|t| t.to_string()).collect::<BTreeSet<_>>(),
                raw_payload: serde_json::Value::Null,
            },
            score,
            category,
        )
    }

    #[test]
    fn proportional_with_floor_and_truncation() {
        let mut pools = BTreeMap::new();
        pools.insert("Tech".to_string(), (0..40).map(|i| sig(i, "Tech", i as f64, &[])).collect());
        pools.insert("Crypto".to_string(), (40..58).map(|i| sig(i, "Crypto", i as f64, &[])).collect());
        pools.insert("Science".to_string(), (58..60).map(|i| sig(i, "Science", i as f64, &[])).collect());
        pools.insert("Empty".to_string(), Vec::new());

        let out = QuotaAllocator::new(3).allocate(pools, 30);
        // 40/60*30 = 20; 18/60*30 = 9; 2/60*30 = 1 -> floor 3, but pool has 2
        assert_eq!(out["Tech"].len(), 20);
        assert_eq!(out["Crypto"].len(), 9);
        assert_eq!(out["Science"].len(), 2);
        assert!(!out.contains_key("Empty"));
        let scores: Vec<f64> = out["Tech"].iter().map(|s| s.score).collect();
        assert!(scores.windows(2).all(|w| w[0] >= w[1]));
        assert_eq!(scores[0], 39.0);
    }

    #[test]
    fn multi_tag_pools_count_distinct_signals_once() {
        let signals = vec![
            sig(1, "Tech", 5.0, &["crypto"]),
            sig(2, "Crypto", 4.0, &[]),
            sig(3, "General", 3.0, &["tech", "unknown"]),
        ];
        let pools = build_pools(&signals, true, ["Tech", "Crypto"]);
        assert_eq!(pools["Tech"].len(), 2);
        assert_eq!(pools["Crypto"].len(), 2);
        assert_eq!(pools["General"].len(), 1);

        // T = 3 distinct; ceil(2/3*6) = 4 -> all 2 kept, over-allocation accepted
        let out = QuotaAllocator::new(1).allocate(pools, 6);
        let total: usize = out.values().map(Vec::len).sum();
        assert_eq!(total, 5);

        let single = build_pools(&signals, false, ["Tech", "Crypto"]);
        assert_eq!(single.values().map(Vec::len).sum::<usize>(), 3);
    }

    #[test]
    fn shares_from_earlier_pools_drive_quotas() {
        // before thinning: Politics 30 of 40, Tech 10 of 40
        let mut before = BTreeMap::new();
        before.insert("Politics".to_string(), (0..30).map(|i| sig(i, "Politics", 1.0, &[])).collect());
        before.insert("Tech".to_string(), (30..40).map(|i| sig(i, "Tech", 1.0, &[])).collect());
        let shares = PoolShares::of(&before);
        assert_eq!(shares.total, 40);

        // after thinning both pools hold 8
        let mut after = BTreeMap::new();
        after.insert("Politics".to_string(), (0..8).map(|i| sig(i, "Politics", i as f64, &[])).collect());
        after.insert("Tech".to_string(), (30..38).map(|i| sig(i, "Tech", i as f64, &[])).collect());

        let out = QuotaAllocator::new(3).allocate_with(after.clone(), &shares, 10);
        // ceil(30/40*10) = 8, ceil(10/40*10) = 3
        assert_eq!(out["Politics"].len(), 8);
        assert_eq!(out["Tech"].len(), 3);

        // own sizes: 8/16*10 = 5 each
        let own = QuotaAllocator::new(3).allocate(after, 10);
        assert_eq!(own["Politics"].len(), 5);
        assert_eq!(own["Tech"].len(), 5);
    }
}
