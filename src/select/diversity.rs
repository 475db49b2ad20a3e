//! Diversity breaker: a global per-author cap over a score-ordered sweep.

use std::collections::HashMap;

use crate::model::{by_score_desc, ScoredSignal};

/// Accept the highest-scoring signals until `n` are taken, skipping any whose
/// author already has `per_author_cap` accepted. Output is score-descending.
pub fn select_top_n(
    mut all: Vec<ScoredSignal>,
    n: usize,
    per_author_cap: usize,
) -> Vec<ScoredSignal> {
    all.sort_by(by_score_desc);
    let mut per_author: HashMap<String, usize> = HashMap::new();
    let mut out = Vec::with_capacity(n.min(all.len()));
    for sig in all {
        if out.len() >= n {
            break;
        }
        let count = per_author.entry(sig.author().to_lowercase()).or_insert(0);
        if *count >= per_author_cap {
            continue;
        }
        *count += 1;
        out.push(sig);
    }
    out
}
