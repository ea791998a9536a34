//! Judge input preparation
//!
//! Near-identical hits are collapsed by normalized description so a backend
//! cannot inflate its list with duplicates, then each side is capped.

use std::collections::HashSet;

use shared::SearchHit;

/// Most hits per side shown to the judge
pub const MAX_JUDGED_HITS: usize = 10;

fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn dedupe_key(hit: &SearchHit) -> String {
    let description = normalize(&hit.description);
    if description.is_empty() {
        // Hits without a description fall back to their title
        format!("title:{}", normalize(&hit.title))
    } else {
        description
    }
}

/// First occurrence wins; order is preserved
pub fn dedupe_for_judging(hits: &[SearchHit]) -> Vec<SearchHit> {
    let mut seen = HashSet::new();
    hits.iter()
        .filter(|hit| seen.insert(dedupe_key(hit)))
        .take(MAX_JUDGED_HITS)
        .cloned()
        .collect()
}
