//! Cross-source merge for one country.

use crate::models::{DedupSet, NewsItem};
use std::collections::HashSet;

/// Merge per-source lists into the country's candidate pool.
///
/// Items are ordered newest first (stable, so equal timestamps keep source
/// order), then deduplicated across all sources by URL identity and story
/// identity. Anything on a blocked domain is dropped here as well, so the pool
/// never carries one regardless of what the sources let through.
pub fn aggregate(per_source: Vec<Vec<NewsItem>>, blocked: &HashSet<String>) -> Vec<NewsItem> {
    let mut merged: Vec<NewsItem> = per_source
        .into_iter()
        .flatten()
        .filter(|item| !blocked.contains(&item.domain))
        .collect();
    merged.sort_by(|a, b| b.published_at.cmp(&a.published_at));

    let mut seen = DedupSet::new();
    merged.retain(|item| seen.admit(item));
    merged
}
