//! Per-source acceptance rules and in-source deduplication.
//!
//! Turns one source's raw candidates into validated [`NewsItem`]s, preserving
//! the order the fetcher produced them in.

use crate::config::{PipelineConfig, SourceConfig, SourceScope};
use crate::models::{DedupSet, NewsItem, RawCandidate};
use crate::normalize::domain_of;
use chrono::{DateTime, Utc};
use regex::Regex;
use std::collections::HashSet;
use url::Url;

/// Acceptance rules for a single source, borrowed from the run config.
#[derive(Debug)]
pub struct SourceRules<'a> {
    pub min_title_len: usize,
    pub scope: SourceScope,
    /// Normalized host of the source URL.
    pub source_host: String,
    /// Source path, lowercased and ending in `/`.
    pub section_prefix: String,
    pub allowed_path: Option<Regex>,
    /// Banned segments as lowercase `/segment/` needles.
    pub banned_segments: Vec<String>,
    pub blocked: &'a HashSet<String>,
    pub quota: Option<usize>,
}

impl<'a> SourceRules<'a> {
    /// Build the rules for `source`, falling back to `default_quota` when the
    /// source sets none.
    pub fn for_source(
        config: &'a PipelineConfig,
        source: &SourceConfig,
        blocked: &'a HashSet<String>,
        default_quota: usize,
    ) -> Result<Self, regex::Error> {
        let allowed_path = source.allowed_path.as_deref().map(Regex::new).transpose()?;
        let mut section_prefix = Url::parse(&source.url)
            .map(|u| u.path().to_lowercase())
            .unwrap_or_else(|_| "/".to_string());
        if !section_prefix.ends_with('/') {
            section_prefix.push('/');
        }

        Ok(Self {
            min_title_len: config.min_title_len,
            scope: source.scope,
            source_host: domain_of(&source.url),
            section_prefix,
            allowed_path,
            banned_segments: config
                .banned_path_segments
                .iter()
                .map(|s| s.trim_matches('/').to_lowercase())
                .filter(|s| !s.is_empty())
                .map(|s| format!("/{s}/"))
                .collect(),
            blocked,
            quota: Some(source.quota.unwrap_or(default_quota)),
        })
    }

    fn accepts(&self, item: &NewsItem) -> bool {
        if item.title.trim().chars().count() < self.min_title_len {
            return false;
        }
        if self.blocked.contains(&item.domain) {
            return false;
        }
        let Ok(url) = Url::parse(&item.link) else {
            return false;
        };
        let path = url.path().to_lowercase();

        let in_scope = match self.scope {
            SourceScope::Any => true,
            SourceScope::SameHost => item.domain == self.source_host,
            SourceScope::Section => {
                item.domain == self.source_host && path.starts_with(&self.section_prefix)
            }
        };
        if !in_scope {
            return false;
        }
        if self
            .allowed_path
            .as_ref()
            .is_some_and(|re| !re.is_match(url.path()))
        {
            return false;
        }
        // Trailing slash so a bare index page (`/tag`) matches as a whole segment.
        let path = format!("{}/", path.trim_end_matches('/'));
        !self.banned_segments.iter().any(|needle| path.contains(needle.as_str()))
    }
}

/// Validate, filter and dedupe one source's candidates.
///
/// Malformed candidates are skipped; the rest are kept in input order, first
/// occurrence winning on either dedup key, then truncated to the quota.
pub fn filter_candidates(
    raw: Vec<RawCandidate>,
    fetched_at: DateTime<Utc>,
    rules: &SourceRules<'_>,
) -> Vec<NewsItem> {
    let mut seen = DedupSet::new();
    let quota = rules.quota.unwrap_or(usize::MAX);

    raw.into_iter()
        .filter_map(|candidate| NewsItem::from_candidate(candidate, fetched_at))
        .filter(|item| rules.accepts(item))
        .filter(|item| seen.admit(item))
        .take(quota)
        .collect()
}
