//! Data models for headlines as they move through a country's pipeline.
//!
//! This module defines the core data structures used throughout the application:
//! - [`RawCandidate`]: An unvalidated title/link pair extracted from a source
//! - [`NewsItem`]: A validated, canonicalized headline ready for dedup and mixing
//! - [`CountryFeed`]: The final, capped list of headlines for one country
//! - [`DedupSet`]: The two-key (URL identity, story identity) seen-set
//!
//! Nothing here outlives a single run; each country's items are built, mixed,
//! written, and dropped.

use crate::normalize::{canonicalize_link, domain_of, normalize_title, url_key};
use chrono::{DateTime, Utc};
use std::collections::HashSet;

/// A raw headline candidate as extracted by a fetch strategy.
///
/// Candidates are not trusted: the title may be a menu label, the link may be
/// relative garbage, and the timestamp is only present for syndication feeds.
///
/// # Fields
///
/// * `title` - Display text as found on the page or in the feed
/// * `link` - Absolute URL as resolved by the fetcher (not yet canonicalized)
/// * `published_at` - Publication time when the source states one
#[derive(Debug, Clone, PartialEq)]
pub struct RawCandidate {
    pub title: String,
    pub link: String,
    pub published_at: Option<DateTime<Utc>>,
}

/// A single headline that passed shape validation.
///
/// The `link` is always canonical (see [`canonicalize_link`]) and `domain`
/// is always the `www.`-stripped, lowercased host of that link.
#[derive(Debug, Clone, PartialEq)]
pub struct NewsItem {
    /// Display title, whitespace-collapsed but otherwise untouched.
    pub title: String,
    /// Canonical absolute URL.
    pub link: String,
    /// Normalized host used as the diversity bucket.
    pub domain: String,
    /// Best-known publication time; fetch time when the source gives none.
    pub published_at: DateTime<Utc>,
}

impl NewsItem {
    /// Validate a raw candidate and turn it into an item.
    ///
    /// Returns `None` for candidates with an empty title, an empty link, or a
    /// link without a recognizable host. Missing timestamps fall back to
    /// `fetched_at`.
    pub fn from_candidate(raw: RawCandidate, fetched_at: DateTime<Utc>) -> Option<Self> {
        let title = raw.title.split_whitespace().collect::<Vec<_>>().join(" ");
        if title.is_empty() || raw.link.trim().is_empty() {
            return None;
        }
        let link = canonicalize_link(raw.link.trim());
        let domain = domain_of(&link);
        if domain.is_empty() {
            return None;
        }
        Some(Self {
            title,
            link,
            domain,
            published_at: raw.published_at.unwrap_or(fetched_at),
        })
    }

    /// URL-identity dedup key: normalized host plus canonical path.
    pub fn source_key(&self) -> String {
        url_key(&self.link)
    }

    /// Story-identity dedup key: normalized title paired with the domain.
    ///
    /// A homepage teaser and a section-page link to the same headline on the
    /// same site share this key even when their URLs differ.
    pub fn title_domain_key(&self) -> String {
        format!("{}|{}", normalize_title(&self.title), self.domain)
    }
}

/// The output unit for one country.
///
/// Built once per country per run and handed to the writer as-is.
#[derive(Debug, Clone)]
pub struct CountryFeed {
    /// Country key; also the output file stem.
    pub country: String,
    /// Selected items in presentation order.
    pub items: Vec<NewsItem>,
    /// When this feed was assembled.
    pub built_at: DateTime<Utc>,
}

impl CountryFeed {
    pub fn new(country: &str, items: Vec<NewsItem>) -> Self {
        Self {
            country: country.to_string(),
            items,
            built_at: Utc::now(),
        }
    }

    /// An empty feed, written when a country's pipeline fails outright.
    pub fn empty(country: &str) -> Self {
        Self::new(country, Vec::new())
    }
}

/// Seen-set over both dedup keys.
///
/// Keys are checked in a fixed order (URL identity, then story identity) and
/// both are recorded before an item is admitted, so the first occurrence of
/// either identity wins.
#[derive(Debug, Default)]
pub struct DedupSet {
    urls: HashSet<String>,
    stories: HashSet<String>,
}

impl DedupSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `item` and return `true` if neither of its keys was seen before.
    pub fn admit(&mut self, item: &NewsItem) -> bool {
        let url = item.source_key();
        if self.urls.contains(&url) {
            return false;
        }
        let story = item.title_domain_key();
        if self.stories.contains(&story) {
            return false;
        }
        self.urls.insert(url);
        self.stories.insert(story);
        true
    }
}
