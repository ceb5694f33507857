//! RSS 2.0 and Atom parsing for syndication-feed sources.

use crate::models::RawCandidate;
use chrono::{DateTime, Utc};
use quick_xml::de::from_str;
use serde::Deserialize;
use url::Url;

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    items: Vec<RssItem>,
}

#[derive(Debug, Deserialize)]
struct RssItem {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomFeed {
    #[serde(rename = "entry", default)]
    entries: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    title: Option<String>,
    #[serde(rename = "link", default)]
    links: Vec<AtomLink>,
    published: Option<String>,
    updated: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@href")]
    href: Option<String>,
    #[serde(rename = "@rel")]
    rel: Option<String>,
}

impl AtomEntry {
    /// The `alternate` link, or the first link with no `rel`.
    fn link(&self) -> Option<&str> {
        self.links
            .iter()
            .find(|l| l.rel.as_deref().is_none_or(|rel| rel == "alternate"))
            .and_then(|l| l.href.as_deref())
    }
}

/// Parse an RFC 2822 (`pubDate`) or RFC 3339 (`published`/`updated`) timestamp.
pub fn parse_feed_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc2822(raw)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn absolutize(base: &Url, link: &str) -> String {
    base.join(link.trim())
        .map(String::from)
        .unwrap_or_else(|_| link.trim().to_string())
}

/// Whether the document root is an Atom `<feed>` rather than an RSS `<rss>`.
fn is_atom(xml: &str) -> bool {
    match (xml.find("<feed"), xml.find("<rss")) {
        (Some(feed), Some(rss)) => feed < rss,
        (Some(_), None) => true,
        _ => false,
    }
}

fn rss_candidates(xml: &str, base: &Url, max_entries: usize) -> Result<Vec<RawCandidate>, quick_xml::DeError> {
    let rss = from_str::<Rss>(xml)?;
    Ok(rss
        .channel
        .items
        .into_iter()
        .take(max_entries)
        .filter_map(|item| {
            let title = item.title.filter(|t| !t.trim().is_empty())?;
            let link = item.link.filter(|l| !l.trim().is_empty())?;
            Some(RawCandidate {
                title: title.trim().to_string(),
                link: absolutize(base, &link),
                published_at: item.pub_date.as_deref().and_then(parse_feed_date),
            })
        })
        .collect())
}

fn atom_candidates(xml: &str, base: &Url, max_entries: usize) -> Result<Vec<RawCandidate>, quick_xml::DeError> {
    let atom = from_str::<AtomFeed>(xml)?;
    Ok(atom
        .entries
        .into_iter()
        .take(max_entries)
        .filter_map(|entry| {
            let link = entry.link().filter(|l| !l.trim().is_empty())?.to_string();
            let title = entry.title.as_deref().map(str::trim).filter(|t| !t.is_empty())?.to_string();
            let published_at = entry
                .published
                .as_deref()
                .or(entry.updated.as_deref())
                .and_then(parse_feed_date);
            Some(RawCandidate {
                title,
                link: absolutize(base, &link),
                published_at,
            })
        })
        .collect())
}

/// Parse the first `max_entries` entries of an RSS or Atom document.
///
/// The format follows the root element. Entries without a title or link are
/// dropped; relative links resolve against `base`. Repeated elements need not
/// be adjacent (`<image>` between RSS items, several `<link>`s per Atom entry
/// with other elements in between).
pub fn parse_feed(xml: &str, base: &Url, max_entries: usize) -> Result<Vec<RawCandidate>, quick_xml::DeError> {
    if is_atom(xml) {
        atom_candidates(xml, base, max_entries)
    } else {
        rss_candidates(xml, base, max_entries)
    }
}
