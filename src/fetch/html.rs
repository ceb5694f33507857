//! Headline extraction from homepage and section-page HTML.
//!
//! Selectors are tried in order: the site's own, then the global fallbacks.
//! A selector may match an anchor directly or a container (`h2`, `article`)
//! whose first `a[href]` descendant supplies the link.

use crate::models::RawCandidate;
use crate::normalize::url_key;
use itertools::Itertools;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use tracing::{debug, warn};
use url::Url;

static ANCHOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());

/// Resolve `href` against the page URL; protocol-relative links get `https`.
///
/// Fragment-only, `javascript:` and `mailto:` links are not headlines.
fn resolve(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    let lower = href.to_ascii_lowercase();
    if href.is_empty()
        || href.starts_with('#')
        || lower.starts_with("javascript:")
        || lower.starts_with("mailto:")
    {
        return None;
    }
    if let Some(rest) = href.strip_prefix("//") {
        return Some(format!("https://{rest}"));
    }
    base.join(href).ok().map(String::from)
}

/// Link target and visible text of a matched element.
fn anchor_of(element: ElementRef<'_>) -> Option<(String, String)> {
    let mut text = element.text().flat_map(str::split_whitespace).join(" ");
    let href = match element.value().attr("href") {
        Some(href) => href.to_string(),
        None => {
            let inner = element.select(&ANCHOR).next()?;
            if text.is_empty() {
                text = inner.text().flat_map(str::split_whitespace).join(" ");
            }
            inner.value().attr("href")?.to_string()
        }
    };
    if text.is_empty() {
        return None;
    }
    Some((href, text))
}

/// Pull up to `max` candidates out of `body`.
///
/// Candidates are unique by URL key within the page; invalid selectors are
/// logged and skipped. Publication time is left unset.
pub fn extract_candidates<'s>(
    body: &str,
    base: &Url,
    selectors: impl IntoIterator<Item = &'s str>,
    max: usize,
) -> Vec<RawCandidate> {
    let document = Html::parse_document(body);
    let mut seen: HashSet<String> = HashSet::new();
    let mut out = Vec::new();

    for raw_selector in selectors {
        if out.len() >= max {
            break;
        }
        let selector = match Selector::parse(raw_selector) {
            Ok(selector) => selector,
            Err(e) => {
                warn!(selector = raw_selector, error = %e, "Skipping invalid selector");
                continue;
            }
        };

        let mut hits = 0usize;
        for element in document.select(&selector) {
            let Some((href, title)) = anchor_of(element) else {
                continue;
            };
            let Some(link) = resolve(base, &href) else {
                continue;
            };
            if !seen.insert(url_key(&link)) {
                continue;
            }
            out.push(RawCandidate {
                title,
                link,
                published_at: None,
            });
            hits += 1;
            if out.len() >= max {
                break;
            }
        }
        debug!(host = base.host_str().unwrap_or_default(), selector = raw_selector, hits, "Selector matched");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r##"
        <html><body>
          <nav><a href="/seccion/politica">Política</a></nav>
          <article>
            <h2><a href="/politica/2025/05/reforma-electoral/">Asamblea   aprueba
              <b>reforma</b> electoral</a></h2>
          </article>
          <article>
            <h2 class="entry-title"><span>Sin enlace directo</span><a href="https://talcualdigital.com/economia/dolar?utm_source=home">Dólar oficial sube</a></h2>
          </article>
          <h2><a href="//efectococuyo.com/salud/vacunas">Jornada de vacunación</a></h2>
          <h2><a href="#top">Volver arriba</a></h2>
          <h2><a href="javascript:void(0)">Cargar más</a></h2>
          <h3><a href="/politica/2025/05/reforma-electoral">Asamblea aprueba reforma (duplicado)</a></h3>
        </body></html>
    "##;

    fn base() -> Url {
        Url::parse("https://talcualdigital.com/").unwrap()
    }

    #[test]
    fn test_extracts_and_resolves_links() {
        let out = extract_candidates(PAGE, &base(), ["h2 a[href]", "h3 a[href]"], 50);
        let links: Vec<&str> = out.iter().map(|c| c.link.as_str()).collect();
        assert_eq!(
            links,
            vec![
                "https://talcualdigital.com/politica/2025/05/reforma-electoral/",
                "https://talcualdigital.com/economia/dolar?utm_source=home",
                "https://efectococuyo.com/salud/vacunas",
            ]
        );
        assert_eq!(out[0].title, "Asamblea aprueba reforma electoral");
        assert!(out.iter().all(|c| c.published_at.is_none()));
    }

    #[test]
    fn test_container_selector_uses_inner_anchor() {
        let out = extract_candidates(PAGE, &base(), ["h2.entry-title"], 50);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].link, "https://talcualdigital.com/economia/dolar?utm_source=home");
        assert_eq!(out[0].title, "Sin enlace directo Dólar oficial sube");
    }

    #[test]
    fn test_max_and_invalid_selectors() {
        let out = extract_candidates(PAGE, &base(), ["h2 a[", "article h2 a", "h2 a[href]"], 2);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_resolve_rules() {
        let base = base();
        assert_eq!(resolve(&base, "/a/b").as_deref(), Some("https://talcualdigital.com/a/b"));
        assert_eq!(resolve(&base, "//cdn.site.com/x").as_deref(), Some("https://cdn.site.com/x"));
        assert_eq!(resolve(&base, "#comments"), None);
        assert_eq!(resolve(&base, "MAILTO:x@y.com"), None);
        assert_eq!(resolve(&base, ""), None);
    }
}
