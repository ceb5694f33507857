//! Link and title canonicalization used to build stable dedup keys.
//!
//! Every function here fails open: a malformed URL is handed back unchanged
//! (or yields an empty domain) instead of raising, so a single bad link never
//! aborts a source.

use once_cell::sync::Lazy;
use regex::Regex;
use url::{Position, Url};

/// Live/breaking markers stripped from the start of a title before keying.
static LIVE_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^\s*(?:live|update|breaking|en vivo|[uú]ltima hora|actualizaci[oó]n|urgente)\b\s*[:\-–—|]*\s*",
    )
    .unwrap()
});

/// Query parameters that only carry campaign tracking.
fn is_tracking_param(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    key.starts_with("utm") || key == "gclid" || key == "fbclid"
}

/// Whether a scheme-less link starts with something shaped like a hostname.
fn looks_like_host(raw: &str) -> bool {
    let host = raw.split(['/', '?', '#']).next().unwrap_or_default();
    let host = host.split(':').next().unwrap_or_default();
    !host.is_empty()
        && !host.contains(char::is_whitespace)
        && (host.contains('.') || host.eq_ignore_ascii_case("localhost"))
}

/// Parse a link, defaulting to `https` when the scheme is missing.
fn parse_lenient(raw: &str) -> Option<Url> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Some(rest) = raw.strip_prefix("//") {
        return Url::parse(&format!("https://{rest}")).ok();
    }
    let url = match Url::parse(raw) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) if looks_like_host(raw) => {
            Url::parse(&format!("https://{raw}")).ok()?
        }
        Err(_) => return None,
    };
    if matches!(url.scheme(), "http" | "https") && url.host_str().is_some() {
        Some(url)
    } else {
        None
    }
}

/// Strip a leading `www.` from an already-lowercased host.
pub fn strip_www(host: &str) -> &str {
    host.strip_prefix("www.").unwrap_or(host)
}

/// Canonicalize a link for storage and comparison.
///
/// Drops tracking query parameters (`utm*`, `gclid`, `fbclid`) and the
/// fragment, lowercases the host, strips trailing slashes from the path and
/// fills in `https` when no scheme is given. Idempotent. Unparseable input is
/// returned unchanged.
pub fn canonicalize_link(raw: &str) -> String {
    let Some(url) = parse_lenient(raw) else {
        return raw.to_string();
    };

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !is_tracking_param(k))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let mut out = url[..Position::BeforePath].to_string();
    out.push_str(url.path().trim_end_matches('/'));
    if !kept.is_empty() {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(kept)
            .finish();
        out.push('?');
        out.push_str(&query);
    }
    out
}

/// Normalized host of a link: lowercased, `www.` stripped.
///
/// Returns an empty string when no host can be recovered.
pub fn domain_of(raw: &str) -> String {
    parse_lenient(raw)
        .and_then(|url| url.host_str().map(|h| strip_www(&h.to_lowercase()).to_string()))
        .unwrap_or_default()
}

/// URL-identity key: normalized host followed by the canonical path.
///
/// Query strings are deliberately left out; two links that differ only by a
/// non-tracking parameter still count as the same page.
pub fn url_key(raw: &str) -> String {
    match parse_lenient(&canonicalize_link(raw)) {
        Some(url) => {
            let host = url.host_str().unwrap_or_default().to_lowercase();
            format!("{}{}", strip_www(&host), url.path().trim_end_matches('/'))
        }
        None => raw.to_string(),
    }
}

/// Title as used for keying only, never for display.
///
/// Removes one leading live/breaking marker ("LIVE", "BREAKING", "EN VIVO",
/// "ÚLTIMA HORA", ...) with its separator, collapses whitespace, lowercases.
pub fn normalize_title(title: &str) -> String {
    let stripped = LIVE_PREFIX.replace(title, "");
    stripped
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINKS: &[&str] = &[
        "https://www.prensa.com/politica/nota/",
        "https://WWW.Prensa.COM/politica/nota//?utm_source=tw&utm_MEDIUM=x&id=7",
        "http://listindiario.com/a?gclid=1&fbclid=2",
        "//efectococuyo.com/economia/",
        "eldinero.com.do/finanzas/bolsa",
        "https://talcualdigital.com/?q=a b&UTM_campaign=z#comments",
        "https://diariolibre.com",
        "https://user@elcaribe.com.do:8443/x/",
        "not a url",
        "",
        "javascript:void(0)",
    ];

    #[test]
    fn test_canonicalize_is_idempotent() {
        for link in LINKS {
            let once = canonicalize_link(link);
            assert_eq!(canonicalize_link(&once), once, "not idempotent for {link:?}");
        }
    }

    #[test]
    fn test_canonicalize_strips_tracking_params() {
        assert_eq!(
            canonicalize_link("https://WWW.Prensa.COM/politica/nota/?utm_source=tw&UTM_medium=x&id=7"),
            "https://www.prensa.com/politica/nota?id=7"
        );
        assert_eq!(
            canonicalize_link("http://listindiario.com/a?gclid=1&fbclid=2"),
            "http://listindiario.com/a"
        );
    }

    #[test]
    fn test_canonicalize_drops_fragment_and_trailing_slash() {
        assert_eq!(
            canonicalize_link("https://efectococuyo.com/economia/#top"),
            "https://efectococuyo.com/economia"
        );
        assert_eq!(canonicalize_link("https://diariolibre.com/"), "https://diariolibre.com");
    }

    #[test]
    fn test_canonicalize_defaults_scheme() {
        assert_eq!(
            canonicalize_link("//efectococuyo.com/economia/"),
            "https://efectococuyo.com/economia"
        );
        assert_eq!(
            canonicalize_link("eldinero.com.do/finanzas"),
            "https://eldinero.com.do/finanzas"
        );
        assert_eq!(
            canonicalize_link("http://eldinero.com.do/finanzas"),
            "http://eldinero.com.do/finanzas"
        );
    }

    #[test]
    fn test_canonicalize_fails_open() {
        assert_eq!(canonicalize_link("not a url"), "not a url");
        assert_eq!(canonicalize_link("javascript:void(0)"), "javascript:void(0)");
        assert_eq!(canonicalize_link(""), "");
        assert_eq!(canonicalize_link("nonsense"), "nonsense");
        assert_eq!(canonicalize_link("seccion/politica"), "seccion/politica");
    }

    #[test]
    fn test_domain_of() {
        assert_eq!(domain_of("https://WWW.ElNacional.com/venezuela/"), "elnacional.com");
        assert_eq!(domain_of("https://www.laestrella.com.pa/"), "laestrella.com.pa");
        assert_eq!(domain_of("https://listindiario.com/x"), "listindiario.com");
        assert_eq!(domain_of("mailto:someone@example.com"), "");
        assert_eq!(domain_of("nonsense"), "");
        assert_eq!(domain_of("ultimas-noticias/hoy"), "");
        assert_eq!(domain_of("localhost/feed"), "localhost");
        assert_eq!(domain_of("WWW.Panamaamerica.com.pa/nacion"), "panamaamerica.com.pa");
    }

    #[test]
    fn test_url_key_ignores_www_scheme_and_query() {
        assert_eq!(
            url_key("https://www.prensa.com/politica/nota/?utm_source=x"),
            "prensa.com/politica/nota"
        );
        assert_eq!(url_key("http://prensa.com/politica/nota?page=2"), "prensa.com/politica/nota");
        assert_eq!(url_key("not a url"), "not a url");
    }

    #[test]
    fn test_normalize_title_prefixes() {
        assert_eq!(normalize_title("LIVE: Markets   Rally"), "markets rally");
        assert_eq!(normalize_title("BREAKING - Storm hits coast"), "storm hits coast");
        assert_eq!(normalize_title("EN VIVO | Sesión  de la Asamblea"), "sesión de la asamblea");
        assert_eq!(normalize_title("Última hora: Sismo en Caracas"), "sismo en caracas");
        assert_eq!(normalize_title("ULTIMA HORA Sismo en Caracas"), "sismo en caracas");
        assert_eq!(normalize_title("  Plain   headline "), "plain headline");
    }

    #[test]
    fn test_normalize_title_only_strips_leading_marker() {
        assert_eq!(normalize_title("Lively debate in congress"), "lively debate in congress");
        assert_eq!(normalize_title("Court rules LIVE broadcast legal"), "court rules live broadcast legal");
    }
}
