//! Pipeline configuration: countries, sources, filter thresholds, writer metadata.
//!
//! Defaults carry the built-in country table so the binary runs with no
//! arguments. A YAML or JSON file passed with `--config` replaces any subset of
//! the fields; everything omitted keeps its default.

use crate::normalize::strip_www;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use url::Url;

/// How candidates are extracted from a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Homepage or section page scraped with CSS selectors.
    Html,
    /// RSS 2.0 or Atom document.
    Feed,
}

impl SourceKind {
    /// Guess the kind from the URL: `.xml` suffix, or `rss`/`feed` anywhere.
    pub fn infer(url: &str) -> Self {
        let lower = url.to_lowercase();
        if lower.ends_with(".xml") || lower.contains("rss") || lower.contains("feed") {
            SourceKind::Feed
        } else {
            SourceKind::Html
        }
    }
}

/// Which links a source may contribute, relative to the source URL itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceScope {
    /// Any host that is not blocked.
    #[default]
    Any,
    /// Only links on the source's own host, any path.
    SameHost,
    /// Only links on the source's host under the source's path.
    Section,
}

/// One configured origin for a country.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SourceConfig {
    pub url: String,
    /// Extraction strategy; inferred from `url` when omitted.
    #[serde(default)]
    pub kind: Option<SourceKind>,
    #[serde(default)]
    pub scope: SourceScope,
    /// Site-specific CSS selectors, tried before the global fallbacks.
    #[serde(default)]
    pub selectors: Vec<String>,
    /// Regex a link's path must match to be accepted.
    #[serde(default)]
    pub allowed_path: Option<String>,
    /// Per-source cap on filtered candidates.
    #[serde(default)]
    pub quota: Option<usize>,
}

impl SourceConfig {
    fn new(url: &str, scope: SourceScope, selectors: &[&str]) -> Self {
        Self {
            url: url.to_string(),
            kind: None,
            scope,
            selectors: selectors.iter().map(|s| s.to_string()).collect(),
            allowed_path: None,
            quota: None,
        }
    }

    pub fn kind(&self) -> SourceKind {
        self.kind.unwrap_or_else(|| SourceKind::infer(&self.url))
    }
}

fn default_limit() -> usize {
    10
}

/// One country: its output key, target feed size, and sources.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CountryConfig {
    pub name: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
    pub sources: Vec<SourceConfig>,
}

/// Static channel metadata for the rendered RSS document.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Channel title is `"{title_prefix} {Country}"`.
    pub title_prefix: String,
    pub link: String,
    pub description: String,
    pub generator: String,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            title_prefix: "Noticias".to_string(),
            link: "https://github.com/".to_string(),
            description: "Feed generado automáticamente".to_string(),
            generator: "headline_feeds".to_string(),
        }
    }
}

/// Writer-side padding for short feeds. Off unless configured.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PlaceholderConfig {
    pub enabled: bool,
    /// `{country}` is replaced with the display country name.
    pub title: String,
    pub link: String,
}

impl Default for PlaceholderConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            title: "No se encontraron más titulares recientes para {country}".to_string(),
            link: "https://example.com/".to_string(),
        }
    }
}

/// Everything one run needs, passed explicitly into each stage.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub output_dir: String,
    pub request_timeout_secs: u64,
    /// Retries after the first failed attempt.
    pub retries: usize,
    pub retry_base_delay_ms: u64,
    pub user_agent: String,
    /// Sources of one country fetched concurrently.
    pub parallel_fetches: usize,
    /// Titles shorter than this (in characters, after trimming) look like menu labels.
    pub min_title_len: usize,
    /// Per-domain cap the mixer tries first.
    pub cap_floor: usize,
    pub feed_window_hours: i64,
    /// Window used when a country comes up short on the first pass.
    pub widened_window_hours: i64,
    pub blocked_domains: Vec<String>,
    /// Path segments marking tag, author and category pages, matched whole
    /// (`tag` bans `/tag/x` and `/tag/`, not `/tagline`). Surrounding slashes are ignored.
    pub banned_path_segments: Vec<String>,
    /// Selectors tried on every HTML source after its own.
    pub fallback_selectors: Vec<String>,
    pub channel: ChannelConfig,
    pub placeholders: PlaceholderConfig,
    pub countries: Vec<CountryConfig>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        use SourceScope::{Any, SameHost};

        let countries = vec![
            CountryConfig {
                name: "venezuela".to_string(),
                limit: 10,
                sources: vec![
                    SourceConfig::new(
                        "https://www.elnacional.com/",
                        Any,
                        &["article h2 a", "h3 a", ".headline a", "h2 a[href]"],
                    ),
                    SourceConfig::new(
                        "https://talcualdigital.com/",
                        Any,
                        &["h2.entry-title a", "article h2 a", "div.post-title h2 a"],
                    ),
                    SourceConfig::new(
                        "https://efectococuyo.com/",
                        Any,
                        &["article h2 a", "h2 a[href*='/']"],
                    ),
                ],
            },
            CountryConfig {
                name: "panama".to_string(),
                limit: 10,
                sources: vec![
                    SourceConfig::new(
                        "https://www.prensa.com/",
                        SameHost,
                        &["h1 a[href]", "h2 a[href]", "article h2 a[href]", "a[href]"],
                    ),
                    SourceConfig::new(
                        "https://www.laestrella.com.pa/",
                        SameHost,
                        &["h1 a[href]", "h2 a[href]", "article h2 a[href]", "a[href]"],
                    ),
                ],
            },
            CountryConfig {
                name: "dominicana".to_string(),
                limit: 10,
                sources: vec![
                    SourceConfig::new("https://www.diariolibre.com/rss/portada.xml", Any, &[]),
                    SourceConfig::new(
                        "https://listindiario.com/",
                        Any,
                        &["h2 a[href]", "h3 a[href]", "article h2 a"],
                    ),
                    SourceConfig::new(
                        "https://www.elcaribe.com.do/",
                        Any,
                        &["h2 a[href]", "article h2 a", "a.post-title[href]"],
                    ),
                    SourceConfig::new(
                        "https://eldinero.com.do/",
                        Any,
                        &["h2 a[href]", "article h2 a", "a.post-title[href]"],
                    ),
                ],
            },
        ];

        Self {
            output_dir: "data".to_string(),
            request_timeout_secs: 25,
            retries: 2,
            retry_base_delay_ms: 1200,
            user_agent: "Mozilla/5.0 (compatible; HeadlineFeedsBot/0.1)".to_string(),
            parallel_fetches: 4,
            min_title_len: 20,
            cap_floor: 2,
            feed_window_hours: 24,
            widened_window_hours: 48,
            blocked_domains: vec!["bloomberg.com".to_string(), "bloomberglinea.com".to_string()],
            banned_path_segments: [
                "tag", "tags", "autor", "autores", "author", "etiquetas", "etiqueta", "categoria",
                "category",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            fallback_selectors: vec![
                "h1 a[href]".to_string(),
                "h2 a[href]".to_string(),
                "article h2 a".to_string(),
            ],
            channel: ChannelConfig::default(),
            placeholders: PlaceholderConfig::default(),
            countries,
        }
    }
}

/// Longest feed window accepted, one year.
const MAX_WINDOW_HOURS: i64 = 24 * 365;

/// Problems that stop a run before any country is processed.
#[derive(Debug)]
pub enum ConfigError {
    Io { path: String, source: std::io::Error },
    Parse { path: String, message: String },
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => write!(f, "cannot read config {path}: {source}"),
            ConfigError::Parse { path, message } => write!(f, "cannot parse config {path}: {message}"),
            ConfigError::Invalid(msg) => write!(f, "invalid config: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl PipelineConfig {
    /// Load a config file; `.json` is read as JSON, anything else as YAML.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let display = path.display().to_string();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: display.clone(),
            source,
        })?;
        let is_json = path
            .extension()
            .and_then(|s| s.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let parsed = if is_json {
            serde_json::from_str(&content).map_err(|e| e.to_string())
        } else {
            serde_yaml::from_str(&content).map_err(|e| e.to_string())
        };
        parsed.map_err(|message| ConfigError::Parse {
            path: display,
            message,
        })
    }

    /// Reject configurations that would make every run degenerate.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cap_floor == 0 {
            return Err(ConfigError::Invalid("cap_floor must be at least 1".into()));
        }
        if self.parallel_fetches == 0 {
            return Err(ConfigError::Invalid("parallel_fetches must be at least 1".into()));
        }
        for (name, hours) in [
            ("feed_window_hours", self.feed_window_hours),
            ("widened_window_hours", self.widened_window_hours),
        ] {
            if !(1..=MAX_WINDOW_HOURS).contains(&hours) {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be between 1 and {MAX_WINDOW_HOURS}, got {hours}"
                )));
            }
        }
        if self.widened_window_hours < self.feed_window_hours {
            return Err(ConfigError::Invalid(
                "widened_window_hours must not be shorter than feed_window_hours".into(),
            ));
        }

        let mut names = HashSet::new();
        for country in &self.countries {
            let name = country.name.trim();
            if name.is_empty() || name.contains(['/', '\\']) {
                return Err(ConfigError::Invalid(format!(
                    "country name {:?} is not usable as a file name",
                    country.name
                )));
            }
            if !names.insert(name.to_lowercase()) {
                return Err(ConfigError::Invalid(format!("duplicate country {name}")));
            }
            for source in &country.sources {
                Url::parse(&source.url).map_err(|e| {
                    ConfigError::Invalid(format!("{name}: bad source url {}: {e}", source.url))
                })?;
                if let Some(pattern) = &source.allowed_path {
                    Regex::new(pattern).map_err(|e| {
                        ConfigError::Invalid(format!("{name}: bad allowed_path for {}: {e}", source.url))
                    })?;
                }
            }
        }
        Ok(())
    }

    /// Blocked domains normalized the same way item domains are.
    pub fn blocked_set(&self) -> HashSet<String> {
        self.blocked_domains
            .iter()
            .map(|d| strip_www(&d.trim().to_lowercase()).to_string())
            .filter(|d| !d.is_empty())
            .collect()
    }

    /// Countries to run: all of them, or only those named (case-insensitive).
    pub fn select_countries(&self, only: &[String]) -> Result<Vec<&CountryConfig>, ConfigError> {
        if only.is_empty() {
            return Ok(self.countries.iter().collect());
        }
        only.iter()
            .map(|wanted| {
                self.countries
                    .iter()
                    .find(|c| c.name.eq_ignore_ascii_case(wanted))
                    .ok_or_else(|| ConfigError::Invalid(format!("unknown country {wanted}")))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = PipelineConfig::default();
        config.validate().unwrap();
        assert_eq!(config.countries.len(), 3);
        assert_eq!(config.cap_floor, 2);
        assert!(config.countries.iter().all(|c| c.limit == 10));
    }

    #[test]
    fn test_source_kind_inference() {
        assert_eq!(SourceKind::infer("https://www.diariolibre.com/rss/portada.xml"), SourceKind::Feed);
        assert_eq!(SourceKind::infer("https://site.com/feed/"), SourceKind::Feed);
        assert_eq!(SourceKind::infer("https://listindiario.com/"), SourceKind::Html);

        let mut source = SourceConfig::new("https://site.com/feed/", SourceScope::Any, &[]);
        source.kind = Some(SourceKind::Html);
        assert_eq!(source.kind(), SourceKind::Html);
    }

    #[test]
    fn test_yaml_overrides_keep_defaults() {
        let yaml = r#"
min_title_len: 12
countries:
  - name: panama
    sources:
      - url: https://www.prensa.com/politica/
        scope: section
        quota: 5
"#;
        let config: PipelineConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.min_title_len, 12);
        assert_eq!(config.cap_floor, 2);
        assert_eq!(config.countries.len(), 1);
        let country = &config.countries[0];
        assert_eq!(country.limit, 10);
        assert_eq!(country.sources[0].scope, SourceScope::Section);
        assert_eq!(country.sources[0].quota, Some(5));
        assert_eq!(config.channel.title_prefix, "Noticias");
    }

    #[test]
    fn test_load_json_file() {
        let path = std::env::temp_dir().join(format!("headline_feeds_cfg_{}.json", std::process::id()));
        std::fs::write(&path, r#"{"cap_floor": 3, "countries": []}"#).unwrap();
        let config = PipelineConfig::load(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!(config.cap_floor, 3);
        assert!(config.countries.is_empty());
    }

    #[test]
    fn test_load_reports_missing_file() {
        let err = PipelineConfig::load(Path::new("/definitely/not/here.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_validate_bounds_feed_windows() {
        for (feed, widened) in [(0, 48), (-24, 48), (24, i64::MAX), (i64::MIN, 48), (24, 24 * 366)] {
            let mut config = PipelineConfig::default();
            config.feed_window_hours = feed;
            config.widened_window_hours = widened;
            let err = config.validate().unwrap_err();
            assert!(err.to_string().contains("window_hours"), "{feed}/{widened}: {err}");
        }

        let mut config = PipelineConfig::default();
        config.feed_window_hours = 24 * 365;
        config.widened_window_hours = 24 * 365;
        config.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_bad_configs() {
        let mut config = PipelineConfig::default();
        config.cap_floor = 0;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.countries[1].name = "Venezuela".to_string();
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.countries[0].sources[0].allowed_path = Some("([".to_string());
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.countries[0].name = "../etc".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_blocked_set_normalized() {
        let mut config = PipelineConfig::default();
        config.blocked_domains = vec!["WWW.Bloomberg.com ".to_string(), "".to_string()];
        let blocked = config.blocked_set();
        assert_eq!(blocked.len(), 1);
        assert!(blocked.contains("bloomberg.com"));
    }

    #[test]
    fn test_select_countries() {
        let config = PipelineConfig::default();
        assert_eq!(config.select_countries(&[]).unwrap().len(), 3);
        let picked = config.select_countries(&["PANAMA".to_string()]).unwrap();
        assert_eq!(picked[0].name, "panama");
        assert!(config.select_countries(&["chile".to_string()]).is_err());
    }
}
