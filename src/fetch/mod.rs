//! Candidate fetching: HTTP with retry and backoff, plus per-kind extraction.
//!
//! # Architecture
//!
//! - [`PageFetcher`]: Core trait returning a page body for a URL
//! - [`HttpFetcher`]: `reqwest` implementation (user agent, timeout, status check)
//! - [`RetryFetch`]: Decorator adding bounded exponential backoff to any fetcher
//! - [`fetch_candidates`]: Fetch one source and run the matching extractor
//!
//! Extraction strategies live in [`html`] (CSS selectors) and [`feed`]
//! (RSS/Atom). A source that cannot be fetched or parsed yields no candidates;
//! the failure is logged and never propagated.

pub mod feed;
pub mod html;

use crate::config::{PipelineConfig, SourceConfig, SourceKind};
use crate::models::RawCandidate;
use chrono::{DateTime, Utc};
use rand::{Rng, rng};
use std::error::Error;
use std::fmt;
use std::time::{Duration as StdDuration, Instant};
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};
use url::Url;

/// Trait for anything that can hand back a page body.
///
/// Used only through generics inside this crate, so the returned futures need
/// no `Send` bound.
#[allow(async_fn_in_trait)]
pub trait PageFetcher {
    /// Fetch `url` and return its decoded body.
    async fn fetch_page(&self, url: &str) -> Result<String, Box<dyn Error>>;
}

/// Plain HTTP fetcher on a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(config: &PipelineConfig) -> Result<Self, Box<dyn Error>> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(StdDuration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self { client })
    }
}

impl PageFetcher for HttpFetcher {
    #[instrument(level = "debug", skip(self))]
    async fn fetch_page(&self, url: &str) -> Result<String, Box<dyn Error>> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.text().await?)
    }
}

/// Wrapper that adds exponential backoff retry logic to any [`PageFetcher`].
///
/// # Backoff Strategy
///
/// ```text
/// delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..250ms)
/// ```
pub struct RetryFetch<T> {
    inner: T,
    /// Retries after the first failed attempt.
    max_retries: usize,
    base_delay: StdDuration,
    max_delay: StdDuration,
}

impl<T> RetryFetch<T>
where
    T: PageFetcher,
{
    pub fn new(inner: T, max_retries: usize, base_delay: StdDuration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: StdDuration::from_secs(10),
        }
    }
}

impl<T> fmt::Debug for RetryFetch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryFetch")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

impl<T> PageFetcher for RetryFetch<T>
where
    T: PageFetcher,
{
    #[instrument(level = "debug", skip(self))]
    async fn fetch_page(&self, url: &str) -> Result<String, Box<dyn Error>> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            match self.inner.fetch_page(url).await {
                Ok(body) => return Ok(body),
                Err(e) => {
                    attempt += 1;
                    let total_dt = total_t0.elapsed();

                    if attempt > self.max_retries {
                        error!(
                            %url,
                            attempt,
                            max = self.max_retries,
                            elapsed_ms_total = total_dt.as_millis() as u64,
                            error = %e,
                            "GET exhausted retries"
                        );
                        return Err(e);
                    }

                    let factor = 1u32.checked_shl((attempt - 1) as u32).unwrap_or(u32::MAX);
                    let mut delay = self.base_delay.saturating_mul(factor);
                    if delay > self.max_delay {
                        delay = self.max_delay;
                    }
                    let jitter_ms: u64 = rng().random_range(0..=250);
                    let delay = delay + StdDuration::from_millis(jitter_ms);

                    warn!(
                        %url,
                        attempt,
                        max = self.max_retries,
                        ?delay,
                        error = %e,
                        "GET failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

/// The fetcher a real run uses: HTTP behind the configured retry policy.
pub fn http_fetcher(config: &PipelineConfig) -> Result<RetryFetch<HttpFetcher>, Box<dyn Error>> {
    Ok(RetryFetch::new(
        HttpFetcher::new(config)?,
        config.retries,
        StdDuration::from_millis(config.retry_base_delay_ms),
    ))
}

/// Per-pass extraction settings shared by every source of a country.
#[derive(Debug, Clone, Copy)]
pub struct FetchPlan<'a> {
    pub fallback_selectors: &'a [String],
    /// `max(limit, 12)`; HTML stops at 4x, feeds read at most 8x entries.
    pub soft_limit: usize,
    /// Feed entries published before this are dropped.
    pub cutoff: DateTime<Utc>,
    /// Stand-in publication time for undated entries.
    pub fetched_at: DateTime<Utc>,
}

/// Fetch one source and extract its raw candidates.
///
/// Never fails: fetch and parse errors are logged and produce an empty list.
/// Feed candidates come back inside the window, newest first; HTML
/// candidates keep page order.
#[instrument(level = "info", skip_all, fields(url = %source.url))]
pub async fn fetch_candidates<F: PageFetcher>(
    fetcher: &F,
    source: &SourceConfig,
    plan: &FetchPlan<'_>,
) -> Vec<RawCandidate> {
    let base = match Url::parse(&source.url) {
        Ok(base) => base,
        Err(e) => {
            warn!(error = %e, "Source URL does not parse; skipping");
            return Vec::new();
        }
    };
    let body = match fetcher.fetch_page(&source.url).await {
        Ok(body) => body,
        Err(e) => {
            warn!(error = %e, "No content for source");
            return Vec::new();
        }
    };

    let candidates = match source.kind() {
        SourceKind::Html => {
            let selectors = source
                .selectors
                .iter()
                .chain(plan.fallback_selectors)
                .map(String::as_str);
            html::extract_candidates(&body, &base, selectors, plan.soft_limit * 4)
        }
        SourceKind::Feed => match feed::parse_feed(&body, &base, plan.soft_limit * 8) {
            Ok(entries) => {
                let total = entries.len();
                let mut kept: Vec<RawCandidate> = entries
                    .into_iter()
                    .filter(|c| c.published_at.unwrap_or(plan.fetched_at) >= plan.cutoff)
                    .collect();
                kept.sort_by(|a, b| {
                    b.published_at
                        .unwrap_or(plan.fetched_at)
                        .cmp(&a.published_at.unwrap_or(plan.fetched_at))
                });
                info!(total, in_window = kept.len(), cutoff = %plan.cutoff, "Parsed feed");
                kept
            }
            Err(e) => {
                warn!(error = %e, "Feed did not parse");
                Vec::new()
            }
        },
    };

    info!(count = candidates.len(), kind = ?source.kind(), "Collected candidates");
    candidates
}
