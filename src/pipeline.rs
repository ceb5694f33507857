//! One country's run: fetch → filter → aggregate → (widen) → mix, and the
//! loop that runs every country and writes its file.

use crate::aggregate::aggregate;
use crate::config::{CountryConfig, PipelineConfig, SourceConfig, SourceKind};
use crate::fetch::{FetchPlan, PageFetcher, fetch_candidates};
use crate::filter::{SourceRules, filter_candidates};
use crate::mixer::FairMixer;
use crate::models::{CountryFeed, NewsItem};
use crate::outputs::rss::FeedWriter;
use crate::utils::{panic_message, truncate_for_log};
use chrono::{DateTime, Duration, Utc};
use futures::FutureExt;
use futures::stream::{self, StreamExt};
use rand::Rng;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use tracing::{error, info, instrument, warn};

/// Per-source working size: never below 12 so small feeds still see enough
/// candidates to survive filtering.
pub fn soft_limit(limit: usize) -> usize {
    limit.max(12)
}

/// Start of a feed window `hours` long ending at `now`; the epoch when that
/// does not fit in a timestamp.
fn window_cutoff(now: DateTime<Utc>, hours: i64) -> DateTime<Utc> {
    Duration::try_hours(hours.max(0))
        .and_then(|window| now.checked_sub_signed(window))
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// Fetch and filter `sources` concurrently, keeping source order.
///
/// A source that fails, or whose rules do not build, contributes an empty list.
async fn collect_sources<F: PageFetcher>(
    config: &PipelineConfig,
    sources: &[SourceConfig],
    fetcher: &F,
    plan: &FetchPlan<'_>,
    blocked: &HashSet<String>,
) -> Vec<Vec<NewsItem>> {
    stream::iter(sources)
        .map(|source| async move {
            let default_quota = match source.kind() {
                SourceKind::Html => plan.soft_limit * 2,
                SourceKind::Feed => plan.soft_limit * 3,
            };
            let rules = match SourceRules::for_source(config, source, blocked, default_quota) {
                Ok(rules) => rules,
                Err(e) => {
                    warn!(url = %source.url, error = %e, "Bad source rules; skipping source");
                    return Vec::new();
                }
            };
            let raw = fetch_candidates(fetcher, source, plan).await;
            let raw_count = raw.len();
            let items = filter_candidates(raw, plan.fetched_at, &rules);
            info!(url = %source.url, raw = raw_count, kept = items.len(), "Filtered source");
            items
        })
        .buffered(config.parallel_fetches.max(1))
        .collect()
        .await
}

/// Build the feed for one country.
///
/// Never fails: unreachable sources count as empty and a small pool simply
/// produces a short feed. When the first pass comes up short, feed sources
/// are re-read with the widened window before mixing.
#[instrument(level = "info", skip_all, fields(country = %country.name, limit = country.limit))]
pub async fn build_country_feed<F: PageFetcher, R: Rng + ?Sized>(
    config: &PipelineConfig,
    country: &CountryConfig,
    fetcher: &F,
    blocked: &HashSet<String>,
    rng: &mut R,
) -> CountryFeed {
    let now = Utc::now();
    let plan = FetchPlan {
        fallback_selectors: &config.fallback_selectors,
        soft_limit: soft_limit(country.limit),
        cutoff: window_cutoff(now, config.feed_window_hours),
        fetched_at: now,
    };

    let per_source = collect_sources(config, &country.sources, fetcher, &plan, blocked).await;
    let mut pool = aggregate(per_source, blocked);
    info!(pool = pool.len(), "Aggregated pool");

    if pool.len() < country.limit {
        let feeds: Vec<SourceConfig> = country
            .sources
            .iter()
            .filter(|s| s.kind() == SourceKind::Feed)
            .cloned()
            .collect();
        if !feeds.is_empty() {
            info!(
                have = pool.len(),
                want = country.limit,
                hours = config.widened_window_hours,
                "Shortage; widening feed window"
            );
            let widened = FetchPlan {
                cutoff: window_cutoff(now, config.widened_window_hours),
                ..plan
            };
            let mut lists = vec![pool];
            lists.extend(collect_sources(config, &feeds, fetcher, &widened, blocked).await);
            pool = aggregate(lists, blocked);
            info!(pool = pool.len(), "Aggregated pool after widening");
        }
    }

    let outcome = FairMixer::new(country.limit, config.cap_floor).mix(&pool, rng);
    if outcome.items.len() < country.limit {
        warn!(
            selected = outcome.items.len(),
            want = country.limit,
            cap = outcome.cap,
            "Final shortage"
        );
    } else {
        info!(selected = outcome.items.len(), cap = outcome.cap, "Mixed feed");
    }

    CountryFeed::new(&country.name, outcome.items)
}

/// Counts for one run over the selected countries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub written: usize,
    /// Countries that crashed or whose file could not be written.
    pub failed: usize,
}

/// Build and write every country in turn.
///
/// A country whose pipeline panics is logged and written as an empty feed;
/// the remaining countries are unaffected.
pub async fn run_countries<F: PageFetcher, R: Rng + ?Sized>(
    config: &PipelineConfig,
    countries: &[&CountryConfig],
    fetcher: &F,
    writer: &FeedWriter<'_>,
    rng: &mut R,
) -> RunSummary {
    let blocked = config.blocked_set();
    let mut summary = RunSummary::default();

    for &country in countries {
        let run = build_country_feed(config, country, fetcher, &blocked, &mut *rng);
        let feed = match AssertUnwindSafe(run).catch_unwind().await {
            Ok(feed) => feed,
            Err(panic) => {
                error!(
                    country = %country.name,
                    panic = %truncate_for_log(&panic_message(&*panic), 300),
                    "Country pipeline crashed; writing empty feed"
                );
                summary.failed += 1;
                CountryFeed::empty(&country.name)
            }
        };

        match writer.write(&feed, country.limit).await {
            Ok(path) => {
                summary.written += 1;
                info!(country = %country.name, path = %path.display(), items = feed.items.len(), "Country done");
            }
            Err(e) => {
                summary.failed += 1;
                error!(country = %country.name, error = %e, "Failed to write feed");
            }
        }
    }
    summary
}
