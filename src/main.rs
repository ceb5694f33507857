//! # Headline Feeds
//!
//! A batch job that collects news headlines from national news-site homepages,
//! section pages and syndication feeds, deduplicates and mixes them for source
//! diversity, and writes one small RSS 2.0 file per country.
//!
//! ## Usage
//!
//! ```sh
//! headline_feeds                 # every configured country into ./data
//! headline_feeds -o ./public     # different output directory
//! headline_feeds -c feeds.yaml   # custom country/source table
//! ```
//!
//! ## Architecture
//!
//! Each country runs the same pipeline, independently:
//! 1. **Fetching**: Download every source concurrently (HTML or RSS/Atom)
//! 2. **Filtering**: Validate candidates, apply per-source rules, dedupe
//! 3. **Aggregation**: Merge sources, dedupe across them, widen feeds on shortage
//! 4. **Mixing**: Round-robin by domain under the smallest cap that fills the feed
//! 5. **Output**: Render RSS and replace `<country>.xml`
//!
//! A country that fails still gets a (possibly empty) file; the others
//! carry on.

use clap::Parser;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::error::Error;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod aggregate;
mod cli;
mod config;
mod fetch;
mod filter;
mod mixer;
mod models;
mod normalize;
mod outputs;
mod pipeline;
mod utils;

use cli::Cli;
use config::PipelineConfig;
use outputs::rss::FeedWriter;
use pipeline::{RunSummary, run_countries};
use utils::ensure_writable_dir;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("headline_feeds starting up");

    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    // ---- Configuration ----
    let mut config = match &args.config {
        Some(path) => {
            let config = PipelineConfig::load(Path::new(path))?;
            info!(%path, "Loaded configuration");
            config
        }
        None => PipelineConfig::default(),
    };
    if let Some(dir) = &args.output_dir {
        config.output_dir = dir.clone();
    }
    config.validate()?;
    let countries = config.select_countries(&args.countries)?;

    let output_dir = PathBuf::from(&config.output_dir);
    if let Err(e) = ensure_writable_dir(&output_dir).await {
        error!(
            path = %output_dir.display(),
            error = %e,
            "Output directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }

    let fetcher = fetch::http_fetcher(&config)?;
    let writer = FeedWriter::new(&config, &output_dir);
    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    // ---- One country at a time; failures stay inside their country ----
    let RunSummary { written, failed } = run_countries(&config, &countries, &fetcher, &writer, &mut rng).await;

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        written,
        failed,
        "Execution complete"
    );

    Ok(())
}
