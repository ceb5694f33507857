//! Command-line interface definitions for Headline Feeds.
//!
//! Every argument is optional; with none the binary builds all configured
//! countries into the configured output directory.

use clap::Parser;

/// Command-line arguments.
///
/// # Examples
///
/// ```sh
/// # All countries, built-in sources, ./data
/// headline_feeds
///
/// # Custom config, one country, reproducible mix
/// headline_feeds -c feeds.yaml --country panama --seed 7
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Output directory for the per-country RSS files (overrides the config file)
    #[arg(short, long, env = "HEADLINE_FEEDS_OUTPUT_DIR")]
    pub output_dir: Option<String>,

    /// Optional path to a YAML or JSON config file
    #[arg(short, long, env = "HEADLINE_FEEDS_CONFIG")]
    pub config: Option<String>,

    /// Only build this country (repeatable)
    #[arg(long = "country", value_name = "NAME")]
    pub countries: Vec<String>,

    /// Seed for the mixer's domain shuffle
    #[arg(long)]
    pub seed: Option<u64>,
}
