//! Output generation for country feeds.
//!
//! # Submodules
//!
//! - [`rss`]: Renders a `CountryFeed` as RSS 2.0 and writes `<country>.xml`

pub mod rss;
