//! # News Feed Scraper
//!
//! A batch job that polls Google News RSS searches, decodes the wrapper
//! links Google News puts around each story, scrapes every article it has
//! not seen before, and publishes the result as a JSON store plus an RSS 2.0
//! feed.
//!
//! ## Usage
//!
//! ```sh
//! news_feed_scraper -q gadwal -l 30 -o ./out
//! ```
//!
//! ## Architecture
//!
//! Each invocation runs one linear pipeline:
//! 1. **State**: Load the article store and the processed-link history
//! 2. **Feeds**: Fetch the feeds and keep the `N` most recent entries
//! 3. **Novelty**: Drop entries whose title or link was already seen
//! 4. **Decoding**: Resolve Google News wrapper links to publisher URLs
//! 5. **Scraping**: Download and parse each article
//! 6. **Output**: Merge, sort, cap and write JSON, RSS and the link history
//!
//! Re-running is idempotent: a story is scraped at most once.

use clap::Parser;
use std::error::Error;
use std::time::Duration as StdDuration;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod api;
mod cli;
mod config;
mod error;
mod models;
mod novelty;
mod outputs;
mod pipeline;
mod scrapers;
mod store;
mod utils;

use api::Retrying;
use cli::Cli;
use config::Config;
use pipeline::FailureKind;
use scrapers::article::HttpArticleExtractor;
use scrapers::decoder::GoogleNewsDecoder;
use scrapers::google_news::GoogleNewsFeed;
use utils::{ensure_writable_dir, truncate_for_log};

#[tokio::main(flavor = "current_thread")]
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
    info!("news_feed_scraper starting up");

    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    let config = match Config::load(&args) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return Err(e.into());
        }
    };
    info!(
        feeds = ?config.feed_urls(),
        limit = config.limit,
        output_dir = %config.output_dir,
        "Configuration loaded"
    );

    if let Err(e) = ensure_writable_dir(&config.output_dir).await {
        error!(
            path = %config.output_dir,
            error = %e,
            "Output directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }

    let client = scrapers::http_client(&config)?;
    let feed = GoogleNewsFeed::new(client.clone());
    let resolver = Retrying::new(
        GoogleNewsDecoder::new(client.clone()),
        config.decode_retries,
        StdDuration::from_secs(1),
    );
    let extractor = HttpArticleExtractor::new(client);

    let report = match pipeline::run(&config, &feed, &resolver, &extractor).await {
        Ok(report) => report,
        Err(e) => {
            error!(error = %e, "Run aborted");
            return Err(e.into());
        }
    };

    for failure in &report.failures {
        warn!(
            kind = %failure.kind,
            link = %failure.link,
            title = %truncate_for_log(&failure.title, 80),
            reason = %failure.reason,
            "Skipped story"
        );
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        fetched = report.fetched,
        new_links = report.candidates,
        decoded = report.resolved,
        scraped = report.extracted,
        decode_failures = report.failures_of(FailureKind::Resolution),
        scrape_failures = report.failures_of(FailureKind::Extraction),
        stored = report.stored,
        processed = report.processed,
        wrote = report.wrote,
        "Execution complete"
    );

    Ok(())
}
