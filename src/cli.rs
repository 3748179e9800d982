//! Command-line interface definitions.
//!
//! Every option is optional on the command line so that a YAML config file
//! (see [`crate::config`]) can supply it instead. Flags win over the file.

use clap::Parser;

/// Command-line arguments for the feed scraper.
///
/// # Examples
///
/// ```sh
/// # Poll the default search and write into the current directory
/// news_feed_scraper
///
/// # Different search term, keep 50 articles, write into ./out
/// news_feed_scraper -q "hyderabad metro" -l 50 -o ./out
///
/// # Explicit feeds instead of a search term
/// news_feed_scraper --feed-url https://news.google.com/rss/search?q=a --feed-url https://news.google.com/rss/search?q=b
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a YAML config file
    #[arg(short, long, env = "NEWS_CONFIG")]
    pub config: Option<String>,

    /// Google News search term
    #[arg(short, long, env = "NEWS_QUERY")]
    pub query: Option<String>,

    /// Feed URL to poll (repeatable; replaces the search term feed)
    #[arg(long = "feed-url")]
    pub feed_urls: Vec<String>,

    /// Retention limit: articles kept in the store and entries taken per run
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Directory for the JSON store, RSS export and link history
    #[arg(short, long)]
    pub output_dir: Option<String>,

    /// Google News interface language, e.g. `en-US`
    #[arg(long)]
    pub hl: Option<String>,

    /// Google News country, e.g. `US`
    #[arg(long)]
    pub gl: Option<String>,
}
