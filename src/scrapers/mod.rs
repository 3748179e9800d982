//! Network-facing collaborators of the pipeline.
//!
//! | Stage | Module | Implementation |
//! |-------|--------|----------------|
//! | Feed fetcher | [`google_news`] | RSS 2.0 search feed, parsed with `quick-xml` |
//! | Link resolver | [`decoder`] | Google News `batchexecute` decoding |
//! | Content extractor | [`article`] | HTML metadata and paragraph extraction with `scraper` |
//!
//! All three share one [`reqwest::Client`] built by [`http_client`].

pub mod article;
pub mod decoder;
pub mod google_news;

use crate::config::Config;
use reqwest::Client;
use std::time::Duration;

/// Build the HTTP client used for every request in a run.
pub fn http_client(config: &Config) -> reqwest::Result<Client> {
    Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .build()
}
