//! Google News RSS feed fetcher.
//!
//! Google News exposes search results as a plain RSS 2.0 document:
//!
//! ```text
//! https://news.google.com/rss/search?q=gadwal&hl=en-US&gl=US&ceid=US:en
//! ```
//!
//! Every `<item>` carries a headline, a wrapper link under
//! `news.google.com/rss/articles/...`, an RFC 2822 `<pubDate>` and a
//! `<source>` naming the publisher. The wrapper links are decoded later by
//! [`super::decoder`].

use crate::api::FeedSource;
use crate::error::FeedError;
use crate::models::FeedEntry;
use crate::utils::normalize_whitespace;
use chrono::{DateTime, Utc};
use itertools::Itertools;
use reqwest::Client;
use serde::Deserialize;
use std::cmp::Reverse;
use tracing::{debug, info, instrument};

const SEARCH_BASE: &str = "https://news.google.com/rss/search";

/// Build the RSS search URL for `query`.
///
/// `hl` is the interface language (`en-US`) and `gl` the country (`US`); the
/// `ceid` edition id combines the country with the bare language code.
pub fn search_url(query: &str, hl: &str, gl: &str) -> String {
    let lang = hl.split('-').next().unwrap_or(hl);
    format!(
        "{}?q={}&hl={}&gl={}&ceid={}:{}",
        SEARCH_BASE,
        urlencoding::encode(query.trim()),
        hl,
        gl,
        gl,
        lang
    )
}

#[derive(Debug, Deserialize)]
struct Rss {
    channel: RssChannel,
}

#[derive(Debug, Deserialize)]
struct RssChannel {
    #[serde(rename = "item", default)]
    items: Vec<RssItem>,
}

#[derive(Debug, Deserialize)]
struct RssItem {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    source: Option<RssSource>,
}

#[derive(Debug, Deserialize)]
struct RssSource {
    #[serde(rename = "$text", default)]
    name: String,
}

/// Parse an RSS 2.0 document into feed entries, in document order.
///
/// Items without a link are dropped. A missing or unparseable `<pubDate>`
/// leaves `published` empty.
pub fn parse_feed(xml: &str) -> Result<Vec<FeedEntry>, FeedError> {
    let rss: Rss = quick_xml::de::from_str(xml).map_err(|e| FeedError::Parse(e.to_string()))?;

    let entries = rss
        .channel
        .items
        .into_iter()
        .filter_map(|item| {
            let link = item.link.map(|l| l.trim().to_string()).filter(|l| !l.is_empty())?;
            Some(FeedEntry {
                link,
                title: item.title.map(|t| normalize_whitespace(&t)).unwrap_or_default(),
                published: item.pub_date.as_deref().and_then(parse_pub_date),
                source: item
                    .source
                    .map(|s| s.name.trim().to_string())
                    .filter(|s| !s.is_empty()),
            })
        })
        .collect();
    Ok(entries)
}

/// Parse an RSS `<pubDate>`, accepting RFC 2822 and RFC 3339.
pub fn parse_pub_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc2822(raw)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

/// Keep the `limit` most recent entries, newest first.
///
/// Entries without a timestamp sort as the oldest. The sort is stable, so
/// ties keep feed order.
pub fn select_recent(mut entries: Vec<FeedEntry>, limit: usize) -> Vec<FeedEntry> {
    entries.sort_by_key(|e| Reverse(e.published));
    entries.truncate(limit);
    entries
}

/// Fetch every feed in `urls` in turn and keep the `limit` most recent
/// entries across all of them.
///
/// A link announced by more than one feed is kept once (first feed wins).
/// Any feed failure aborts the whole fetch.
#[instrument(level = "info", skip_all, fields(feeds = urls.len(), limit = limit))]
pub async fn index_entries<F: FeedSource>(
    feed: &F,
    urls: &[String],
    limit: usize,
) -> Result<Vec<FeedEntry>, FeedError> {
    let mut all = Vec::new();
    for url in urls {
        let entries = feed.fetch(url).await?;
        info!(%url, count = entries.len(), "Fetched feed");
        all.extend(entries);
    }

    let unique = all.into_iter().unique_by(|e| e.link.clone()).collect::<Vec<_>>();
    let recent = select_recent(unique, limit);
    debug!(titles = ?recent.iter().map(|e| &e.title).collect::<Vec<_>>(), "Selected entries");
    Ok(recent)
}

/// [`FeedSource`] backed by HTTP.
#[derive(Debug, Clone)]
pub struct GoogleNewsFeed {
    client: Client,
}

impl GoogleNewsFeed {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl FeedSource for GoogleNewsFeed {
    #[instrument(level = "info", skip_all, fields(%url))]
    async fn fetch(&self, url: &str) -> Result<Vec<FeedEntry>, FeedError> {
        let network = |e: reqwest::Error| FeedError::Network {
            url: url.to_string(),
            message: e.to_string(),
        };

        let response = self.client.get(url).send().await.map_err(network)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let body = response.text().await.map_err(network)?;
        debug!(bytes = body.len(), "Downloaded feed");
        parse_feed(&body)
    }
}
