//! Data models for feed entries and scraped articles.
//!
//! This module defines the records that flow through the pipeline:
//! - [`FeedEntry`]: One story announced by a polled RSS feed
//! - [`ResolvedLink`]: A feed entry whose wrapper link has been decoded
//! - [`Article`]: A scraped article, as persisted and exported
//!
//! Only [`Article`] is serialized. Its JSON keys follow the long-standing
//! store layout (`title, author, publish_date, text, top_image, link`).

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Date layout used for [`Article::publish_date`].
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// A story as announced by a feed, before its link has been decoded.
///
/// `link` is whatever the feed provided, usually a Google News wrapper URL
/// such as `https://news.google.com/rss/articles/CBMi...`.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedEntry {
    /// The link as published in the feed.
    pub link: String,
    /// The story headline.
    pub title: String,
    /// Publication timestamp from `<pubDate>`, if present and parseable.
    pub published: Option<DateTime<Utc>>,
    /// Publisher name from the `<source>` element, if any.
    pub source: Option<String>,
}

/// A feed entry whose wrapper link has been decoded to the publisher URL.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedLink {
    /// The entry as it came out of the feed.
    pub entry: FeedEntry,
    /// The decoded destination URL.
    pub url: String,
}

/// A scraped article.
///
/// Optional metadata (`authors`, `publish_date`, `top_image`) may be missing;
/// absence serializes as `[]` or `null` and is left out of the RSS export.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Article {
    /// Article headline.
    pub title: String,
    /// Author names in byline order.
    #[serde(rename = "author", default)]
    pub authors: Vec<String>,
    /// Publication day in `YYYY-MM-DD` form.
    #[serde(default)]
    pub publish_date: Option<String>,
    /// Full article body text.
    #[serde(default)]
    pub text: String,
    /// Lead image URL.
    #[serde(default)]
    pub top_image: Option<String>,
    /// The decoded article URL.
    pub link: String,
}

impl Article {
    /// Parse [`Article::publish_date`] into a calendar date.
    ///
    /// A stored date that is not `YYYY-MM-DD` yields `None`, which callers
    /// treat as the oldest possible date.
    pub fn publish_day(&self) -> Option<NaiveDate> {
        let raw = self.publish_date.as_deref()?;
        match NaiveDate::parse_from_str(raw, DATE_FORMAT) {
            Ok(day) => Some(day),
            Err(e) => {
                debug!(title = %self.title, date = raw, error = %e, "Unparseable stored publish_date; sorting as oldest");
                None
            }
        }
    }

    /// The lead image, ignoring empty strings left by older stores.
    pub fn image(&self) -> Option<&str> {
        self.top_image.as_deref().filter(|s| !s.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(date: Option<&str>) -> Article {
        Article {
            title: "Test Article".to_string(),
            authors: vec!["Jane Doe".to_string()],
            publish_date: date.map(str::to_string),
            text: "Body".to_string(),
            top_image: None,
            link: "https://example.com/a".to_string(),
        }
    }

    #[test]
    fn test_article_serializes_with_store_keys() {
        let json = serde_json::to_string(&article(Some("2025-05-06"))).unwrap();
        assert_eq!(
            json,
            r#"{"title":"Test Article","author":["Jane Doe"],"publish_date":"2025-05-06","text":"Body","top_image":null,"link":"https://example.com/a"}"#
        );
    }

    #[test]
    fn test_article_deserializes_missing_optionals() {
        let json = r#"{"title": "T", "link": "https://example.com"}"#;
        let a: Article = serde_json::from_str(json).unwrap();
        assert!(a.authors.is_empty());
        assert_eq!(a.publish_date, None);
        assert_eq!(a.top_image, None);
        assert_eq!(a.text, "");
    }

    #[test]
    fn test_publish_day_parses_store_format() {
        let a = article(Some("2025-05-06"));
        assert_eq!(a.publish_day(), NaiveDate::from_ymd_opt(2025, 5, 6));
    }

    #[test]
    fn test_publish_day_rejects_other_formats() {
        assert_eq!(article(Some("May 6, 2025")).publish_day(), None);
        assert_eq!(article(None).publish_day(), None);
    }

    #[test]
    fn test_image_ignores_empty_string() {
        let mut a = article(None);
        a.top_image = Some(String::new());
        assert_eq!(a.image(), None);
        a.top_image = Some("https://example.com/i.jpg".to_string());
        assert_eq!(a.image(), Some("https://example.com/i.jpg"));
    }
}
