//! Novelty filter: decide which feed entries are worth scraping.
//!
//! An entry is new when both hold:
//! - no stored article has exactly the same title, and
//! - its feed link is not in the processed-link history.

use crate::models::{Article, FeedEntry};
use crate::store::ProcessedLinks;
use std::collections::HashSet;

/// Identity index over everything already seen.
#[derive(Debug)]
pub struct NoveltyIndex<'a> {
    titles: HashSet<&'a str>,
    processed: &'a ProcessedLinks,
}

impl<'a> NoveltyIndex<'a> {
    pub fn new(store: &'a [Article], processed: &'a ProcessedLinks) -> Self {
        Self {
            titles: store.iter().map(|a| a.title.as_str()).collect(),
            processed,
        }
    }

    pub fn is_novel(&self, entry: &FeedEntry) -> bool {
        !self.titles.contains(entry.title.as_str()) && !self.processed.contains(&entry.link)
    }
}

/// Keep the entries that are new, preserving order.
///
/// # Arguments
///
/// * `entries` - Feed entries, already ordered and limited
/// * `store` - The stored articles, matched by exact title
/// * `processed` - The processed-link history, matched by feed link
///
/// # Returns
///
/// The entries matching neither key. Applying the filter to its own output
/// returns it unchanged.
///
/// # Examples
///
/// ```ignore
/// let candidates = filter_novel(&entries, &store, &processed);
/// assert!(candidates.iter().all(|e| !processed.contains(&e.link)));
/// ```
pub fn filter_novel(
    entries: &[FeedEntry],
    store: &[Article],
    processed: &ProcessedLinks,
) -> Vec<FeedEntry> {
    let index = NoveltyIndex::new(store, processed);
    entries.iter().filter(|e| index.is_novel(e)).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(title: &str, link: &str) -> FeedEntry {
        FeedEntry {
            link: link.to_string(),
            title: title.to_string(),
            published: None,
            source: None,
        }
    }

    fn stored(title: &str) -> Article {
        Article {
            title: title.to_string(),
            authors: vec![],
            publish_date: None,
            text: String::new(),
            top_image: None,
            link: "https://publisher.example/x".to_string(),
        }
    }

    #[test]
    fn test_excludes_stored_title_regardless_of_link() {
        let store = vec![stored("Known story")];
        let entries = vec![entry("Known story", "https://news.google.com/rss/articles/NEW")];
        assert!(filter_novel(&entries, &store, &ProcessedLinks::default()).is_empty());
    }

    #[test]
    fn test_excludes_processed_link() {
        let processed = ProcessedLinks::from(vec!["g/1".to_string()]);
        let entries = vec![entry("Fresh", "g/1"), entry("Other", "g/2")];
        let novel = filter_novel(&entries, &[], &processed);
        assert_eq!(novel, vec![entry("Other", "g/2")]);
    }

    #[test]
    fn test_preserves_order_and_is_idempotent() {
        let store = vec![stored("b")];
        let processed = ProcessedLinks::from(vec!["g/d".to_string()]);
        let entries = vec![
            entry("a", "g/a"),
            entry("b", "g/b"),
            entry("c", "g/c"),
            entry("d", "g/d"),
            entry("e", "g/e"),
        ];
        let once = filter_novel(&entries, &store, &processed);
        let twice = filter_novel(&once, &store, &processed);
        let titles: Vec<_> = once.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["a", "c", "e"]);
        assert_eq!(once, twice);
        assert_eq!(once, filter_novel(&entries, &store, &processed));
    }

    #[test]
    fn test_title_match_is_exact() {
        let store = vec![stored("Known story")];
        let entries = vec![entry("Known story - The Hindu", "g/1")];
        assert_eq!(filter_novel(&entries, &store, &ProcessedLinks::default()).len(), 1);
    }
}
