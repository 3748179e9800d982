//! The end-to-end run: load state, poll feeds, filter, resolve, extract,
//! merge and write.
//!
//! Stages run strictly in sequence. Resolution and extraction failures are
//! confined to their item and collected in the [`RunReport`]; only feed
//! failures and write failures abort a run.

use crate::api::{ContentExtractor, FeedSource, LinkResolver};
use crate::config::Config;
use crate::error::PipelineError;
use crate::models::{Article, FeedEntry, ResolvedLink};
use crate::novelty::filter_novel;
use crate::outputs::{json, rss};
use crate::scrapers::google_news::index_entries;
use crate::store::{load_articles, load_processed, merge_articles};
use futures::stream::{self, StreamExt};
use itertools::Itertools;
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, info, instrument, warn};

/// Which stage dropped an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Resolution,
    Extraction,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resolution => f.write_str("resolution"),
            Self::Extraction => f.write_str("extraction"),
        }
    }
}

/// One story dropped during the run.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemFailure {
    /// The feed link of the story.
    pub link: String,
    pub title: String,
    pub kind: FailureKind,
    pub reason: String,
}

/// Counters and failures for one run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    /// Entries kept from the feeds after ordering and the limit.
    pub fetched: usize,
    /// Entries that passed the novelty filter.
    pub candidates: usize,
    pub resolved: usize,
    pub extracted: usize,
    /// Size of the article store after the run.
    pub stored: usize,
    /// Size of the processed-link history after the run.
    pub processed: usize,
    pub failures: Vec<ItemFailure>,
    /// Whether any file was written.
    pub wrote: bool,
}

impl RunReport {
    pub fn failures_of(&self, kind: FailureKind) -> usize {
        self.failures.iter().filter(|f| f.kind == kind).count()
    }
}

async fn resolve_links<R: LinkResolver>(
    resolver: &R,
    candidates: &[FeedEntry],
) -> (Vec<ResolvedLink>, Vec<ItemFailure>) {
    stream::iter(candidates)
        .then(|entry| async move {
            match resolver.resolve(&entry.link).await {
                Ok(url) => {
                    debug!(link = %entry.link, source = ?entry.source, %url, "Decoded link");
                    Ok(ResolvedLink {
                        entry: entry.clone(),
                        url,
                    })
                }
                Err(e) => {
                    warn!(link = %entry.link, title = %entry.title, error = %e, "Failed to decode link");
                    Err(ItemFailure {
                        link: entry.link.clone(),
                        title: entry.title.clone(),
                        kind: FailureKind::Resolution,
                        reason: e.to_string(),
                    })
                }
            }
        })
        .collect::<Vec<_>>()
        .await
        .into_iter()
        .partition_result()
}

async fn extract_articles<E: ContentExtractor>(
    extractor: &E,
    links: &[ResolvedLink],
) -> (Vec<Article>, Vec<ItemFailure>) {
    stream::iter(links)
        .then(|link| async move {
            match extractor.extract(&link.url).await {
                Ok(article) => Ok(article),
                Err(e) => {
                    warn!(url = %link.url, error = %e, "Failed to scrape article");
                    Err(ItemFailure {
                        link: link.entry.link.clone(),
                        title: link.entry.title.clone(),
                        kind: FailureKind::Extraction,
                        reason: e.to_string(),
                    })
                }
            }
        })
        .collect::<Vec<_>>()
        .await
        .into_iter()
        .partition_result()
}

/// Execute one run against the given collaborators.
#[instrument(level = "info", skip_all, fields(limit = config.limit, output_dir = %config.output_dir))]
pub async fn run<F, R, E>(
    config: &Config,
    feed: &F,
    resolver: &R,
    extractor: &E,
) -> Result<RunReport, PipelineError>
where
    F: FeedSource,
    R: LinkResolver,
    E: ContentExtractor,
{
    let mut report = RunReport::default();

    // ---- State ----
    let store = load_articles(&config.articles_path()).await;
    let mut processed = load_processed(&config.processed_path()).await;
    info!(stored = store.len(), processed = processed.len(), "Loaded state");
    report.stored = store.len();
    report.processed = processed.len();

    // ---- Feeds ----
    let entries = index_entries(feed, &config.feed_urls(), config.limit).await?;
    report.fetched = entries.len();
    info!(count = entries.len(), "Fetched feed entries");

    // ---- Novelty ----
    let candidates = filter_novel(&entries, &store, &processed);
    report.candidates = candidates.len();
    if candidates.is_empty() {
        info!("No new links found");
        return Ok(report);
    }
    info!(count = candidates.len(), "Found new links");

    // ---- Resolve & extract ----
    let (resolved, resolve_failures) = resolve_links(resolver, &candidates).await;
    report.resolved = resolved.len();
    report.failures.extend(resolve_failures);
    info!(decoded = resolved.len(), "Decoded links");

    let (scraped, extract_failures) = extract_articles(extractor, &resolved).await;
    report.failures.extend(extract_failures);

    if scraped.is_empty() {
        warn!(failed = report.failures.len(), "No articles scraped; leaving files untouched");
        return Ok(report);
    }

    let stored_titles: HashSet<&str> = store.iter().map(|a| a.title.as_str()).collect();
    let fresh: Vec<Article> = scraped
        .into_iter()
        .filter(|a| !stored_titles.contains(a.title.as_str()))
        .unique_by(|a| a.title.clone())
        .collect();
    report.extracted = fresh.len();
    info!(count = fresh.len(), failed = report.failures.len(), "Scraped articles");

    // ---- History ----
    for entry in &candidates {
        processed.insert(entry.link.clone());
    }
    let evicted = processed.cap(config.history_cap());
    if evicted > 0 {
        debug!(evicted, cap = config.history_cap(), "Trimmed processed-link history");
    }
    json::write_processed_links(&processed, &config.processed_path()).await?;
    report.processed = processed.len();
    report.wrote = true;

    // ---- Merge & write ----
    if fresh.is_empty() {
        info!("Scraped articles are already stored; store left untouched");
        return Ok(report);
    }
    let merged = merge_articles(store, fresh, config.limit);
    json::write_articles(&merged, &config.articles_path()).await?;
    rss::write_rss(&merged, &config.channel(), &config.xml_path()).await?;
    report.stored = merged.len();
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ExtractError, FeedError, ResolveError};
    use crate::store::ProcessedLinks;
    use chrono::{TimeZone, Utc};
    use std::cell::RefCell;
    use std::collections::HashMap;
    use tempfile::TempDir;

    struct FakeFeed(Vec<FeedEntry>);

    impl FeedSource for FakeFeed {
        async fn fetch(&self, _url: &str) -> Result<Vec<FeedEntry>, FeedError> {
            Ok(self.0.clone())
        }
    }

    struct BrokenFeed;

    impl FeedSource for BrokenFeed {
        async fn fetch(&self, url: &str) -> Result<Vec<FeedEntry>, FeedError> {
            Err(FeedError::Status {
                url: url.to_string(),
                status: 503,
            })
        }
    }

    /// Decodes `g/<slug>` to `https://publisher.example/<slug>` unless the
    /// link is listed as failing.
    #[derive(Default)]
    struct FakeResolver {
        failing: HashSet<String>,
        calls: RefCell<Vec<String>>,
    }

    impl LinkResolver for FakeResolver {
        async fn resolve(&self, link: &str) -> Result<String, ResolveError> {
            self.calls.borrow_mut().push(link.to_string());
            if self.failing.contains(link) {
                return Err(ResolveError::Unsuccessful);
            }
            let slug = link.trim_start_matches("g/");
            Ok(format!("https://publisher.example/{slug}"))
        }
    }

    /// Serves canned articles keyed by URL; anything else fails.
    #[derive(Default)]
    struct FakeExtractor(HashMap<String, Article>);

    impl ContentExtractor for FakeExtractor {
        async fn extract(&self, url: &str) -> Result<Article, ExtractError> {
            self.0.get(url).cloned().ok_or(ExtractError::Status(404))
        }
    }

    fn entry(slug: &str, day: u32) -> FeedEntry {
        FeedEntry {
            link: format!("g/{slug}"),
            title: format!("Story {slug}"),
            published: Utc.with_ymd_and_hms(2025, 5, day, 8, 0, 0).single(),
            source: None,
        }
    }

    fn article(slug: &str, day: u32) -> Article {
        Article {
            title: format!("Story {slug}"),
            authors: vec!["Reporter".to_string()],
            publish_date: Some(format!("2025-05-{day:02}")),
            text: format!("Body of {slug}"),
            top_image: None,
            link: format!("https://publisher.example/{slug}"),
        }
    }

    fn extractor_for(articles: &[Article]) -> FakeExtractor {
        FakeExtractor(articles.iter().map(|a| (a.link.clone(), a.clone())).collect())
    }

    fn config(dir: &TempDir, limit: usize) -> Config {
        Config {
            feeds: vec!["https://news.google.com/rss/search?q=test".to_string()],
            limit,
            output_dir: dir.path().to_str().unwrap().to_string(),
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn test_first_run_stores_everything() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir, 30);
        let feed = FakeFeed(vec![entry("a", 1), entry("b", 2), entry("c", 3)]);
        let extractor = extractor_for(&[article("a", 1), article("b", 2), article("c", 3)]);

        let report = run(&config, &feed, &FakeResolver::default(), &extractor).await.unwrap();

        assert!(report.wrote);
        assert_eq!(report.extracted, 3);
        let stored = load_articles(&config.articles_path()).await;
        assert_eq!(stored.len(), 3);
        assert_eq!(stored[0].title, "Story c");
        assert_eq!(load_processed(&config.processed_path()).await.len(), 3);
        let xml = std::fs::read_to_string(config.xml_path()).unwrap();
        assert_eq!(xml.matches("<item>").count(), 3);
    }

    #[tokio::test]
    async fn test_known_title_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir, 30);
        json::write_articles(&[article("a", 1)], &config.articles_path()).await.unwrap();
        let before = std::fs::read_to_string(config.articles_path()).unwrap();

        let mut known = entry("a", 1);
        known.link = "g/other-wrapper".to_string();
        let resolver = FakeResolver::default();
        let report = run(&config, &FakeFeed(vec![known]), &resolver, &FakeExtractor::default())
            .await
            .unwrap();

        assert_eq!(report.candidates, 0);
        assert!(!report.wrote);
        assert!(resolver.calls.borrow().is_empty());
        assert_eq!(std::fs::read_to_string(config.articles_path()).unwrap(), before);
        assert!(!config.processed_path().exists());
        assert!(!config.xml_path().exists());
    }

    #[tokio::test]
    async fn test_resolution_failure_still_marks_both_links() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir, 30);
        let feed = FakeFeed(vec![entry("ok", 2), entry("bad", 1)]);
        let resolver = FakeResolver {
            failing: HashSet::from(["g/bad".to_string()]),
            ..FakeResolver::default()
        };
        let extractor = extractor_for(&[article("ok", 2), article("bad", 1)]);

        let report = run(&config, &feed, &resolver, &extractor).await.unwrap();

        assert_eq!(report.failures_of(FailureKind::Resolution), 1);
        assert_eq!(report.failures[0].link, "g/bad");
        let stored = load_articles(&config.articles_path()).await;
        assert_eq!(stored, vec![article("ok", 2)]);
        let processed = load_processed(&config.processed_path()).await;
        assert!(processed.contains("g/ok"));
        assert!(processed.contains("g/bad"));
    }

    #[tokio::test]
    async fn test_all_extractions_failing_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir, 30);
        let feed = FakeFeed(vec![entry("a", 1), entry("b", 2)]);

        let report = run(&config, &feed, &FakeResolver::default(), &FakeExtractor::default())
            .await
            .unwrap();

        assert_eq!(report.failures_of(FailureKind::Extraction), 2);
        assert!(!report.wrote);
        assert!(!config.articles_path().exists());
        assert!(!config.processed_path().exists());
    }

    #[tokio::test]
    async fn test_second_run_skips_processed_and_respects_limit() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir, 2);
        let all = [article("a", 1), article("b", 2), article("c", 3), article("d", 4)];
        let extractor = extractor_for(&all);

        let first = FakeFeed(vec![entry("a", 1), entry("b", 2)]);
        run(&config, &first, &FakeResolver::default(), &extractor).await.unwrap();

        let resolver = FakeResolver::default();
        let second = FakeFeed(vec![entry("a", 1), entry("b", 2), entry("c", 3), entry("d", 4)]);
        let report = run(&config, &second, &resolver, &extractor).await.unwrap();

        // Only the two most recent entries are considered, and both are new.
        assert_eq!(*resolver.calls.borrow(), vec!["g/d", "g/c"]);
        assert_eq!(report.stored, 2);
        let stored = load_articles(&config.articles_path()).await;
        let titles: Vec<_> = stored.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["Story d", "Story c"]);
        let processed: Vec<String> = load_processed(&config.processed_path())
            .await
            .iter()
            .map(str::to_string)
            .collect();
        assert_eq!(processed, vec!["g/b", "g/a", "g/d", "g/c"]);
    }

    #[tokio::test]
    async fn test_history_is_capped_to_twice_the_limit() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir, 1);
        let seeded = ProcessedLinks::from(vec!["g/old1".to_string(), "g/old2".to_string()]);
        json::write_processed_links(&seeded, &config.processed_path()).await.unwrap();

        let feed = FakeFeed(vec![entry("new", 5)]);
        let extractor = extractor_for(&[article("new", 5)]);
        let report = run(&config, &feed, &FakeResolver::default(), &extractor).await.unwrap();

        assert_eq!(report.processed, 2);
        let processed = load_processed(&config.processed_path()).await;
        assert!(!processed.contains("g/old1"));
        assert!(processed.contains("g/old2"));
        assert!(processed.contains("g/new"));
    }

    #[tokio::test]
    async fn test_duplicate_scraped_titles_are_kept_once() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir, 30);
        let feed = FakeFeed(vec![entry("x", 2), entry("y", 1)]);
        let mut dup = article("y", 1);
        dup.title = "Story x".to_string();
        let extractor = extractor_for(&[article("x", 2), dup]);

        let report = run(&config, &feed, &FakeResolver::default(), &extractor).await.unwrap();

        assert_eq!(report.extracted, 1);
        assert_eq!(load_articles(&config.articles_path()).await.len(), 1);
        assert_eq!(load_processed(&config.processed_path()).await.len(), 2);
    }

    #[tokio::test]
    async fn test_already_stored_article_still_records_its_link() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir, 30);
        json::write_articles(&[article("a", 1)], &config.articles_path()).await.unwrap();
        let before = std::fs::read_to_string(config.articles_path()).unwrap();

        let mut suffixed = entry("a", 1);
        suffixed.title = "Story a - The Hindu".to_string();
        let feed = FakeFeed(vec![suffixed]);
        let resolver = FakeResolver::default();
        let extractor = extractor_for(&[article("a", 1)]);

        let first = run(&config, &feed, &resolver, &extractor).await.unwrap();
        assert_eq!(first.candidates, 1);
        assert_eq!(first.extracted, 0);
        assert!(first.wrote);
        assert!(load_processed(&config.processed_path()).await.contains("g/a"));
        assert_eq!(std::fs::read_to_string(config.articles_path()).unwrap(), before);
        assert!(!config.xml_path().exists());

        for _ in 0..2 {
            let again = run(&config, &feed, &resolver, &extractor).await.unwrap();
            assert_eq!(again.candidates, 0);
        }
        assert_eq!(resolver.calls.borrow().len(), 1);
    }

    #[tokio::test]
    async fn test_feed_failure_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir, 30);
        let result = run(&config, &BrokenFeed, &FakeResolver::default(), &FakeExtractor::default()).await;
        assert!(matches!(result, Err(PipelineError::Feed(_))));
    }
}
