//! Persisted state: the article store and the processed-link history.
//!
//! Both files are read once at the start of a run. A missing file is a first
//! run; an unreadable or corrupt file is logged and treated as empty, so a
//! damaged store never blocks the job.

use crate::models::Article;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{HashSet, VecDeque};
use std::io::ErrorKind;
use std::path::Path;
use tokio::fs;
use tracing::{debug, info, instrument, warn};

/// Insertion-ordered set of links that have already been handled.
///
/// Persisted as a flat JSON array, oldest first. [`ProcessedLinks::cap`]
/// evicts from the front, so the history keeps the most recently added links.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct ProcessedLinks {
    order: VecDeque<String>,
    seen: HashSet<String>,
}

impl From<Vec<String>> for ProcessedLinks {
    fn from(links: Vec<String>) -> Self {
        let mut set = Self::default();
        for link in links {
            set.insert(link);
        }
        set
    }
}

impl From<ProcessedLinks> for Vec<String> {
    fn from(links: ProcessedLinks) -> Self {
        links.order.into()
    }
}

impl ProcessedLinks {
    pub fn contains(&self, link: &str) -> bool {
        self.seen.contains(link)
    }

    /// Record `link`. Returns `false` if it was already present.
    pub fn insert(&mut self, link: String) -> bool {
        if self.seen.contains(&link) {
            return false;
        }
        self.seen.insert(link.clone());
        self.order.push_back(link);
        true
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Drop the oldest links until at most `max` remain. Returns how many
    /// were evicted.
    pub fn cap(&mut self, max: usize) -> usize {
        let mut evicted = 0;
        while self.order.len() > max {
            if let Some(old) = self.order.pop_front() {
                self.seen.remove(&old);
                evicted += 1;
            }
        }
        evicted
    }
}

/// Read a JSON file, falling back to `T::default()` when it is absent or
/// cannot be parsed.
///
/// # Arguments
///
/// * `path` - The state file to read
///
/// # Returns
///
/// The decoded value. A missing file is logged at `info`, an unreadable or
/// corrupt one at `warn`; both yield `T::default()`.
///
/// # Examples
///
/// ```ignore
/// let links: ProcessedLinks = load_or_default(Path::new("processed_links.json")).await;
/// ```
#[instrument(level = "debug", skip_all, fields(path = %path.display()))]
pub async fn load_or_default<T>(path: &Path) -> T
where
    T: DeserializeOwned + Default,
{
    let raw = match fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            info!("No state file yet; starting empty");
            return T::default();
        }
        Err(e) => {
            warn!(error = %e, "Cannot read state file; starting empty");
            return T::default();
        }
    };

    match serde_json::from_str(&raw) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, "Corrupt state file; starting empty");
            T::default()
        }
    }
}

/// Load the stored articles.
pub async fn load_articles(path: &Path) -> Vec<Article> {
    let articles: Vec<Article> = load_or_default(path).await;
    debug!(count = articles.len(), "Loaded stored articles");
    articles
}

/// Load the processed-link history.
pub async fn load_processed(path: &Path) -> ProcessedLinks {
    let links: ProcessedLinks = load_or_default(path).await;
    debug!(count = links.len(), "Loaded processed links");
    links
}

/// Merge newly scraped articles into the store.
///
/// # Arguments
///
/// * `existing` - The articles already in the store
/// * `new` - Articles scraped this run
/// * `limit` - Retention limit `N`
///
/// # Returns
///
/// At most `limit` articles sorted by publish date, newest first, with
/// missing or unparseable dates last. The sort is stable: among equal dates,
/// stored articles precede new ones.
///
/// # Examples
///
/// ```ignore
/// let merged = merge_articles(store, fresh, config.limit);
/// assert!(merged.len() <= config.limit);
/// ```
pub fn merge_articles(existing: Vec<Article>, new: Vec<Article>, limit: usize) -> Vec<Article> {
    let mut merged = existing;
    merged.extend(new);
    merged.sort_by_cached_key(|a| Reverse(a.publish_day()));
    merged.truncate(limit);
    merged
}
