//! Run configuration.
//!
//! A [`Config`] is assembled once in `main` from three layers, highest
//! precedence first: command-line flags, an optional YAML file, and the
//! built-in defaults. The resulting value is passed to every stage; nothing
//! reads global state.
//!
//! ```yaml
//! query: gadwal
//! limit: 30
//! output_dir: ./out
//! feeds: []              # when empty, a Google News search feed is derived from `query`
//! decode_retries: 2
//! channel:
//!   title: Gadwal News Feed
//! ```

use crate::cli::Cli;
use crate::error::ConfigError;
use crate::scrapers::google_news;
use crate::utils::upcase;
use serde::Deserialize;
use std::path::PathBuf;
use tracing::{debug, instrument};

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// Channel metadata for the RSS export. Unset fields are derived from the query.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChannelConfig {
    pub title: Option<String>,
    pub link: Option<String>,
    pub description: Option<String>,
    pub language: Option<String>,
}

/// Fully resolved channel metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    pub title: String,
    pub link: String,
    pub description: String,
    pub language: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Google News search term.
    pub query: String,
    /// Explicit feed URLs; replaces the search feed when non-empty.
    pub feeds: Vec<String>,
    /// Retention limit `N`.
    pub limit: usize,
    pub output_dir: String,
    pub hl: String,
    pub gl: String,
    pub articles_file: String,
    pub xml_file: String,
    pub processed_file: String,
    pub channel: ChannelConfig,
    /// Extra attempts for link decoding after a transport failure.
    pub decode_retries: usize,
    pub request_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            query: "gadwal".to_string(),
            feeds: Vec::new(),
            limit: 30,
            output_dir: ".".to_string(),
            hl: "en-US".to_string(),
            gl: "US".to_string(),
            articles_file: "new_articles.json".to_string(),
            xml_file: "new_articles.xml".to_string(),
            processed_file: "processed_links.json".to_string(),
            channel: ChannelConfig::default(),
            decode_retries: 2,
            request_timeout_secs: 30,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl Config {
    /// Build the run configuration from the CLI and the optional config file.
    #[instrument(level = "debug", skip_all)]
    pub fn load(cli: &Cli) -> Result<Self, ConfigError> {
        let base = match &cli.config {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        let config = base.with_overrides(cli);
        config.validate()?;
        debug!(?config, "Resolved configuration");
        Ok(config)
    }

    /// Read a YAML config file. Missing keys take their defaults.
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        Self::from_yaml(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_string(),
            source,
        })
    }

    fn from_yaml(raw: &str) -> Result<Self, serde_yaml::Error> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(raw)
    }

    /// Apply command-line flags on top of this configuration.
    pub fn with_overrides(mut self, cli: &Cli) -> Self {
        if let Some(query) = &cli.query {
            self.query = query.clone();
        }
        if !cli.feed_urls.is_empty() {
            self.feeds = cli.feed_urls.clone();
        }
        if let Some(limit) = cli.limit {
            self.limit = limit;
        }
        if let Some(dir) = &cli.output_dir {
            self.output_dir = dir.clone();
        }
        if let Some(hl) = &cli.hl {
            self.hl = hl.clone();
        }
        if let Some(gl) = &cli.gl {
            self.gl = gl.clone();
        }
        self
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.limit == 0 {
            return Err(ConfigError::Invalid("limit must be at least 1".into()));
        }
        if self.feeds.is_empty() && self.query.trim().is_empty() {
            return Err(ConfigError::Invalid("either a query or at least one feed is required".into()));
        }
        Ok(())
    }

    /// The feeds to poll this run.
    pub fn feed_urls(&self) -> Vec<String> {
        if self.feeds.is_empty() {
            vec![google_news::search_url(&self.query, &self.hl, &self.gl)]
        } else {
            self.feeds.clone()
        }
    }

    /// Maximum size of the processed-link history.
    pub fn history_cap(&self) -> usize {
        self.limit.saturating_mul(2)
    }

    pub fn articles_path(&self) -> PathBuf {
        PathBuf::from(&self.output_dir).join(&self.articles_file)
    }

    pub fn xml_path(&self) -> PathBuf {
        PathBuf::from(&self.output_dir).join(&self.xml_file)
    }

    pub fn processed_path(&self) -> PathBuf {
        PathBuf::from(&self.output_dir).join(&self.processed_file)
    }

    /// Channel metadata for the export, filling gaps from the query.
    pub fn channel(&self) -> Channel {
        let topic = upcase(self.query.trim());
        let link = self
            .feed_urls()
            .into_iter()
            .next()
            .unwrap_or_else(|| "https://news.google.com".to_string());
        Channel {
            title: self
                .channel
                .title
                .clone()
                .unwrap_or_else(|| format!("{topic} News Feed")),
            link: self.channel.link.clone().unwrap_or(link),
            description: self
                .channel
                .description
                .clone()
                .unwrap_or_else(|| format!("Latest news about {topic}")),
            language: self.channel.language.clone().unwrap_or_else(|| self.hl.clone()),
        }
    }
}
