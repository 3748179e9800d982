//! Error types for each pipeline stage.
//!
//! Feed, store and config errors are fatal for a run. Resolution and
//! extraction errors are item-scoped: the pipeline records them in the run
//! report and moves on to the next story.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Network error fetching {url}: {message}")]
    Network { url: String, message: String },

    #[error("Feed {url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("Failed to parse feed: {0}")]
    Parse(String),
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Not a Google News article link: {0}")]
    NotGoogleNews(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Decoding parameters not found on article page")]
    MissingParams,

    #[error("Unexpected batchexecute response: {0}")]
    BadResponse(String),

    #[error("Decoder reported no URL")]
    Unsuccessful,
}

impl ResolveError {
    /// Whether the failure came from the transport and may succeed on retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_))
    }
}

impl From<reqwest::Error> for ResolveError {
    fn from(err: reqwest::Error) -> Self {
        ResolveError::Network(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Article returned status {0}")]
    Status(u16),

    #[error("Page has neither title nor text")]
    Empty,
}

impl From<reqwest::Error> for ExtractError {
    fn from(err: reqwest::Error) -> Self {
        ExtractError::Network(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error on {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("XML write error on {path}: {message}")]
    Xml { path: String, message: String },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Feed(#[from] FeedError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_network_resolution_errors_retry() {
        assert!(ResolveError::Network("reset".into()).is_retryable());
        assert!(!ResolveError::MissingParams.is_retryable());
        assert!(!ResolveError::Unsuccessful.is_retryable());
        assert!(!ResolveError::NotGoogleNews("x".into()).is_retryable());
    }

    #[test]
    fn test_pipeline_error_is_transparent() {
        let err: PipelineError = FeedError::Status {
            url: "https://news.google.com/rss".into(),
            status: 503,
        }
        .into();
        assert_eq!(err.to_string(), "Feed https://news.google.com/rss returned status 503");
    }
}
