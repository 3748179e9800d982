//! Service seams for the pipeline's external collaborators.
//!
//! Each network-facing stage is expressed as a trait so the pipeline can be
//! driven by the real HTTP implementations in [`crate::scrapers`] or by
//! in-memory fakes in tests:
//! - [`FeedSource`]: Download and parse one RSS feed
//! - [`LinkResolver`]: Decode a wrapper link into the publisher URL
//! - [`ContentExtractor`]: Download and parse one article page
//! - [`Retrying`]: Decorator that adds backoff retries to any [`LinkResolver`]
//!
//! # Retry Strategy
//!
//! Only transport failures are retried (see [`ResolveError::is_retryable`]).
//! The delay doubles from `base_delay`, is capped at 30 seconds, and gets up
//! to 250ms of random jitter.

use crate::error::{ExtractError, FeedError, ResolveError};
use crate::models::{Article, FeedEntry};
use rand::{Rng, rng};
use std::fmt;
use std::time::{Duration as StdDuration, Instant};
use tokio::time::sleep;
use tracing::{error, instrument, warn};

/// Source of feed entries.
pub trait FeedSource {
    /// Fetch and parse the feed at `url`, in document order.
    async fn fetch(&self, url: &str) -> Result<Vec<FeedEntry>, FeedError>;
}

/// Decoder for feed-provided wrapper links.
pub trait LinkResolver {
    /// Return the destination URL behind `link`.
    async fn resolve(&self, link: &str) -> Result<String, ResolveError>;
}

/// Article downloader and parser.
pub trait ContentExtractor {
    /// Download `url` and extract a normalized [`Article`] from it.
    async fn extract(&self, url: &str) -> Result<Article, ExtractError>;
}

/// Wrapper that adds exponential backoff retry logic to a [`LinkResolver`].
///
/// ```text
/// delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..=max_jitter)
/// ```
pub struct Retrying<T> {
    inner: T,
    max_retries: usize,
    base_delay: StdDuration,
    max_delay: StdDuration,
    max_jitter: StdDuration,
}

impl<T> Retrying<T>
where
    T: LinkResolver,
{
    /// Wrap `inner`, retrying transport failures up to `max_retries` times.
    pub fn new(inner: T, max_retries: usize, base_delay: StdDuration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: StdDuration::from_secs(30),
            max_jitter: StdDuration::from_millis(250),
        }
    }

    /// Override the jitter ceiling.
    #[cfg(test)]
    pub fn with_jitter(mut self, max_jitter: StdDuration) -> Self {
        self.max_jitter = max_jitter;
        self
    }

    fn backoff(&self, attempt: usize) -> StdDuration {
        let exp = u32::try_from(attempt.saturating_sub(1)).unwrap_or(u32::MAX).min(16);
        let delay = self.base_delay.saturating_mul(1 << exp).min(self.max_delay);
        let jitter_ms = self.max_jitter.as_millis() as u64;
        delay + StdDuration::from_millis(rng().random_range(0..=jitter_ms))
    }
}

impl<T> fmt::Debug for Retrying<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Retrying")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

impl<T> LinkResolver for Retrying<T>
where
    T: LinkResolver,
{
    #[instrument(level = "debug", skip_all)]
    async fn resolve(&self, link: &str) -> Result<String, ResolveError> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            match self.inner.resolve(link).await {
                Ok(url) => return Ok(url),
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => {
                    attempt += 1;
                    let elapsed_ms_total = total_t0.elapsed().as_millis() as u64;

                    if attempt > self.max_retries {
                        error!(
                            attempt,
                            max = self.max_retries,
                            elapsed_ms_total,
                            error = %e,
                            "resolve() exhausted retries"
                        );
                        return Err(e);
                    }

                    let delay = self.backoff(attempt);
                    warn!(
                        attempt,
                        max = self.max_retries,
                        elapsed_ms_total,
                        ?delay,
                        error = %e,
                        "resolve() attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct Flaky {
        failures: usize,
        calls: Cell<usize>,
        error: fn() -> ResolveError,
    }

    impl LinkResolver for Flaky {
        async fn resolve(&self, link: &str) -> Result<String, ResolveError> {
            let n = self.calls.get();
            self.calls.set(n + 1);
            if n < self.failures {
                Err((self.error)())
            } else {
                Ok(format!("{link}/decoded"))
            }
        }
    }

    fn flaky(failures: usize, error: fn() -> ResolveError) -> Retrying<Flaky> {
        Retrying::new(
            Flaky { failures, calls: Cell::new(0), error },
            2,
            StdDuration::ZERO,
        )
        .with_jitter(StdDuration::ZERO)
    }

    #[tokio::test]
    async fn test_retries_transport_errors() {
        let r = flaky(2, || ResolveError::Network("reset".into()));
        assert_eq!(r.resolve("https://x").await.unwrap(), "https://x/decoded");
        assert_eq!(r.inner.calls.get(), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let r = flaky(5, || ResolveError::Network("reset".into()));
        assert!(r.resolve("https://x").await.is_err());
        assert_eq!(r.inner.calls.get(), 3);
    }

    #[tokio::test]
    async fn test_definitive_errors_are_not_retried() {
        let r = flaky(5, || ResolveError::Unsuccessful);
        assert!(matches!(r.resolve("https://x").await, Err(ResolveError::Unsuccessful)));
        assert_eq!(r.inner.calls.get(), 1);
    }

    #[test]
    fn test_backoff_is_capped() {
        let r = Retrying::new(
            Flaky { failures: 0, calls: Cell::new(0), error: || ResolveError::MissingParams },
            10,
            StdDuration::from_secs(1),
        )
        .with_jitter(StdDuration::ZERO);
        assert_eq!(r.backoff(1), StdDuration::from_secs(1));
        assert_eq!(r.backoff(3), StdDuration::from_secs(4));
        assert_eq!(r.backoff(10), StdDuration::from_secs(30));
    }
}
