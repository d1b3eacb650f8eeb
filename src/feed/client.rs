use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

use crate::feed::fetcher::{FetchError, Fetcher};
use crate::feed::instances::InstanceRegistry;
use crate::feed::parser::{self, ParseError};
use crate::feed::resolver;
use crate::feed::types::{Feed, Item};

/// Delay between candidate attempts, so a dead mirror does not turn into a
/// burst of requests against the next one.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(100);
/// Batch width used when the caller does not pick one.
pub const DEFAULT_CONCURRENCY: usize = 5;

/// Errors surfaced by [`FeedClient::get_feed`].
///
/// Individual candidate failures are logged and folded into
/// [`FeedError::AllInstancesFailed`]; they never surface on their own.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("All RSSHub instances failed: {last}")]
    AllInstancesFailed { last: String },
}

/// Why one candidate URL was abandoned.
#[derive(Debug, Error)]
pub enum AttemptError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Arguments for one feed resolution.
#[derive(Debug, Clone)]
pub struct GetFeedParams {
    /// Feed reference: a plain URL, an `rsshub://` path, a bare RSSHub path,
    /// or any of those wrapped as `{"url": ...}` JSON.
    pub url: String,
    /// Items to keep; `0` keeps all.
    pub count: usize,
    /// Mirror to try first for this call only.
    pub priority_instance: Option<String>,
}

impl GetFeedParams {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            count: 1,
            priority_instance: None,
        }
    }

    pub fn count(mut self, count: usize) -> Self {
        self.count = count;
        self
    }

    pub fn priority_instance(mut self, instance: impl Into<String>) -> Self {
        self.priority_instance = Some(instance.into());
        self
    }
}

/// One entry of a batch request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedRequest {
    pub url: String,
    /// Display title from the subscription list, if any.
    pub title: Option<String>,
    pub category: Option<String>,
}

impl FeedRequest {
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }
}

/// Successful entry of a batch result.
#[derive(Debug, Clone, Serialize)]
pub struct FeedSuccess {
    pub title: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub items: Vec<Item>,
}

/// Failed entry of a batch result.
#[derive(Debug, Clone, Serialize)]
pub struct FeedFailure {
    pub title: String,
    pub url: String,
    pub error: String,
}

/// Aggregate outcome of [`FeedClient::get_feeds`]. One feed failing never
/// affects its siblings.
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub feeds: Vec<FeedSuccess>,
    pub errors: Vec<FeedFailure>,
}

/// Entry point for feed resolution: URL expansion, mirror failover, parsing.
///
/// Holds only read-only state, so one client can serve any number of
/// concurrent requests.
#[derive(Debug, Clone)]
pub struct FeedClient {
    fetcher: Fetcher,
    registry: InstanceRegistry,
    retry_delay: Duration,
}

impl FeedClient {
    pub fn new(fetcher: Fetcher, registry: InstanceRegistry) -> Self {
        Self {
            fetcher,
            registry,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn registry(&self) -> &InstanceRegistry {
        &self.registry
    }

    /// Resolves a feed reference and returns the first candidate that both
    /// fetches and parses.
    ///
    /// Candidates are tried strictly one at a time in registry order, with
    /// [`DEFAULT_RETRY_DELAY`] (or the configured delay) between attempts.
    ///
    /// # Errors
    ///
    /// - [`FeedError::InvalidInput`] - blank reference
    /// - [`FeedError::AllInstancesFailed`] - every candidate failed; carries
    ///   the last failure's message
    pub async fn get_feed(&self, params: &GetFeedParams) -> Result<Feed, FeedError> {
        if params.url.trim().is_empty() {
            return Err(FeedError::InvalidInput("URL must not be empty.".into()));
        }

        let candidates = match params.priority_instance.as_deref() {
            Some(priority) => resolver::resolve(&params.url, &self.registry.with_priority(priority)),
            None => resolver::resolve(&params.url, &self.registry),
        };
        let mut last_error: Option<AttemptError> = None;

        for (index, candidate) in candidates.iter().enumerate() {
            tracing::debug!(url = %candidate, attempt = index + 1, total = candidates.len(), "Attempting to fetch");

            match self.attempt(candidate, params.count).await {
                Ok(feed) => {
                    tracing::info!(url = %candidate, items = feed.items.len(), "Fetched feed");
                    return Ok(feed);
                }
                Err(e) => {
                    tracing::warn!(url = %candidate, error = %e, "Feed attempt failed");
                    last_error = Some(e);
                }
            }

            if index + 1 < candidates.len() && !self.retry_delay.is_zero() {
                tokio::time::sleep(self.retry_delay).await;
            }
        }

        let last = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "Unknown error".to_string());
        tracing::error!(input = %params.url, last_error = %last, "All candidates failed");
        Err(FeedError::AllInstancesFailed { last })
    }

    async fn attempt(&self, url: &str, count: usize) -> Result<Feed, AttemptError> {
        let body = self.fetcher.fetch(url).await?;
        Ok(parser::normalize(&body, count)?)
    }

    /// Resolves many feeds with at most `concurrency` in flight.
    ///
    /// Each feed resolves independently through [`get_feed`](Self::get_feed);
    /// results keep input order. A `concurrency` of 0 is treated as 1.
    pub async fn get_feeds(
        &self,
        requests: Vec<FeedRequest>,
        count: usize,
        concurrency: usize,
    ) -> BatchSummary {
        let total = requests.len();
        let width = concurrency.max(1);

        let outcomes: Vec<(FeedRequest, Result<Feed, FeedError>)> = stream::iter(requests)
            .map(|request| async move {
                let params = GetFeedParams::new(request.url.clone()).count(count);
                let result = self.get_feed(&params).await;
                (request, result)
            })
            .buffered(width)
            .collect()
            .await;

        let mut feeds = Vec::new();
        let mut errors = Vec::new();

        for (request, result) in outcomes {
            match result {
                Ok(feed) => feeds.push(FeedSuccess {
                    title: request
                        .title
                        .or_else(|| feed.title.clone())
                        .unwrap_or_else(|| request.url.clone()),
                    url: request.url,
                    category: request.category,
                    link: feed.link,
                    description: feed.description,
                    items: feed.items,
                }),
                Err(e) => {
                    tracing::warn!(url = %request.url, error = %e, "Failed to fetch feed in batch");
                    errors.push(FeedFailure {
                        title: request.title.unwrap_or_else(|| request.url.clone()),
                        url: request.url,
                        error: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            total = total,
            successful = feeds.len(),
            failed = errors.len(),
            "Batch complete"
        );

        BatchSummary {
            total,
            successful: feeds.len(),
            failed: errors.len(),
            feeds,
            errors,
        }
    }
}
