//! Page fetching with bounded retries
//!
//! This module handles:
//! - The `PageRenderer` seam (plain HTTP here, a browser session elsewhere)
//! - Building the HTTP renderer with a proper user agent string
//! - Retrying transient failures with exponential backoff
//! - Recording each terminal outcome in the fetch ledger

use crate::config::{CrawlerConfig, UserAgentConfig};
use crate::state::FetchStatus;
use crate::storage::{lock, FetchLedger, SharedStorage};
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors a page renderer can report for one attempt
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("HTTP {status}")]
    Http { status: u16 },

    #[error("Request timeout")]
    Timeout,

    #[error("Network error: {0}")]
    Network(String),

    /// The renderer itself could not be constructed
    #[error("Failed to build page renderer: {0}")]
    Build(String),
}

/// Produces the raw content of a page
#[async_trait]
pub trait PageRenderer: Send + Sync {
    async fn render(&self, url: &str) -> Result<String, RenderError>;
}

/// Renderer backed by plain HTTP GET requests
#[derive(Debug, Clone)]
pub struct HttpRenderer {
    client: Client,
}

impl HttpRenderer {
    /// Builds an HTTP renderer with the crawler's user agent and per-attempt timeout
    ///
    /// # Example
    ///
    /// ```no_run
    /// use roster_harvest::config::{CrawlerConfig, UserAgentConfig};
    /// use roster_harvest::crawler::HttpRenderer;
    ///
    /// let agent = UserAgentConfig {
    ///     crawler_name: "RosterHarvest".to_string(),
    ///     crawler_version: "0.1".to_string(),
    ///     contact_url: "https://example.com/bot".to_string(),
    ///     contact_email: "bot@example.com".to_string(),
    /// };
    ///
    /// let renderer = HttpRenderer::new(&agent, &CrawlerConfig::default()).unwrap();
    /// ```
    pub fn new(agent: &UserAgentConfig, crawler: &CrawlerConfig) -> Result<Self, RenderError> {
        let client = Client::builder()
            .user_agent(user_agent(agent))
            .timeout(Duration::from_secs(crawler.request_timeout_secs))
            .connect_timeout(Duration::from_secs(crawler.request_timeout_secs.min(10)))
            .gzip(true)
            .brotli(true)
            .build()
            .map_err(|e| RenderError::Build(e.to_string()))?;

        Ok(Self { client })
    }
}

/// Formats `CrawlerName/Version (+ContactURL; ContactEmail)`
pub fn user_agent(agent: &UserAgentConfig) -> String {
    format!(
        "{}/{} (+{}; {})",
        agent.crawler_name, agent.crawler_version, agent.contact_url, agent.contact_email
    )
}

#[async_trait]
impl PageRenderer for HttpRenderer {
    async fn render(&self, url: &str) -> Result<String, RenderError> {
        let response = self.client.get(url).send().await.map_err(classify)?;

        let status = response.status();
        if !status.is_success() {
            return Err(RenderError::Http {
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(classify)
    }
}

fn classify(e: reqwest::Error) -> RenderError {
    if e.is_timeout() {
        RenderError::Timeout
    } else {
        RenderError::Network(e.to_string())
    }
}

/// How many times a fetch is attempted and how long to wait in between
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// One time unit; the wait after attempt `n` (0-based) is `base × 2^n`
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self::new(
            config.max_retries,
            Duration::from_millis(config.backoff_base_ms),
        )
    }

    /// Wait after the failed attempt with 0-based index `attempt`
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}

/// Terminal outcome of a fetch
#[derive(Debug)]
pub enum FetchOutcome {
    Success { content: String, attempts: u32 },
    Failed { error: RenderError, attempts: u32 },
}

impl FetchOutcome {
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Success { attempts, .. } | Self::Failed { attempts, .. } => *attempts,
        }
    }

    pub fn status(&self) -> FetchStatus {
        match self {
            Self::Success { .. } => FetchStatus::Success,
            Self::Failed { .. } => FetchStatus::Failed,
        }
    }

    /// Converts into the content or the last error
    pub fn into_result(self) -> Result<String, RenderError> {
        match self {
            Self::Success { content, .. } => Ok(content),
            Self::Failed { error, .. } => Err(error),
        }
    }
}

/// Fetches pages through a renderer, retrying and recording outcomes
#[derive(Clone)]
pub struct PageFetcher {
    renderer: Arc<dyn PageRenderer>,
    storage: SharedStorage,
    policy: RetryPolicy,
}

impl PageFetcher {
    pub fn new(renderer: Arc<dyn PageRenderer>, storage: SharedStorage, policy: RetryPolicy) -> Self {
        Self {
            renderer,
            storage,
            policy,
        }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Fetches `url`, attempting up to `max_attempts` times
    ///
    /// Sleeps `base × 2^attempt` between attempts, never after the last one.
    /// Exactly one ledger entry is written for the terminal outcome; a ledger
    /// write failure is logged and does not change the outcome.
    pub async fn fetch(&self, url: &str) -> FetchOutcome {
        let mut attempt = 0;
        let outcome = loop {
            tracing::debug!(
                "Fetching {} (attempt {}/{})",
                url,
                attempt + 1,
                self.policy.max_attempts
            );

            match self.renderer.render(url).await {
                Ok(content) => {
                    break FetchOutcome::Success {
                        content,
                        attempts: attempt + 1,
                    }
                }
                Err(error) if attempt + 1 >= self.policy.max_attempts => {
                    break FetchOutcome::Failed {
                        error,
                        attempts: attempt + 1,
                    }
                }
                Err(error) => {
                    let wait = self.policy.backoff(attempt);
                    tracing::debug!("Fetch of {} failed ({}), retrying in {:?}", url, error, wait);
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
            }
        };

        if let FetchOutcome::Failed { error, attempts } = &outcome {
            tracing::warn!("Giving up on {} after {} attempts: {}", url, attempts, error);
        }
        self.record(url, &outcome);

        outcome
    }

    fn record(&self, url: &str, outcome: &FetchOutcome) {
        let error = match outcome {
            FetchOutcome::Failed { error, .. } => Some(error.to_string()),
            FetchOutcome::Success { .. } => None,
        };

        let result = lock(&self.storage)
            .and_then(|mut storage| storage.record_fetch(url, outcome.status(), error.as_deref()));
        if let Err(e) = result {
            tracing::warn!("Failed to record fetch of {} in ledger: {}", url, e);
        }
    }
}
