//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with proper user agent strings
//! - Manual redirect handling with a hop limit and scope check
//! - Streaming bodies with a size cap
//! - Content-Type fallback from the URL extension
//! - Error classification
//!
//! The fetcher never retries; retrying is the coordinator's job.

use crate::config::{CrawlerConfig, UserAgentConfig};
use crate::crawler::scheduler::{CrawlTask, TaskClaims, TaskKind};
use crate::state::{ContentKind, ResourceStatus};
use crate::url::{normalize, CrawlScope};
use async_trait::async_trait;
use reqwest::{header, redirect::Policy, Client, Response};
use std::time::Duration;
use url::Url;

/// Maximum number of redirect hops followed for one request
pub const MAX_REDIRECTS: usize = 5;

/// Classified outcome of one fetch attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// 2xx response with its (possibly truncated) body
    Success {
        status: u16,
        content_type: Option<String>,
        bytes: Vec<u8>,
        truncated: bool,
    },

    /// Redirect to a URL outside the crawl scope; not followed
    Redirect { new_url: Url },

    /// Redirect to a URL this run already scheduled or fetched; not followed
    RedirectToVisited { new_url: Url },

    /// HTTP 4xx
    ClientError { status: u16 },

    /// HTTP 5xx
    ServerError { status: u16 },

    /// Connection, DNS, TLS or redirect-chain failure
    NetworkFailure { reason: String },

    /// Request exceeded the configured timeout
    Timeout,
}

impl FetchOutcome {
    /// Maps the outcome to the status recorded in the report
    pub fn status(&self) -> ResourceStatus {
        match self {
            Self::Success { .. } => ResourceStatus::Success,
            Self::Redirect { new_url } | Self::RedirectToVisited { new_url } => {
                ResourceStatus::Redirect(new_url.to_string())
            }
            Self::ClientError { status } => ResourceStatus::ClientError(*status),
            Self::ServerError { status } => ResourceStatus::ServerError(*status),
            Self::NetworkFailure { reason } => ResourceStatus::NetworkFailure(reason.clone()),
            Self::Timeout => ResourceStatus::Timeout,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.status().is_retryable()
    }
}

/// What a single fetch returns: where it ended up and how
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    /// URL after in-scope redirects
    pub final_url: Url,
    pub outcome: FetchOutcome,
}

impl FetchResponse {
    pub fn new(final_url: Url, outcome: FetchOutcome) -> Self {
        Self { final_url, outcome }
    }
}

/// Terminal result of a task after all retry attempts
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub task: CrawlTask,
    pub final_url: Url,
    /// Number of attempts made (at least 1)
    pub attempts: u32,
    pub outcome: FetchOutcome,
}

/// Decides whether an in-scope redirect target may be followed
///
/// A target is claimed in the run's visited set before the hop is taken, so
/// the resource behind it is fetched by one task only.
pub trait RedirectGuard: Send + Sync {
    /// Returns true if this fetch owns the target and may follow it
    fn claim(&self, target: &Url) -> bool;
}

impl RedirectGuard for TaskClaims<'_> {
    fn claim(&self, target: &Url) -> bool {
        TaskClaims::claim(self, target)
    }
}

/// Anything that can retrieve a URL
///
/// `HttpFetcher` is the production implementation; tests and alternate
/// front-ends (a headless browser, a cache) implement it as well.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Performs one fetch attempt
    ///
    /// # Arguments
    ///
    /// * `url` - Normalized URL to fetch
    /// * `kind` - Whether the URL is fetched as a page or as an asset; decides
    ///   which scope rules apply to redirect targets
    /// * `guard` - Claims in-scope redirect targets before they are followed
    async fn fetch(
        &self,
        url: &Url,
        kind: TaskKind,
        guard: &dyn RedirectGuard,
    ) -> FetchResponse;
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `user_agent` - The user agent configuration
/// * `crawler` - Timeouts are taken from the crawler configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use site_mirror::config::{CrawlerConfig, UserAgentConfig};
/// use site_mirror::crawler::build_http_client;
///
/// let client = build_http_client(&UserAgentConfig::default(), &CrawlerConfig::default()).unwrap();
/// ```
pub fn build_http_client(
    user_agent: &UserAgentConfig,
    crawler: &CrawlerConfig,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent.header_value())
        .timeout(Duration::from_secs(crawler.request_timeout_secs))
        .connect_timeout(Duration::from_secs(crawler.connect_timeout_secs))
        .redirect(Policy::none()) // Handle redirects manually
        .gzip(true)
        .brotli(true)
        .build()
}

/// reqwest-backed fetcher
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    scope: CrawlScope,
    max_body_bytes: u64,
}

impl HttpFetcher {
    pub fn new(client: Client, scope: CrawlScope, max_body_bytes: u64) -> Self {
        Self {
            client,
            scope,
            max_body_bytes,
        }
    }

    /// Builds the client from configuration
    pub fn from_config(
        user_agent: &UserAgentConfig,
        crawler: &CrawlerConfig,
        scope: CrawlScope,
    ) -> Result<Self, reqwest::Error> {
        let client = build_http_client(user_agent, crawler)?;
        Ok(Self::new(client, scope, crawler.max_body_bytes))
    }

    fn in_scope(&self, url: &Url, kind: TaskKind) -> bool {
        match kind {
            TaskKind::Page => self.scope.check_page(url).should_fetch(),
            TaskKind::Asset(_) => self.scope.check_asset(url).should_fetch(),
        }
    }

    /// Reads the body chunk by chunk, stopping at the size cap
    async fn read_body(&self, mut response: Response) -> Result<(Vec<u8>, bool), reqwest::Error> {
        let cap = self.max_body_bytes as usize;
        let mut bytes = Vec::new();
        let mut truncated = false;

        while let Some(chunk) = response.chunk().await? {
            let room = cap.saturating_sub(bytes.len());
            if chunk.len() > room {
                bytes.extend_from_slice(&chunk[..room]);
                truncated = true;
                break;
            }
            bytes.extend_from_slice(&chunk);
        }

        Ok((bytes, truncated))
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    /// Fetches a URL, following in-scope redirects
    ///
    /// # Request Flow
    ///
    /// 1. Send GET request
    /// 2. Handle redirects manually (max 5 hops)
    ///    - A repeated URL in the chain is a redirect loop
    ///    - A target outside the crawl scope stops the chain with `Redirect`
    ///    - A target already claimed by the run stops it with `RedirectToVisited`
    /// 3. Classify the final status code
    /// 4. Stream the body up to `max-body-bytes`
    async fn fetch(
        &self,
        url: &Url,
        kind: TaskKind,
        guard: &dyn RedirectGuard,
    ) -> FetchResponse {
        let mut current = url.clone();
        let mut chain: Vec<Url> = vec![current.clone()];

        loop {
            let response = match self.client.get(current.clone()).send().await {
                Ok(response) => response,
                Err(e) => return FetchResponse::new(current, classify_error(&e)),
            };

            let status = response.status();

            if status.is_redirection() {
                if chain.len() > MAX_REDIRECTS {
                    return FetchResponse::new(
                        current,
                        FetchOutcome::NetworkFailure {
                            reason: "too many redirects".to_string(),
                        },
                    );
                }

                let location = match response
                    .headers()
                    .get(header::LOCATION)
                    .and_then(|v| v.to_str().ok())
                {
                    Some(location) => location.to_string(),
                    None => {
                        return FetchResponse::new(
                            current,
                            FetchOutcome::NetworkFailure {
                                reason: format!("HTTP {} without Location header", status.as_u16()),
                            },
                        )
                    }
                };

                let next = match normalize(&location, Some(&current)) {
                    Ok(next) => next,
                    Err(e) => {
                        return FetchResponse::new(
                            current,
                            FetchOutcome::NetworkFailure {
                                reason: format!("invalid redirect target: {}", e),
                            },
                        )
                    }
                };

                if chain.contains(&next) {
                    return FetchResponse::new(
                        current,
                        FetchOutcome::NetworkFailure {
                            reason: "redirect loop".to_string(),
                        },
                    );
                }

                if !self.in_scope(&next, kind) {
                    tracing::debug!("Redirect {} -> {} leaves crawl scope", current, next);
                    return FetchResponse::new(current, FetchOutcome::Redirect { new_url: next });
                }

                if !guard.claim(&next) {
                    tracing::debug!("Redirect {} -> {} reaches a visited URL", current, next);
                    return FetchResponse::new(
                        current,
                        FetchOutcome::RedirectToVisited { new_url: next },
                    );
                }

                tracing::debug!("Following redirect {} -> {}", current, next);
                chain.push(next.clone());
                current = next;
                continue;
            }

            if status.is_client_error() {
                return FetchResponse::new(
                    current,
                    FetchOutcome::ClientError {
                        status: status.as_u16(),
                    },
                );
            }

            if status.is_server_error() {
                return FetchResponse::new(
                    current,
                    FetchOutcome::ServerError {
                        status: status.as_u16(),
                    },
                );
            }

            if !status.is_success() {
                return FetchResponse::new(
                    current,
                    FetchOutcome::NetworkFailure {
                        reason: format!("unexpected HTTP status {}", status.as_u16()),
                    },
                );
            }

            let header_type = response
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.to_string());
            let content_type = resolve_content_type(header_type, &current);

            return match self.read_body(response).await {
                Ok((bytes, truncated)) => {
                    if truncated {
                        tracing::warn!(
                            "Body of {} exceeds {} bytes, truncated",
                            current,
                            self.max_body_bytes
                        );
                    }
                    FetchResponse::new(
                        current,
                        FetchOutcome::Success {
                            status: status.as_u16(),
                            content_type,
                            bytes,
                            truncated,
                        },
                    )
                }
                Err(e) => FetchResponse::new(current, classify_error(&e)),
            };
        }
    }
}

/// Maps a reqwest error to an outcome
fn classify_error(error: &reqwest::Error) -> FetchOutcome {
    if error.is_timeout() {
        FetchOutcome::Timeout
    } else if error.is_connect() {
        FetchOutcome::NetworkFailure {
            reason: "connection failed".to_string(),
        }
    } else {
        FetchOutcome::NetworkFailure {
            reason: error.to_string(),
        }
    }
}

/// Keeps a specific Content-Type header, otherwise guesses from the URL
///
/// Generic types (`application/octet-stream`, `text/plain`) and a missing
/// header are replaced by the type guessed from the path extension, if any.
pub fn resolve_content_type(header_value: Option<String>, url: &Url) -> Option<String> {
    let specific = header_value
        .as_deref()
        .and_then(ContentKind::from_content_type)
        .is_some();
    if specific {
        return header_value;
    }

    mime_guess::from_path(url.path())
        .first()
        .map(|mime| mime.essence_str().to_string())
        .or(header_value)
}
