use crate::config::defaults::*;
use crate::config::validation::validate;
use crate::ConfigError;
use serde::{Deserialize, Serialize};

/// Main configuration structure for a mirror run
///
/// Every section is optional in the TOML file; missing values fall back to
/// the defaults in `config::defaults`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(rename = "user-agent", default)]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub scope: ScopeConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CrawlerConfig {
    /// URL the crawl starts from (depth 0)
    #[serde(rename = "seed-url", default)]
    pub seed_url: String,

    /// Maximum link depth to crawl from the seed URL (0-10)
    #[serde(rename = "max-depth", default = "default_max_depth")]
    pub max_depth: u32,

    /// Maximum fetch attempts per resource (1-5)
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    /// Maximum number of concurrent fetches
    #[serde(rename = "max-concurrency", default = "default_max_concurrency")]
    pub max_concurrency: u32,

    /// Per-request timeout in seconds
    #[serde(rename = "request-timeout", default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Connection establishment timeout in seconds
    #[serde(rename = "connect-timeout", default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Response bodies larger than this are truncated
    #[serde(rename = "max-body-bytes", default = "default_max_body_bytes")]
    pub max_body_bytes: u64,

    /// Queue `url(...)` references found in downloaded stylesheets
    #[serde(rename = "scan-stylesheets", default = "default_true")]
    pub scan_stylesheets: bool,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            seed_url: String::new(),
            max_depth: default_max_depth(),
            max_retries: default_max_retries(),
            max_concurrency: default_max_concurrency(),
            request_timeout_secs: default_request_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            max_body_bytes: default_max_body_bytes(),
            scan_stylesheets: true,
        }
    }
}

/// Backoff between fetch attempts
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetryConfig {
    /// Delay before the second attempt; doubles for each following attempt
    #[serde(rename = "base-delay-ms", default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Ceiling for the exponential part of the delay
    #[serde(rename = "max-delay-ms", default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Upper bound of the uniform random jitter added to each delay
    #[serde(rename = "jitter-ms", default = "default_jitter_ms")]
    pub jitter_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter_ms: default_jitter_ms(),
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name", default = "default_crawler_name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version", default = "default_crawler_version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url", default)]
    pub contact_url: Option<String>,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: default_crawler_name(),
            crawler_version: default_crawler_version(),
            contact_url: None,
        }
    }
}

impl UserAgentConfig {
    /// Formats the User-Agent header value: `Name/Version (+ContactURL)`
    pub fn header_value(&self) -> String {
        match &self.contact_url {
            Some(contact) => format!(
                "{}/{} (+{})",
                self.crawler_name, self.crawler_version, contact
            ),
            None => format!("{}/{}", self.crawler_name, self.crawler_version),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    /// Directory under which the timestamped run directory is created
    #[serde(rename = "output-root", default = "default_output_root")]
    pub output_root: String,

    /// Keep `processed/` after the archive has been written
    #[serde(rename = "keep-processed", default = "default_true")]
    pub keep_processed: bool,

    /// Rewrite same-host links in the `src/` copy to local relative paths
    #[serde(rename = "rewrite-links", default = "default_true")]
    pub rewrite_links: bool,

    /// Run the beautify/minify/deobfuscate pipeline after the crawl
    #[serde(default = "default_true")]
    pub process: bool,

    /// Write `site_archive.zip` at the end of the run
    #[serde(default = "default_true")]
    pub archive: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            output_root: default_output_root(),
            keep_processed: true,
            rewrite_links: true,
            process: true,
            archive: true,
        }
    }
}

/// Which URLs may be crawled as pages or downloaded as assets
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScopeConfig {
    /// Only crawl pages on the seed URL's host (plus `allowed-domains`)
    #[serde(rename = "same-host-only", default = "default_true")]
    pub same_host_only: bool,

    /// Additional domain patterns whose pages are crawled ("example.com" or "*.example.com")
    #[serde(rename = "allowed-domains", default)]
    pub allowed_domains: Vec<String>,

    /// Download assets hosted on other domains (CDNs, font hosts)
    #[serde(rename = "external-assets", default = "default_true")]
    pub external_assets: bool,

    /// Only URLs matching this regex are fetched
    #[serde(default)]
    pub include: Option<String>,

    /// URLs matching this regex are never fetched
    #[serde(default)]
    pub exclude: Option<String>,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            same_host_only: true,
            allowed_domains: Vec::new(),
            external_assets: true,
            include: None,
            exclude: None,
        }
    }
}

/// The start command issued by a front-end
///
/// Carries the handful of settings an operator picks per run; everything
/// else comes from the base configuration.
#[derive(Debug, Clone)]
pub struct CrawlRequest {
    pub seed_url: String,
    pub output_root: String,
    pub max_depth: u32,
    pub max_retries: u32,
    pub keep_processed: bool,
}

impl CrawlRequest {
    /// The request that leaves `config` unchanged
    pub fn from_config(config: &Config) -> Self {
        Self {
            seed_url: config.crawler.seed_url.clone(),
            output_root: config.output.output_root.clone(),
            max_depth: config.crawler.max_depth,
            max_retries: config.crawler.max_retries,
            keep_processed: config.output.keep_processed,
        }
    }

    /// Applies the request on top of `base`
    pub fn apply(self, mut base: Config) -> Config {
        base.crawler.seed_url = self.seed_url;
        base.crawler.max_depth = self.max_depth;
        base.crawler.max_retries = self.max_retries;
        base.output.output_root = self.output_root;
        base.output.keep_processed = self.keep_processed;
        base
    }

    /// Applies the request and validates the effective configuration
    ///
    /// An out-of-range depth or retry count is rejected here, before a
    /// crawler is built or anything is fetched.
    pub fn into_config(self, base: Config) -> Result<Config, ConfigError> {
        let config = self.apply(base);
        validate(&config)?;
        Ok(config)
    }
}
