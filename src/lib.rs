//! site-mirror: an offline website mirroring crawler
//!
//! Given a seed URL this crate discovers and downloads pages and their assets
//! up to a bounded depth, writes them into a deterministic on-disk mirror and
//! emits a sitemap, an analysis report and an archive of the run.

pub mod config;
pub mod crawler;
pub mod events;
pub mod mirror;
pub mod output;
pub mod processing;
pub mod state;
pub mod url;

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for mirror runs
///
/// Only configuration problems and output that cannot be written end a run;
/// everything that goes wrong for a single URL is recorded and the run continues.
#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Output directory {path} is not writable: {source}")]
    OutputUnwritable {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write {url}: {source}")]
    WriteFailed {
        url: String,
        source: std::io::Error,
    },

    #[error("Invalid run state transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: state::RunStatus,
        to: state::RunStatus,
    },

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("Report serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid domain pattern: {0}")]
    InvalidPattern(String),
}

/// URL-specific errors
///
/// `Parse` is the malformed-reference case: the crawler logs it and skips the
/// reference.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Result type alias for mirror operations
pub type Result<T> = std::result::Result<T, MirrorError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{CrawlHandle, CrawlOutcome, Crawler};
pub use events::{EventLevel, ProgressEvent};
pub use state::{ContentKind, ResourceStatus, RunStatus};
pub use crate::url::{normalize, normalize_url};
