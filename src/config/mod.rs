//! Configuration module
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Every key has a default, so a run can be started from command-line flags alone.
//!
//! # Example
//!
//! ```no_run
//! use site_mirror::config::{load_config, validate};
//! use std::path::Path;
//!
//! let mut config = load_config(Path::new("mirror.toml")).unwrap();
//! config.crawler.seed_url = "https://example.com/".to_string();
//! validate(&config).unwrap();
//! println!("Crawler will use max depth: {}", config.crawler.max_depth);
//! ```

mod defaults;
mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, CrawlRequest, CrawlerConfig, OutputConfig, RetryConfig, ScopeConfig, UserAgentConfig,
};

// Re-export parser functions
pub use parser::{
    compute_config_hash, load_config, load_config_with_hash, load_validated_config, parse_config,
};
pub use validation::{validate, validate_seed_url, MAX_DEPTH_LIMIT, RETRIES_RANGE};
