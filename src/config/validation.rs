use crate::config::types::{
    Config, CrawlerConfig, OutputConfig, RetryConfig, ScopeConfig, UserAgentConfig,
};
use crate::ConfigError;
use regex::Regex;
use url::Url;

/// Largest accepted `max-depth`
pub const MAX_DEPTH_LIMIT: u32 = 10;

/// Accepted range for `max-retries`
pub const RETRIES_RANGE: std::ops::RangeInclusive<u32> = 1..=5;

/// Validates the entire configuration
///
/// Runs before any network activity; a run never starts with a config that
/// fails here.
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_retry_config(&config.retry)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_output_config(&config.output)?;
    validate_scope_config(&config.scope)?;
    Ok(())
}

/// Validates crawler configuration, including the seed URL
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    validate_seed_url(&config.seed_url)?;

    if config.max_depth > MAX_DEPTH_LIMIT {
        return Err(ConfigError::Validation(format!(
            "max_depth must be between 0 and {}, got {}",
            MAX_DEPTH_LIMIT, config.max_depth
        )));
    }

    if !RETRIES_RANGE.contains(&config.max_retries) {
        return Err(ConfigError::Validation(format!(
            "max_retries must be between {} and {}, got {}",
            RETRIES_RANGE.start(),
            RETRIES_RANGE.end(),
            config.max_retries
        )));
    }

    if config.max_concurrency < 1 || config.max_concurrency > 100 {
        return Err(ConfigError::Validation(format!(
            "max_concurrency must be between 1 and 100, got {}",
            config.max_concurrency
        )));
    }

    if config.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "request_timeout must be at least 1 second".to_string(),
        ));
    }

    if config.connect_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "connect_timeout must be at least 1 second".to_string(),
        ));
    }

    if config.max_body_bytes < 1024 {
        return Err(ConfigError::Validation(format!(
            "max_body_bytes must be >= 1024, got {}",
            config.max_body_bytes
        )));
    }

    Ok(())
}

/// Validates a seed URL: present, parsable, HTTP(S) with a host
pub fn validate_seed_url(seed: &str) -> Result<(), ConfigError> {
    if seed.trim().is_empty() {
        return Err(ConfigError::Validation(
            "seed_url cannot be empty".to_string(),
        ));
    }

    let url = Url::parse(seed.trim())
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid seed URL '{}': {}", seed, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "Seed URL '{}' must use http or https",
            seed
        )));
    }

    if url.host_str().is_none() {
        return Err(ConfigError::InvalidUrl(format!(
            "Seed URL '{}' has no host",
            seed
        )));
    }

    Ok(())
}

fn validate_retry_config(config: &RetryConfig) -> Result<(), ConfigError> {
    if config.base_delay_ms > config.max_delay_ms {
        return Err(ConfigError::Validation(format!(
            "base_delay_ms ({}) cannot exceed max_delay_ms ({})",
            config.base_delay_ms, config.max_delay_ms
        )));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    if let Some(contact_url) = &config.contact_url {
        Url::parse(contact_url)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;
    }

    Ok(())
}

fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.output_root.trim().is_empty() {
        return Err(ConfigError::Validation(
            "output_root cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_scope_config(config: &ScopeConfig) -> Result<(), ConfigError> {
    for pattern in &config.allowed_domains {
        validate_domain_pattern(pattern)?;
    }

    for (name, pattern) in [("include", &config.include), ("exclude", &config.exclude)] {
        if let Some(pattern) = pattern {
            Regex::new(pattern).map_err(|e| {
                ConfigError::InvalidPattern(format!("Invalid {} regex '{}': {}", name, pattern, e))
            })?;
        }
    }

    Ok(())
}

/// Validates a domain pattern (supports wildcards)
fn validate_domain_pattern(pattern: &str) -> Result<(), ConfigError> {
    if pattern.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Domain pattern cannot be empty".to_string(),
        ));
    }

    match pattern.strip_prefix("*.") {
        Some(domain) => validate_domain_string(domain),
        None => validate_domain_string(pattern),
    }
}

/// Validates a domain string (without wildcard prefix)
fn validate_domain_string(domain: &str) -> Result<(), ConfigError> {
    if domain.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Domain cannot be empty".to_string(),
        ));
    }

    if !domain
        .chars()
        .all(|c| c.is_alphanumeric() || c == '.' || c == '-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' contains invalid characters",
            domain
        )));
    }

    if domain.starts_with('.')
        || domain.ends_with('.')
        || domain.starts_with('-')
        || domain.ends_with('-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' cannot start or end with '.' or '-'",
            domain
        )));
    }

    if domain.contains("..") {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' cannot contain consecutive dots",
            domain
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        let mut config = Config::default();
        config.crawler.seed_url = "https://example.com/".to_string();
        config
    }

    #[test]
    fn test_default_with_seed_is_valid() {
        assert!(validate(&valid_config()).is_ok());
    }

    #[test]
    fn test_missing_seed_rejected() {
        let config = Config::default();
        assert!(matches!(
            validate(&config),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_seed_scheme_rejected() {
        assert!(validate_seed_url("ftp://example.com/").is_err());
        assert!(validate_seed_url("not a url").is_err());
        assert!(validate_seed_url("http://example.com").is_ok());
    }

    #[test]
    fn test_depth_range() {
        let mut config = valid_config();
        config.crawler.max_depth = 0;
        assert!(validate(&config).is_ok());
        config.crawler.max_depth = 10;
        assert!(validate(&config).is_ok());
        config.crawler.max_depth = 11;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_retries_range() {
        let mut config = valid_config();
        config.crawler.max_retries = 0;
        assert!(validate(&config).is_err());
        config.crawler.max_retries = 1;
        assert!(validate(&config).is_ok());
        config.crawler.max_retries = 5;
        assert!(validate(&config).is_ok());
        config.crawler.max_retries = 6;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_concurrency_range() {
        let mut config = valid_config();
        config.crawler.max_concurrency = 0;
        assert!(validate(&config).is_err());
        config.crawler.max_concurrency = 101;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_backoff_order() {
        let mut config = valid_config();
        config.retry.base_delay_ms = 20_000;
        config.retry.max_delay_ms = 1_000;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_invalid_regex_rejected() {
        let mut config = valid_config();
        config.scope.exclude = Some("([".to_string());
        assert!(matches!(
            validate(&config),
            Err(ConfigError::InvalidPattern(_))
        ));
    }

    #[test]
    fn test_validate_domain_pattern() {
        assert!(validate_domain_pattern("example.com").is_ok());
        assert!(validate_domain_pattern("*.example.com").is_ok());
        assert!(validate_domain_pattern("localhost").is_ok());

        assert!(validate_domain_pattern("").is_err());
        assert!(validate_domain_pattern("*.").is_err());
        assert!(validate_domain_pattern(".example.com").is_err());
        assert!(validate_domain_pattern("example.com.").is_err());
        assert!(validate_domain_pattern("exa mple.com").is_err());
    }
}
