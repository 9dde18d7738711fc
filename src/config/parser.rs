use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// Missing sections and keys fall back to their defaults, so an empty file
/// is a valid configuration apart from the seed URL, which must be supplied
/// either here or on the command line before `validate` is called.
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded configuration
/// * `Err(ConfigError)` - Failed to read or parse the configuration
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parses configuration from a TOML string
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    Ok(config)
}

/// Loads a configuration file and validates it
pub fn load_validated_config(path: &Path) -> Result<Config, ConfigError> {
    let config = load_config(path)?;
    validate(&config)?;
    Ok(config)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// The hash is recorded in `analysis.json` so two runs can be compared.
///
/// # Returns
///
/// * `Ok(String)` - Hex-encoded SHA-256 hash of the file content
/// * `Err(ConfigError)` - Failed to read the file
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let result = hasher.finalize();
    Ok(hex::encode(result))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_valid_config() {
        let config_content = r#"
[crawler]
seed-url = "https://example.com/"
max-depth = 3
max-retries = 2
max-concurrency = 10

[retry]
base-delay-ms = 100

[user-agent]
crawler-name = "TestMirror"
crawler-version = "1.0"
contact-url = "https://example.com/about"

[output]
output-root = "./out"
keep-processed = false

[scope]
allowed-domains = ["*.example.com"]
exclude = "\\.pdf$"
"#;

        let file = create_temp_config(config_content);
        let config = load_validated_config(file.path()).unwrap();

        assert_eq!(config.crawler.max_depth, 3);
        assert_eq!(config.crawler.max_retries, 2);
        assert_eq!(config.crawler.max_concurrency, 10);
        assert_eq!(config.retry.base_delay_ms, 100);
        assert_eq!(config.retry.max_delay_ms, 10_000);
        assert_eq!(config.user_agent.crawler_name, "TestMirror");
        assert!(!config.output.keep_processed);
        assert!(config.output.archive);
        assert_eq!(config.scope.allowed_domains.len(), 1);
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let file = create_temp_config("");
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.crawler.max_depth, 2);
        assert_eq!(config.crawler.max_retries, 3);
        assert!(config.scope.same_host_only);
        assert_eq!(config.output.output_root, "downloaded_site");
    }

    #[test]
    fn test_load_config_with_invalid_path() {
        let result = load_config(Path::new("/nonexistent/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_with_invalid_toml() {
        let config_content = "this is not valid TOML {{{";
        let file = create_temp_config(config_content);
        let result = load_config(file.path());
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_config_with_validation_error() {
        let config_content = r#"
[crawler]
seed-url = "https://example.com/"
max-depth = 11
"#;

        let file = create_temp_config(config_content);
        let result = load_validated_config(file.path());
        assert!(matches!(result.unwrap_err(), ConfigError::Validation(_)));
    }

    #[test]
    fn test_compute_config_hash() {
        let file = create_temp_config("test content");

        let hash1 = compute_config_hash(file.path()).unwrap();
        let hash2 = compute_config_hash(file.path()).unwrap();

        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64);
    }

    #[test]
    fn test_different_content_different_hash() {
        let file1 = create_temp_config("content 1");
        let file2 = create_temp_config("content 2");

        let hash1 = compute_config_hash(file1.path()).unwrap();
        let hash2 = compute_config_hash(file2.path()).unwrap();

        assert_ne!(hash1, hash2);
    }
}
