use crate::config::ScopeConfig;
use crate::url::domain::{extract_domain, same_origin_host};
use crate::ConfigError;
use regex::Regex;
use url::Url;

/// Outcome of checking a URL against the crawl scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeDecision {
    /// The URL may be fetched
    Accept,
    /// Page on a host outside the crawl scope: recorded, never fetched
    External,
    /// Rejected by the include/exclude filters
    Filtered,
}

impl ScopeDecision {
    pub fn should_fetch(&self) -> bool {
        matches!(self, Self::Accept)
    }
}

/// Decides which discovered URLs are crawled
///
/// Pages are crawled on the seed host (and `allowed-domains`); with
/// `same-host-only = false` any host is crawled. Assets may come from any
/// host unless `external-assets = false`. The include/exclude regexes apply to
/// both.
#[derive(Debug, Clone)]
pub struct CrawlScope {
    seed: Url,
    same_host_only: bool,
    allowed_domains: Vec<String>,
    external_assets: bool,
    include: Option<Regex>,
    exclude: Option<Regex>,
}

impl CrawlScope {
    /// Builds the scope for a crawl starting at `seed`
    pub fn new(seed: Url, config: &ScopeConfig) -> Result<Self, ConfigError> {
        let compile = |pattern: &Option<String>| -> Result<Option<Regex>, ConfigError> {
            pattern
                .as_deref()
                .map(|p| {
                    Regex::new(p).map_err(|e| {
                        ConfigError::InvalidPattern(format!("Invalid regex '{}': {}", p, e))
                    })
                })
                .transpose()
        };

        Ok(Self {
            seed,
            same_host_only: config.same_host_only,
            allowed_domains: config
                .allowed_domains
                .iter()
                .map(|d| d.to_lowercase())
                .collect(),
            external_assets: config.external_assets,
            include: compile(&config.include)?,
            exclude: compile(&config.exclude)?,
        })
    }

    /// Scope that accepts everything on the seed host and assets from anywhere
    pub fn same_host(seed: Url) -> Self {
        Self {
            seed,
            same_host_only: true,
            allowed_domains: Vec::new(),
            external_assets: true,
            include: None,
            exclude: None,
        }
    }

    /// Checks a URL that would be crawled as a page
    pub fn check_page(&self, url: &Url) -> ScopeDecision {
        if !self.passes_filters(url) {
            return ScopeDecision::Filtered;
        }
        if self.same_host_only && !self.is_internal(url) {
            return ScopeDecision::External;
        }
        ScopeDecision::Accept
    }

    /// Checks a URL that would be downloaded as an asset
    pub fn check_asset(&self, url: &Url) -> ScopeDecision {
        if !self.passes_filters(url) {
            return ScopeDecision::Filtered;
        }
        if !self.external_assets && !self.is_internal(url) {
            return ScopeDecision::External;
        }
        ScopeDecision::Accept
    }

    /// True for the seed host and any allowed domain pattern
    pub fn is_internal(&self, url: &Url) -> bool {
        if same_origin_host(url, &self.seed) {
            return true;
        }
        match extract_domain(url) {
            Some(domain) => self
                .allowed_domains
                .iter()
                .any(|pattern| matches_wildcard(pattern, &domain)),
            None => false,
        }
    }

    fn passes_filters(&self, url: &Url) -> bool {
        if let Some(include) = &self.include {
            if !include.is_match(url.as_str()) {
                return false;
            }
        }
        if let Some(exclude) = &self.exclude {
            if exclude.is_match(url.as_str()) {
                return false;
            }
        }
        true
    }
}

/// Checks if a domain matches a wildcard pattern
///
/// `example.com` matches only itself; `*.example.com` matches the bare domain
/// and any subdomain at any depth.
///
/// ```
/// use site_mirror::url::matches_wildcard;
///
/// assert!(matches_wildcard("*.example.com", "example.com"));
/// assert!(matches_wildcard("*.example.com", "cdn.assets.example.com"));
/// assert!(!matches_wildcard("*.example.com", "myexample.com"));
/// ```
pub fn matches_wildcard(pattern: &str, candidate: &str) -> bool {
    match pattern.strip_prefix("*.") {
        Some(base) => candidate == base || candidate.ends_with(&format!(".{}", base)),
        None => candidate == pattern,
    }
}
