//! URL handling module
//!
//! This module provides URL normalization, reference resolution, host
//! naming for the mirror tree and the crawl scope rules that decide which
//! discovered URLs are fetched.

mod domain;
mod normalize;
mod scope;

// Re-export main functions
pub use domain::{extract_domain, host_dir_name, same_origin_host};
pub use normalize::{is_ignored_reference, normalize, normalize_url, resolve_reference};
pub use scope::{matches_wildcard, CrawlScope, ScopeDecision};
