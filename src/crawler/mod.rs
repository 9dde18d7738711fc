//! Crawler module for fetching and mirroring a site
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with manual redirects and a body size cap
//! - Reference extraction from HTML, CSS and JavaScript
//! - The frontier (FIFO queue plus visited set) and retry policy
//! - Overall crawl coordination with a bounded worker pool

mod coordinator;
mod extractor;
mod fetcher;
mod retry;
mod scheduler;

pub use coordinator::{CrawlHandle, CrawlOutcome, Crawler};
pub use extractor::{extract, parse_srcset, ExtractedRef, ExtractedRefs};
pub use fetcher::{
    build_http_client, resolve_content_type, FetchOutcome, FetchResponse, FetchResult,
    HttpFetcher, PageFetcher, RedirectGuard, MAX_REDIRECTS,
};
pub use retry::RetryPolicy;
pub use scheduler::{Admission, CrawlTask, Frontier, TaskClaims, TaskKind};
