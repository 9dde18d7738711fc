//! Output module for run artifacts
//!
//! This module handles:
//! - Accumulating mirror entries and writing `sitemap.txt` / `analysis.json`
//! - Content analysis of pages and scripts
//! - The `site_archive.zip` archive
//! - Console statistics

pub mod analysis;
mod archive;
mod report;
pub mod stats;

pub use analysis::{analyze_page, analyze_script, PageInsights};
pub use archive::{create_archive, ARCHIVE_FILE};
pub use report::{
    Analysis, ExternalLink, FailureRecord, MirrorEntry, ProcessingSummary, RedirectRecord, Report,
    ReportBuilder, ANALYSIS_FILE, SITEMAP_FILE,
};
pub use stats::{print_statistics, RunStatistics};
