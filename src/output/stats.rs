//! Console statistics for a finished run
//!
//! This module turns a [`Report`] into the summary printed by the CLI.

use crate::output::report::Report;
use crate::state::ContentKind;
use std::collections::BTreeMap;

/// Run statistics summary
#[derive(Debug, Clone)]
pub struct RunStatistics {
    /// Number of resources with an outcome (success or failure)
    pub total_resources: u64,

    /// Stored resources by content kind
    pub resources_by_kind: BTreeMap<ContentKind, u64>,

    /// Pages in the sitemap
    pub pages: u64,

    /// Failure classification and their counts
    pub error_summary: BTreeMap<String, u64>,

    /// Pages linked but outside the crawl scope
    pub external_links: u64,

    /// Bytes written to the categorized tree
    pub total_bytes: u64,
}

impl RunStatistics {
    pub fn from_report(report: &Report) -> Self {
        let analysis = &report.analysis;
        Self {
            total_resources: analysis.totals.resources,
            resources_by_kind: analysis.counts_by_kind.clone(),
            pages: report.sitemap.len() as u64,
            error_summary: analysis.failures_by_status.clone(),
            external_links: analysis.external_links.len() as u64,
            total_bytes: analysis.totals.bytes,
        }
    }

    pub fn stored(&self) -> u64 {
        self.resources_by_kind.values().sum()
    }

    /// Share of resources that were stored, in percent
    pub fn success_rate(&self) -> f64 {
        if self.total_resources > 0 {
            (self.stored() as f64 / self.total_resources as f64) * 100.0
        } else {
            0.0
        }
    }
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &RunStatistics) {
    println!("=== Mirror Statistics ===\n");

    println!("Overview:");
    println!("  Resources attempted: {}", stats.total_resources);
    println!("  Pages mirrored: {}", stats.pages);
    println!("  External links: {}", stats.external_links);
    println!("  Bytes written: {}", stats.total_bytes);
    println!();

    println!("Resources by Kind:");
    // Sort kinds by count (descending)
    let mut kind_counts: Vec<_> = stats.resources_by_kind.iter().collect();
    kind_counts.sort_by(|a, b| b.1.cmp(a.1));

    for (kind, count) in kind_counts {
        let percentage = if stats.total_resources > 0 {
            (*count as f64 / stats.total_resources as f64) * 100.0
        } else {
            0.0
        };
        println!("  {}: {} ({:.1}%)", kind, count, percentage);
    }
    println!();

    if !stats.error_summary.is_empty() {
        println!("Error Summary:");
        let mut error_counts: Vec<_> = stats.error_summary.iter().collect();
        error_counts.sort_by(|a, b| b.1.cmp(a.1));

        for (status, count) in error_counts {
            println!("  {}: {}", status, count);
        }
        println!();
    }

    println!(
        "Success Rate: {:.1}% ({} / {} resources stored)",
        stats.success_rate(),
        stats.stored(),
        stats.total_resources
    );
}
