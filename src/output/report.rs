//! Run report: mirror entries, sitemap and `analysis.json`
//!
//! The builder is shared by all workers (behind a mutex) and only ever
//! appended to. `finalize` turns it into an immutable [`Report`].

use crate::mirror::write_atomic;
use crate::output::analysis::{top_keywords, PageInsights};
use crate::state::{ContentKind, ResourceStatus, RunCounters, RunStatus};
use crate::MirrorError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};

/// Name of the sitemap file in the run directory
pub const SITEMAP_FILE: &str = "sitemap.txt";

/// Name of the analysis report in the run directory
pub const ANALYSIS_FILE: &str = "analysis.json";

/// Number of keywords kept in the report
pub const TOP_KEYWORDS: usize = 20;

/// Outcome of one resource, successful or not
#[derive(Debug, Clone, Serialize)]
pub struct MirrorEntry {
    /// Discovery order
    pub seq: u64,
    pub source_url: String,
    pub final_url: String,
    /// Categorized copy relative to the run directory; `None` when nothing was written
    pub local_path: Option<PathBuf>,
    pub byte_size: u64,
    pub content_type: Option<String>,
    pub kind: ContentKind,
    pub depth: u32,
    pub status: ResourceStatus,
    pub attempts: u32,
    pub truncated: bool,
}

/// A page outside the crawl scope that was linked but not crawled
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct ExternalLink {
    pub url: String,
    pub found_on: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RedirectRecord {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailureRecord {
    pub url: String,
    pub status: ResourceStatus,
    pub detail: String,
    pub http_status: Option<u16>,
    pub attempts: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct KeywordCount {
    pub word: String,
    pub count: u64,
}

/// Results of the post-crawl processing stage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProcessingSummary {
    pub processed: usize,
    pub failed: usize,
    pub links_rewritten: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunInfo {
    pub run_id: String,
    pub status: RunStatus,
    pub seed_url: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_secs: f64,
    pub config_hash: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Totals {
    pub resources: u64,
    pub fetched: u64,
    pub failed: u64,
    pub skipped: u64,
    pub bytes: u64,
    pub truncated: u64,
    pub malformed_references: u64,
}

/// Contents of `analysis.json`
#[derive(Debug, Clone, Serialize)]
pub struct Analysis {
    pub run: RunInfo,
    pub totals: Totals,
    pub counts_by_kind: BTreeMap<ContentKind, u64>,
    pub failures_by_status: BTreeMap<String, u64>,
    pub failures: Vec<FailureRecord>,
    pub external_links: Vec<ExternalLink>,
    pub redirects: Vec<RedirectRecord>,
    pub keywords: Vec<KeywordCount>,
    pub metadata: BTreeMap<String, String>,
    pub frontend_frameworks: Vec<String>,
    pub api_endpoints: Vec<String>,
    pub hidden_elements: usize,
    pub inline_scripts: usize,
    pub processing: ProcessingSummary,
}

/// Finished report of a run
#[derive(Debug, Clone)]
pub struct Report {
    /// Successfully fetched pages in discovery order
    pub sitemap: Vec<String>,
    pub analysis: Analysis,
    pub entries: Vec<MirrorEntry>,
}

/// Accumulates everything a run observes
#[derive(Debug)]
pub struct ReportBuilder {
    run_id: String,
    seed_url: String,
    config_hash: Option<String>,
    started_at: DateTime<Utc>,
    entries: Vec<MirrorEntry>,
    externals: BTreeSet<ExternalLink>,
    external_urls: BTreeSet<String>,
    redirects: Vec<RedirectRecord>,
    keyword_counts: HashMap<String, u64>,
    metadata: BTreeMap<String, String>,
    frameworks: BTreeSet<String>,
    api_endpoints: BTreeSet<String>,
    hidden_elements: usize,
    inline_scripts: usize,
    malformed_references: u64,
    processing: ProcessingSummary,
}

impl ReportBuilder {
    pub fn new(
        run_id: impl Into<String>,
        seed_url: impl Into<String>,
        config_hash: Option<String>,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            seed_url: seed_url.into(),
            config_hash,
            started_at,
            entries: Vec::new(),
            externals: BTreeSet::new(),
            external_urls: BTreeSet::new(),
            redirects: Vec::new(),
            keyword_counts: HashMap::new(),
            metadata: BTreeMap::new(),
            frameworks: BTreeSet::new(),
            api_endpoints: BTreeSet::new(),
            hidden_elements: 0,
            inline_scripts: 0,
            malformed_references: 0,
            processing: ProcessingSummary::default(),
        }
    }

    /// Appends the outcome of one resource
    pub fn record(&mut self, entry: MirrorEntry) {
        if let ResourceStatus::Redirect(to) = &entry.status {
            self.record_redirect(&entry.source_url, to);
        }
        self.entries.push(entry);
    }

    /// Records an out-of-scope page; each URL is kept once
    pub fn record_external(&mut self, url: &str, found_on: &str) {
        if self.external_urls.insert(url.to_string()) {
            self.externals.insert(ExternalLink {
                url: url.to_string(),
                found_on: found_on.to_string(),
            });
        }
    }

    pub fn record_redirect(&mut self, from: &str, to: &str) {
        let record = RedirectRecord {
            from: from.to_string(),
            to: to.to_string(),
        };
        if !self.redirects.contains(&record) {
            self.redirects.push(record);
        }
    }

    pub fn record_page_insights(&mut self, insights: PageInsights) {
        for (word, count) in insights.keywords {
            *self.keyword_counts.entry(word).or_insert(0) += count;
        }
        self.metadata.extend(insights.meta);
        self.frameworks.extend(insights.frameworks);
        self.api_endpoints.extend(insights.api_endpoints);
        self.hidden_elements += insights.hidden_elements;
        self.inline_scripts += insights.inline_scripts;
    }

    pub fn record_api_endpoints(&mut self, endpoints: impl IntoIterator<Item = String>) {
        self.api_endpoints.extend(endpoints);
    }

    pub fn record_frameworks(&mut self, frameworks: impl IntoIterator<Item = String>) {
        self.frameworks.extend(frameworks);
    }

    pub fn record_malformed_reference(&mut self) {
        self.malformed_references += 1;
    }

    pub fn set_processing(&mut self, processing: ProcessingSummary) {
        self.processing = processing;
    }

    pub fn entries(&self) -> &[MirrorEntry] {
        &self.entries
    }

    /// Builds the final report
    pub fn finalize(&self, status: RunStatus, counters: RunCounters) -> Report {
        let finished_at = Utc::now();

        let mut entries = self.entries.clone();
        entries.sort_by_key(|e| e.seq);

        let mut seen = BTreeSet::new();
        let sitemap: Vec<String> = entries
            .iter()
            .filter(|e| e.kind == ContentKind::Page && e.status.is_success())
            .filter(|e| seen.insert(e.source_url.clone()))
            .map(|e| e.source_url.clone())
            .collect();

        let mut counts_by_kind = BTreeMap::new();
        let mut failures_by_status = BTreeMap::new();
        let mut failures = Vec::new();
        let mut totals = Totals {
            resources: entries.len() as u64,
            fetched: counters.fetched,
            failed: counters.failed,
            skipped: counters.skipped,
            malformed_references: self.malformed_references,
            ..Totals::default()
        };

        for entry in &entries {
            if entry.status.is_success() {
                *counts_by_kind.entry(entry.kind).or_insert(0) += 1;
                totals.bytes += entry.byte_size;
                if entry.truncated {
                    totals.truncated += 1;
                }
            } else if entry.status.is_error() {
                *failures_by_status
                    .entry(entry.status.as_str().to_string())
                    .or_insert(0) += 1;
                failures.push(FailureRecord {
                    url: entry.source_url.clone(),
                    status: entry.status.clone(),
                    detail: entry.status.detail(),
                    http_status: entry.status.http_status(),
                    attempts: entry.attempts,
                });
            }
        }

        let keywords = top_keywords(&self.keyword_counts, TOP_KEYWORDS)
            .into_iter()
            .map(|(word, count)| KeywordCount { word, count })
            .collect();

        let duration = finished_at - self.started_at;

        let analysis = Analysis {
            run: RunInfo {
                run_id: self.run_id.clone(),
                status,
                seed_url: self.seed_url.clone(),
                started_at: self.started_at,
                finished_at,
                duration_secs: duration.num_milliseconds() as f64 / 1000.0,
                config_hash: self.config_hash.clone(),
            },
            totals,
            counts_by_kind,
            failures_by_status,
            failures,
            external_links: self.externals.iter().cloned().collect(),
            redirects: self.redirects.clone(),
            keywords,
            metadata: self.metadata.clone(),
            frontend_frameworks: self.frameworks.iter().cloned().collect(),
            api_endpoints: self.api_endpoints.iter().cloned().collect(),
            hidden_elements: self.hidden_elements,
            inline_scripts: self.inline_scripts,
            processing: self.processing,
        };

        Report {
            sitemap,
            analysis,
            entries,
        }
    }
}

impl Report {
    /// Writes `sitemap.txt` and `analysis.json` into the run directory
    pub fn write_artifacts(&self, run_dir: &Path) -> Result<(), MirrorError> {
        let mut sitemap = self.sitemap.join("\n");
        if !sitemap.is_empty() {
            sitemap.push('\n');
        }
        write_atomic(&run_dir.join(SITEMAP_FILE), sitemap.as_bytes())?;

        let json = serde_json::to_string_pretty(&self.analysis)?;
        write_atomic(&run_dir.join(ANALYSIS_FILE), json.as_bytes())?;

        tracing::info!(
            "Wrote {} and {} to {:?}",
            SITEMAP_FILE,
            ANALYSIS_FILE,
            run_dir
        );
        Ok(())
    }
}
