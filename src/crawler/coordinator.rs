//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the main crawl loop that coordinates all aspects of
//! a mirror run, including:
//! - Allocating the run directory and driving the run state machine
//! - Managing the frontier and a bounded pool of worker tasks
//! - Fetching with retry, storing, extracting and enqueueing references
//! - Cooperative cancellation
//! - Post-crawl link rewriting, processing, report and archive

use crate::config::{validate, Config};
use crate::crawler::extractor::{extract, ExtractedRefs};
use crate::crawler::fetcher::{FetchOutcome, FetchResult, HttpFetcher, PageFetcher};
use crate::crawler::retry::RetryPolicy;
use crate::crawler::scheduler::{Admission, CrawlTask, Frontier, TaskClaims, TaskKind};
use crate::events::{EventSink, ProgressEvent};
use crate::mirror::{rewrite_mirror, MirrorWriter, RewriteTarget};
use crate::output::analysis::detect_frameworks;
use crate::output::{
    analyze_page, analyze_script, create_archive, MirrorEntry, ProcessingSummary, Report,
    ReportBuilder,
};
use crate::processing::{remove_processed, run_pipeline, BasicFormatter, Processor};
use crate::state::{ContentKind, RunIdentity, RunState, RunStatus};
use crate::url::{normalize_url, resolve_reference, CrawlScope, ScopeDecision};
use crate::MirrorError;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinSet;
use url::Url;

/// Control handle for a running crawl
///
/// Cheap to clone; every clone controls the same run.
#[derive(Debug, Clone)]
pub struct CrawlHandle {
    state: Arc<RunState>,
    events: EventSink,
}

impl CrawlHandle {
    /// Requests cancellation
    ///
    /// No new work is dequeued; in-flight fetches finish or time out and the
    /// report is still written. Returns true for the first call only.
    pub fn stop(&self) -> bool {
        let first = self.state.cancel();
        if first {
            self.events
                .warning("Stop requested; waiting for in-flight requests to finish");
        }
        first
    }

    pub fn status(&self) -> RunStatus {
        self.state.status()
    }
}

/// Result of a run that reached `Completed` or `Cancelled`
#[derive(Debug, Clone)]
pub struct CrawlOutcome {
    pub status: RunStatus,
    pub run_id: String,
    pub run_dir: PathBuf,
    pub report: Report,
}

/// Mirrored locations collected for the link rewriting pass
#[derive(Debug, Default)]
struct LinkIndex {
    /// Normalized URL (requested and final) to browsable path
    url_map: HashMap<String, PathBuf>,
    pages: Vec<RewriteTarget>,
    /// Requested URL to the already-mirrored URL it redirects to
    aliases: Vec<(String, String)>,
}

impl LinkIndex {
    /// Points redirecting URLs at the file of their target
    fn resolve_aliases(&mut self) {
        for (from, to) in std::mem::take(&mut self.aliases) {
            if let Some(path) = self.url_map.get(&to).cloned() {
                self.url_map.entry(from).or_insert(path);
            }
        }
    }
}

/// State shared by the coordinator and its workers
struct CrawlContext {
    scope: CrawlScope,
    frontier: Frontier,
    fetcher: Arc<dyn PageFetcher>,
    retry: RetryPolicy,
    scan_stylesheets: bool,
    writer: MirrorWriter,
    report: Mutex<ReportBuilder>,
    links: Mutex<LinkIndex>,
    state: Arc<RunState>,
    events: EventSink,
}

/// Main crawler structure
///
/// Built from a validated configuration, consumed by [`Crawler::run`].
///
/// # Example
///
/// ```no_run
/// use site_mirror::{Config, Crawler};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let mut config = Config::default();
/// config.crawler.seed_url = "https://example.com/".to_string();
///
/// let mut crawler = Crawler::new(config, None)?;
/// let mut events = crawler.subscribe().expect("first subscriber");
/// tokio::spawn(async move {
///     while let Some(event) = events.recv().await {
///         println!("{}", event);
///     }
/// });
///
/// let outcome = crawler.run().await?;
/// println!("Mirror written to {:?}", outcome.run_dir);
/// # Ok(())
/// # }
/// ```
pub struct Crawler {
    config: Arc<Config>,
    config_hash: Option<String>,
    seed: Url,
    scope: CrawlScope,
    fetcher: Arc<dyn PageFetcher>,
    processor: Arc<dyn Processor>,
    state: Arc<RunState>,
    events: EventSink,
    receiver: Option<UnboundedReceiver<ProgressEvent>>,
}

impl Crawler {
    /// Creates a crawler backed by the reqwest fetcher
    ///
    /// # Arguments
    ///
    /// * `config` - Effective configuration (file merged with overrides)
    /// * `config_hash` - Hash of the configuration file, recorded in the report
    ///
    /// # Returns
    ///
    /// * `Ok(Crawler)` - Configuration is valid and the HTTP client was built
    /// * `Err(MirrorError)` - Invalid configuration; nothing was fetched
    pub fn new(config: Config, config_hash: Option<String>) -> Result<Self, MirrorError> {
        validate(&config)?;
        let seed = normalize_url(&config.crawler.seed_url)?;
        let scope = CrawlScope::new(seed, &config.scope)?;
        let fetcher = HttpFetcher::from_config(&config.user_agent, &config.crawler, scope)?;
        Self::with_fetcher(config, config_hash, Arc::new(fetcher))
    }

    /// Creates a crawler with a custom fetcher
    pub fn with_fetcher(
        config: Config,
        config_hash: Option<String>,
        fetcher: Arc<dyn PageFetcher>,
    ) -> Result<Self, MirrorError> {
        validate(&config)?;
        let seed = normalize_url(&config.crawler.seed_url)?;
        let scope = CrawlScope::new(seed.clone(), &config.scope)?;
        let (events, receiver) = EventSink::channel();

        Ok(Self {
            config: Arc::new(config),
            config_hash,
            seed,
            scope,
            fetcher,
            processor: Arc::new(BasicFormatter::default()),
            state: Arc::new(RunState::new()),
            events,
            receiver: Some(receiver),
        })
    }

    /// Replaces the processor used after the crawl
    pub fn with_processor(mut self, processor: Arc<dyn Processor>) -> Self {
        self.processor = processor;
        self
    }

    /// Takes the progress event receiver
    ///
    /// Only the first call returns `Some`. Events that nobody receives are
    /// still logged.
    pub fn subscribe(&mut self) -> Option<UnboundedReceiver<ProgressEvent>> {
        self.receiver.take()
    }

    /// Returns a handle that can stop the run from another task
    pub fn handle(&self) -> CrawlHandle {
        CrawlHandle {
            state: Arc::clone(&self.state),
            events: self.events.clone(),
        }
    }

    pub fn seed(&self) -> &Url {
        &self.seed
    }

    /// Runs the crawl to completion
    ///
    /// 1. Transition `Idle -> Running` and allocate the run directory
    /// 2. Seed the frontier at depth 0
    /// 3. Dequeue tasks FIFO into at most `max-concurrency` workers until the
    ///    frontier is empty and every worker has finished, or a stop is requested
    /// 4. Rewrite links, process text resources, write the report and the archive
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlOutcome)` - The run completed or was cancelled
    /// * `Err(MirrorError)` - The output could not be written; the run failed
    pub async fn run(mut self) -> Result<CrawlOutcome, MirrorError> {
        // Without a subscriber events are only logged
        drop(self.receiver.take());

        self.state.transition(RunStatus::Running)?;
        self.events.info(format!("Starting mirror of {}", self.seed));

        let output_root = Path::new(&self.config.output.output_root);
        let identity = match RunIdentity::allocate(output_root) {
            Ok(identity) => identity,
            Err(e) => {
                self.fail(&e);
                return Err(e);
            }
        };
        tracing::info!("Run {} writing to {:?}", identity.run_id, identity.run_dir);

        let ctx = Arc::new(CrawlContext {
            scope: self.scope.clone(),
            frontier: Frontier::new(self.config.crawler.max_depth),
            fetcher: Arc::clone(&self.fetcher),
            retry: RetryPolicy::new(self.config.crawler.max_retries, &self.config.retry),
            scan_stylesheets: self.config.crawler.scan_stylesheets,
            writer: MirrorWriter::new(&identity.run_dir),
            report: Mutex::new(ReportBuilder::new(
                identity.run_id.clone(),
                self.seed.as_str(),
                self.config_hash.clone(),
                identity.started_at,
            )),
            links: Mutex::new(LinkIndex::default()),
            state: Arc::clone(&self.state),
            events: self.events.clone(),
        });

        ctx.frontier.accept(self.seed.clone(), 0, None, TaskKind::Page);

        if let Err(e) = self.drive(&ctx).await {
            let dropped = ctx.frontier.clear();
            tracing::debug!("Dropped {} queued tasks after fatal error", dropped);
            self.fail(&e);
            return Err(e);
        }

        match self.finish(&ctx, &identity).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                self.fail(&e);
                Err(e)
            }
        }
    }

    /// The dequeue/spawn/join loop
    async fn drive(&self, ctx: &Arc<CrawlContext>) -> Result<(), MirrorError> {
        let max_workers = self.config.crawler.max_concurrency.max(1) as usize;
        let mut workers: JoinSet<Result<(), MirrorError>> = JoinSet::new();

        loop {
            while !ctx.state.is_cancelled() && workers.len() < max_workers {
                let Some(task) = ctx.frontier.pop() else {
                    break;
                };

                if task.depth > ctx.frontier.max_depth() {
                    tracing::debug!("Discarding {} at depth {}", task.url, task.depth);
                    ctx.state.record_skipped();
                    continue;
                }

                ctx.state.worker_started();
                let worker_ctx = Arc::clone(ctx);
                workers.spawn(async move {
                    let result = process_task(&worker_ctx, task).await;
                    worker_ctx.state.worker_finished();
                    result
                });
            }

            // Nothing in flight and nothing dequeued: the frontier is drained
            // (or a stop was requested)
            let Some(joined) = workers.join_next().await else {
                break;
            };

            let fatal = match joined {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e,
                Err(e) if e.is_cancelled() => continue,
                Err(e) => MirrorError::Join(e),
            };

            tracing::error!("Aborting {} in-flight workers: {}", workers.len(), fatal);
            workers.shutdown().await;
            return Err(fatal);
        }

        if ctx.state.is_cancelled() {
            let dropped = ctx.frontier.clear();
            ctx.events
                .warning(format!("Crawl cancelled; {} queued URLs not fetched", dropped));
        } else {
            tracing::info!(
                "Frontier is empty, crawl complete ({} URLs seen)",
                ctx.frontier.visited_count()
            );
        }

        Ok(())
    }

    /// Post-crawl stages and the final state transition
    async fn finish(
        &self,
        ctx: &Arc<CrawlContext>,
        identity: &RunIdentity,
    ) -> Result<CrawlOutcome, MirrorError> {
        let status = if self.state.is_cancelled() {
            RunStatus::Cancelled
        } else {
            RunStatus::Completed
        };
        let run_dir = identity.run_dir.clone();
        let output = &self.config.output;
        let mut processing = ProcessingSummary::default();

        // A cancelled run only flushes its report
        if status == RunStatus::Completed {
            if output.rewrite_links {
                let mut index = std::mem::take(&mut *ctx.links.lock());
                index.resolve_aliases();
                let dir = run_dir.clone();
                processing.links_rewritten = tokio::task::spawn_blocking(move || {
                    rewrite_mirror(&dir, &index.pages, &index.url_map)
                })
                .await?;
                tracing::info!("Rewrote {} links for offline use", processing.links_rewritten);
            }

            if output.process {
                let entries = ctx.report.lock().entries().to_vec();
                let dir = run_dir.clone();
                let processor = Arc::clone(&self.processor);
                let summary = tokio::task::spawn_blocking(move || {
                    run_pipeline(&entries, &dir, processor.as_ref())
                })
                .await?;
                processing.processed = summary.processed;
                processing.failed = summary.failed;
            }
        }

        let report = {
            let mut builder = ctx.report.lock();
            builder.set_processing(processing);
            builder.finalize(status, self.state.counters())
        };
        report.write_artifacts(&run_dir)?;

        if status == RunStatus::Completed {
            if output.archive {
                let dir = run_dir.clone();
                match tokio::task::spawn_blocking(move || create_archive(&dir)).await {
                    Ok(Ok(path)) => self.events.info(format!("Archive written to {:?}", path)),
                    Ok(Err(e)) => self.events.warning(format!("Archive failed: {}", e)),
                    Err(e) => self.events.warning(format!("Archive task failed: {}", e)),
                }
            }

            if !output.keep_processed {
                if let Err(e) = remove_processed(&run_dir) {
                    tracing::warn!("Failed to remove processed folder: {}", e);
                }
            }
        }

        self.state.transition(status)?;
        let counters = self.state.counters();
        let summary = format!(
            "Mirror {}: {} fetched, {} failed, {} skipped, {} pages in sitemap",
            status,
            counters.fetched,
            counters.failed,
            counters.skipped,
            report.sitemap.len()
        );
        if status == RunStatus::Completed {
            self.events.success(summary);
        } else {
            self.events.warning(summary);
        }

        Ok(CrawlOutcome {
            status,
            run_id: identity.run_id.clone(),
            run_dir,
            report,
        })
    }

    fn fail(&self, error: &MirrorError) {
        if let Err(e) = self.state.transition(RunStatus::Failed) {
            tracing::warn!("{}", e);
        }
        self.events.error(format!("Mirror failed: {}", error));
    }
}

/// Fetches, stores and records one task
///
/// Only output errors are returned; every per-URL failure becomes a
/// `MirrorEntry`.
async fn process_task(ctx: &CrawlContext, task: CrawlTask) -> Result<(), MirrorError> {
    let result = fetch_with_retry(ctx, task).await;
    let FetchResult {
        task,
        final_url,
        attempts,
        outcome,
    } = result;

    let status = outcome.status();
    let mut entry = MirrorEntry {
        seq: task.seq,
        source_url: task.url.to_string(),
        final_url: final_url.to_string(),
        local_path: None,
        byte_size: 0,
        content_type: None,
        kind: task.kind.expected_kind(),
        depth: task.depth,
        status: status.clone(),
        attempts,
        truncated: false,
    };

    match outcome {
        FetchOutcome::Success {
            content_type,
            bytes,
            truncated,
            ..
        } => {
            if final_url != task.url {
                ctx.report
                    .lock()
                    .record_redirect(task.url.as_str(), final_url.as_str());
            }

            let kind = detect_kind(content_type.as_deref(), &final_url, task.kind);
            let bytes = Arc::new(bytes);
            let written = ctx.writer.write(&final_url, kind, Arc::clone(&bytes)).await?;

            {
                let mut links = ctx.links.lock();
                links
                    .url_map
                    .insert(task.url.to_string(), written.src_path.clone());
                links
                    .url_map
                    .insert(final_url.to_string(), written.src_path.clone());
                if kind == ContentKind::Page {
                    links.pages.push(RewriteTarget {
                        url: final_url.clone(),
                        src_path: written.src_path.clone(),
                    });
                }
            }

            let queued = match kind {
                ContentKind::Page => {
                    let insights = analyze_page(&String::from_utf8_lossy(&bytes));
                    ctx.report.lock().record_page_insights(insights);
                    enqueue_refs(ctx, &task, &final_url, extract(kind, &bytes, &final_url))
                }
                ContentKind::Stylesheet if ctx.scan_stylesheets => {
                    enqueue_refs(ctx, &task, &final_url, extract(kind, &bytes, &final_url))
                }
                ContentKind::Script => {
                    let code = String::from_utf8_lossy(&bytes);
                    let endpoints = analyze_script(&code);
                    let mut report = ctx.report.lock();
                    report.record_api_endpoints(endpoints);
                    report.record_frameworks(detect_frameworks(&code));
                    0
                }
                _ => 0,
            };

            ctx.state.record_fetched();
            ctx.events.success(format!(
                "Downloaded {} ({} bytes{}, {} new references)",
                final_url,
                bytes.len(),
                if truncated { ", truncated" } else { "" },
                queued
            ));

            entry.local_path = Some(written.local_path);
            entry.byte_size = bytes.len() as u64;
            entry.content_type = content_type;
            entry.kind = kind;
            entry.truncated = truncated;
        }
        FetchOutcome::Redirect { new_url } => {
            ctx.state.record_skipped();
            ctx.events.info(format!(
                "{} redirects outside the crawl scope to {}",
                task.url, new_url
            ));
            if task.kind.is_page() {
                ctx.report
                    .lock()
                    .record_external(new_url.as_str(), task.url.as_str());
            }
        }
        FetchOutcome::RedirectToVisited { new_url } => {
            ctx.state.record_skipped();
            ctx.events.info(format!(
                "{} redirects to {}, which is already mirrored",
                task.url, new_url
            ));
            ctx.links
                .lock()
                .aliases
                .push((task.url.to_string(), new_url.to_string()));
        }
        _ => {
            ctx.state.record_failed();
            ctx.events.error(format!(
                "Failed {}: {} after {} attempt{}",
                task.url,
                status.detail(),
                attempts,
                if attempts == 1 { "" } else { "s" }
            ));
        }
    }

    ctx.report.lock().record(entry);
    Ok(())
}

/// Fetches with exponential backoff on retryable outcomes
///
/// 4xx and successful outcomes are terminal after one attempt. A stop request
/// is honored before every retry.
async fn fetch_with_retry(ctx: &CrawlContext, task: CrawlTask) -> FetchResult {
    let claims = TaskClaims::new(&ctx.frontier);
    let mut attempt = 1;

    loop {
        let response = ctx.fetcher.fetch(&task.url, task.kind, &claims).await;

        let done = !response.outcome.is_retryable()
            || !ctx.retry.allows_another(attempt)
            || ctx.state.is_cancelled();
        if done {
            return FetchResult {
                task,
                final_url: response.final_url,
                attempts: attempt,
                outcome: response.outcome,
            };
        }

        let delay = ctx.retry.backoff(attempt);
        tracing::debug!(
            "Attempt {} for {} failed ({}); retrying in {:?}",
            attempt,
            task.url,
            response.outcome.status(),
            delay
        );
        tokio::time::sleep(delay).await;

        if ctx.state.is_cancelled() {
            return FetchResult {
                task,
                final_url: response.final_url,
                attempts: attempt,
                outcome: response.outcome,
            };
        }
        attempt += 1;
    }
}

/// Resolves, scope-checks and enqueues the references of one document
///
/// Returns the number of newly queued tasks.
fn enqueue_refs(ctx: &CrawlContext, task: &CrawlTask, doc_url: &Url, refs: ExtractedRefs) -> usize {
    let mut queued = 0;

    for reference in refs {
        let url = match resolve_reference(&reference.url, &reference.from_url) {
            Ok(Some(url)) => url,
            Ok(None) => continue,
            Err(e) => {
                ctx.report.lock().record_malformed_reference();
                ctx.events.warning(format!(
                    "Skipping malformed reference '{}' on {}: {}",
                    reference.url, reference.from_url, e
                ));
                continue;
            }
        };

        let (decision, depth, kind) = if reference.kind == ContentKind::Page {
            (ctx.scope.check_page(&url), task.depth + 1, TaskKind::Page)
        } else {
            // Assets are not a link hop
            (
                ctx.scope.check_asset(&url),
                task.depth,
                TaskKind::Asset(reference.kind),
            )
        };

        match decision {
            ScopeDecision::Accept => {}
            ScopeDecision::External => {
                tracing::debug!("Out of scope: {}", url);
                if kind.is_page() {
                    ctx.report
                        .lock()
                        .record_external(url.as_str(), doc_url.as_str());
                }
                ctx.state.record_skipped();
                continue;
            }
            ScopeDecision::Filtered => {
                tracing::debug!("Filtered {}", url);
                ctx.state.record_skipped();
                continue;
            }
        }

        match ctx.frontier.accept(url, depth, Some(doc_url.clone()), kind) {
            Admission::Queued(_) => queued += 1,
            Admission::TooDeep => ctx.state.record_skipped(),
            Admission::Duplicate => {}
        }
    }

    queued
}

/// Content kind of a fetched body
///
/// Header first, then the URL extension, then what the reference suggested.
fn detect_kind(content_type: Option<&str>, url: &Url, expected: TaskKind) -> ContentKind {
    content_type
        .and_then(ContentKind::from_content_type)
        .or_else(|| ContentKind::from_path(url.path()))
        .unwrap_or(expected.expected_kind())
}
