//! site-mirror main entry point
//!
//! This is the command-line interface for the offline website mirroring crawler.

use anyhow::Context;
use clap::Parser;
use site_mirror::config::{load_config_with_hash, Config, CrawlRequest};
use site_mirror::output::{print_statistics, RunStatistics};
use site_mirror::{Crawler, EventLevel, RunStatus};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// site-mirror: mirror a website for offline use
///
/// Crawls a site breadth-first from a seed URL up to a bounded depth,
/// downloading pages, stylesheets, scripts, images and other assets into a
/// timestamped run directory with a sitemap, an analysis report and an archive.
#[derive(Parser, Debug)]
#[command(name = "site-mirror")]
#[command(version = "1.0.0")]
#[command(about = "Mirror a website for offline browsing", long_about = None)]
struct Cli {
    /// Seed URL (overrides `seed-url` from the configuration file)
    #[arg(value_name = "URL")]
    url: Option<String>,

    /// Path to TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Directory under which the run directory is created
    #[arg(short, long, value_name = "DIR")]
    output: Option<String>,

    /// Maximum link depth (0-10)
    #[arg(short, long)]
    depth: Option<u32>,

    /// Maximum fetch attempts per resource (1-5)
    #[arg(short, long)]
    retries: Option<u32>,

    /// Maximum number of concurrent fetches
    #[arg(long)]
    concurrency: Option<u32>,

    /// Delete the processed/ folder after archiving
    #[arg(long)]
    no_keep_processed: bool,

    /// Skip the beautify/minify stage
    #[arg(long)]
    no_process: bool,

    /// Do not write site_archive.zip
    #[arg(long)]
    no_archive: bool,

    /// Keep original links in the src/ copy
    #[arg(long)]
    no_rewrite_links: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate the effective configuration and exit without crawling
    #[arg(long)]
    dry_run: bool,
}

impl Cli {
    /// Merges command-line overrides into the file configuration
    ///
    /// Per-run settings travel as a [`CrawlRequest`], which validates the
    /// effective configuration before anything is fetched.
    fn apply(&self, mut config: Config) -> Result<Config, site_mirror::ConfigError> {
        if let Some(concurrency) = self.concurrency {
            config.crawler.max_concurrency = concurrency;
        }
        if self.no_process {
            config.output.process = false;
        }
        if self.no_archive {
            config.output.archive = false;
        }
        if self.no_rewrite_links {
            config.output.rewrite_links = false;
        }

        let mut request = CrawlRequest::from_config(&config);
        if let Some(url) = &self.url {
            request.seed_url = url.clone();
        }
        if let Some(output) = &self.output {
            request.output_root = output.clone();
        }
        if let Some(depth) = self.depth {
            request.max_depth = depth;
        }
        if let Some(retries) = self.retries {
            request.max_retries = retries;
        }
        if self.no_keep_processed {
            request.keep_processed = false;
        }
        request.into_config(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load configuration; every key has a default so the file is optional
    let (file_config, config_hash) = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("Failed to load {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (config, Some(hash))
        }
        None => (Config::default(), None),
    };

    let config = cli.apply(file_config).context("Invalid configuration")?;

    if cli.dry_run {
        handle_dry_run(&config);
        return Ok(());
    }

    handle_mirror(config, config_hash, cli.quiet).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
///
/// Progress events are printed by the CLI itself, so their log mirror is
/// switched off unless running quietly.
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("site_mirror=info,site_mirror::events=off,warn"),
            1 => EnvFilter::new("site_mirror=debug,site_mirror::events=off,info"),
            2 => EnvFilter::new("site_mirror=trace,site_mirror::events=off,debug"),
            _ => EnvFilter::new("trace,site_mirror::events=off"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: shows the effective configuration
fn handle_dry_run(config: &Config) {
    println!("=== site-mirror Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Seed URL: {}", config.crawler.seed_url);
    println!("  Max depth: {}", config.crawler.max_depth);
    println!("  Max retries: {}", config.crawler.max_retries);
    println!("  Max concurrency: {}", config.crawler.max_concurrency);
    println!(
        "  Timeouts: {}s request, {}s connect",
        config.crawler.request_timeout_secs, config.crawler.connect_timeout_secs
    );
    println!("  Max body size: {} bytes", config.crawler.max_body_bytes);
    println!("  Scan stylesheets: {}", config.crawler.scan_stylesheets);

    println!("\nRetry Backoff:");
    println!(
        "  {}ms base, {}ms max, {}ms jitter",
        config.retry.base_delay_ms, config.retry.max_delay_ms, config.retry.jitter_ms
    );

    println!("\nUser Agent:");
    println!("  {}", config.user_agent.header_value());

    println!("\nScope:");
    println!("  Same host only: {}", config.scope.same_host_only);
    println!("  External assets: {}", config.scope.external_assets);
    for domain in &config.scope.allowed_domains {
        println!("  - allowed: {}", domain);
    }
    if let Some(include) = &config.scope.include {
        println!("  Include: {}", include);
    }
    if let Some(exclude) = &config.scope.exclude {
        println!("  Exclude: {}", exclude);
    }

    println!("\nOutput:");
    println!("  Root: {}", config.output.output_root);
    println!("  Rewrite links: {}", config.output.rewrite_links);
    println!("  Process: {}", config.output.process);
    println!("  Keep processed: {}", config.output.keep_processed);
    println!("  Archive: {}", config.output.archive);

    println!("\n✓ Configuration is valid");
}

/// Handles the main mirror operation
async fn handle_mirror(
    config: Config,
    config_hash: Option<String>,
    quiet: bool,
) -> anyhow::Result<()> {
    let mut crawler = Crawler::new(config, config_hash)?;
    let handle = crawler.handle();

    let printer = crawler.subscribe().map(|mut events| {
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if !quiet || event.level == EventLevel::Error {
                    println!("{}", event);
                }
            }
        })
    });

    let stop = handle.clone();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            stop.stop();
        }
    });

    tracing::info!("Mirroring {}", crawler.seed());
    let result = crawler.run().await;

    // Close every sender so the printer drains the remaining events
    ctrl_c.abort();
    drop(handle);
    if let Some(printer) = printer {
        let _ = printer.await;
    }

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!("Mirror failed: {}", e);
            return Err(e.into());
        }
    };

    if !quiet {
        println!();
        print_statistics(&RunStatistics::from_report(&outcome.report));
        println!("\nOutput: {}", outcome.run_dir.display());
    }

    if outcome.status == RunStatus::Cancelled {
        tracing::warn!("Run {} was cancelled", outcome.run_id);
    }

    Ok(())
}
