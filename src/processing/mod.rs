//! Post-crawl processing of text resources
//!
//! Every stored page, stylesheet and script is offered to a [`Processor`]
//! which produces beautified, minified and deobfuscated variants. Outputs land
//! under `<run>/processed/` mirroring the categorized tree:
//!
//! ```text
//! example.com/js/js/app.js -> processed/example.com/js/js/app.beautified.js
//!                             processed/example.com/js/js/app.minified.js
//!                             processed/example.com/js/js/app.deobfuscated.js
//! ```
//!
//! A file that cannot be processed is logged and counted; it never fails the run.

mod formatter;

pub use formatter::BasicFormatter;

use crate::mirror::layout::split_extension;
use crate::mirror::write_atomic;
use crate::output::{MirrorEntry, ProcessingSummary};
use crate::state::ContentKind;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Directory holding processed outputs
pub const PROCESSED_DIR: &str = "processed";

/// Errors raised while processing one file
#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0:?} is not valid UTF-8 text")]
    NotText(PathBuf),

    #[error("No formatter for {0} resources")]
    Unsupported(ContentKind),
}

/// The variants of a processed document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Formatted {
    pub beautified: String,
    pub minified: String,
    /// Readable form with obfuscated string escapes decoded; markup and
    /// stylesheets have nothing to decode and repeat the beautified text
    pub deobfuscated: String,
}

/// Where the outputs of one file were written, relative to the run directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedFiles {
    pub beautified: PathBuf,
    pub minified: PathBuf,
    pub deobfuscated: PathBuf,
}

/// Formats text resources
pub trait Processor: Send + Sync {
    /// Short name used in log lines
    fn name(&self) -> &str;

    /// Produces every variant of `source`
    fn process(&self, source: &str, kind: ContentKind) -> Result<Formatted, ProcessingError>;
}

/// Processes one stored file and writes its outputs
///
/// # Arguments
///
/// * `processor` - Formatter to apply
/// * `run_dir` - Run directory
/// * `local_path` - Categorized copy, relative to `run_dir`
/// * `kind` - Kind of the stored resource
pub fn process_file(
    processor: &dyn Processor,
    run_dir: &Path,
    local_path: &Path,
    kind: ContentKind,
) -> Result<ProcessedFiles, ProcessingError> {
    if !kind.is_text() {
        return Err(ProcessingError::Unsupported(kind));
    }

    let bytes = std::fs::read(run_dir.join(local_path))?;
    let source =
        String::from_utf8(bytes).map_err(|_| ProcessingError::NotText(local_path.to_path_buf()))?;
    let formatted = processor.process(&source, kind)?;

    let files = output_paths(local_path, kind);
    write_atomic(&run_dir.join(&files.beautified), formatted.beautified.as_bytes())?;
    write_atomic(&run_dir.join(&files.minified), formatted.minified.as_bytes())?;
    write_atomic(
        &run_dir.join(&files.deobfuscated),
        formatted.deobfuscated.as_bytes(),
    )?;
    Ok(files)
}

/// `processed/<dir>/<stem>.{beautified,minified,deobfuscated}.<ext>`
pub fn output_paths(local_path: &Path, kind: ContentKind) -> ProcessedFiles {
    let name = local_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let (stem, ext) = split_extension(&name);
    let ext = ext.unwrap_or(kind.default_extension());

    let base = Path::new(PROCESSED_DIR).join(local_path.parent().unwrap_or_else(|| Path::new("")));
    ProcessedFiles {
        beautified: base.join(format!("{}.beautified.{}", stem, ext)),
        minified: base.join(format!("{}.minified.{}", stem, ext)),
        deobfuscated: base.join(format!("{}.deobfuscated.{}", stem, ext)),
    }
}

/// Offers every stored text resource to `processor`
///
/// Blocking; call from `spawn_blocking` inside an async context.
pub fn run_pipeline(
    entries: &[MirrorEntry],
    run_dir: &Path,
    processor: &dyn Processor,
) -> ProcessingSummary {
    let mut summary = ProcessingSummary::default();

    for entry in entries {
        if !entry.status.is_success() || !entry.kind.is_text() {
            continue;
        }
        let Some(local_path) = &entry.local_path else {
            continue;
        };

        match process_file(processor, run_dir, local_path, entry.kind) {
            Ok(files) => {
                tracing::debug!(
                    "{} processed {:?} -> {:?}",
                    processor.name(),
                    local_path,
                    files.beautified
                );
                summary.processed += 1;
            }
            Err(e) => {
                tracing::warn!("Processing {:?} failed: {}", local_path, e);
                summary.failed += 1;
            }
        }
    }

    tracing::info!(
        "Processing finished: {} processed, {} failed",
        summary.processed,
        summary.failed
    );
    summary
}

/// Deletes `<run>/processed/` if present
pub fn remove_processed(run_dir: &Path) -> std::io::Result<()> {
    let dir = run_dir.join(PROCESSED_DIR);
    if dir.is_dir() {
        std::fs::remove_dir_all(&dir)?;
        tracing::info!("Removed processed folder {:?}", dir);
    }
    Ok(())
}
