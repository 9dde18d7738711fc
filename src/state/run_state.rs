use crate::MirrorError;
use chrono::{DateTime, Local, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

/// Lifecycle of a mirror run
///
/// ```text
/// Idle -> Running -> Completed
///                 -> Cancelled
///                 -> Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Idle,
    Running,
    Completed,
    Cancelled,
    Failed,
}

impl RunStatus {
    /// Returns true if a run in this status may move to `next`
    pub fn can_transition_to(&self, next: RunStatus) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Running)
                | (Self::Running, Self::Completed)
                | (Self::Running, Self::Cancelled)
                | (Self::Running, Self::Failed)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Point-in-time copy of the run counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunCounters {
    pub fetched: u64,
    pub failed: u64,
    pub skipped: u64,
    pub active_workers: usize,
}

/// Shared, thread-safe state of one mirror run
///
/// Held behind an `Arc` by the coordinator, every worker and every
/// [`CrawlHandle`](crate::CrawlHandle).
#[derive(Debug)]
pub struct RunState {
    status: Mutex<RunStatus>,
    cancelled: AtomicBool,
    active_workers: AtomicUsize,
    fetched: AtomicU64,
    failed: AtomicU64,
    skipped: AtomicU64,
}

impl RunState {
    pub fn new() -> Self {
        Self {
            status: Mutex::new(RunStatus::Idle),
            cancelled: AtomicBool::new(false),
            active_workers: AtomicUsize::new(0),
            fetched: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
        }
    }

    pub fn status(&self) -> RunStatus {
        *self.status.lock()
    }

    /// Moves the run to `next`
    ///
    /// # Errors
    ///
    /// Returns `MirrorError::InvalidTransition` if the state machine does not
    /// allow the move; the status is left unchanged.
    pub fn transition(&self, next: RunStatus) -> Result<(), MirrorError> {
        let mut status = self.status.lock();
        if !status.can_transition_to(next) {
            return Err(MirrorError::InvalidTransition {
                from: *status,
                to: next,
            });
        }
        tracing::info!("Run status: {} -> {}", *status, next);
        *status = next;
        Ok(())
    }

    /// Requests cooperative cancellation
    ///
    /// Returns true only for the call that actually set the flag.
    pub fn cancel(&self) -> bool {
        !self.cancelled.swap(true, Ordering::SeqCst)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn worker_started(&self) {
        self.active_workers.fetch_add(1, Ordering::SeqCst);
    }

    pub fn worker_finished(&self) {
        self.active_workers.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn record_fetched(&self) {
        self.fetched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn counters(&self) -> RunCounters {
        RunCounters {
            fetched: self.fetched.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            active_workers: self.active_workers.load(Ordering::SeqCst),
        }
    }
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}

/// Identity and directory of a run
#[derive(Debug, Clone)]
pub struct RunIdentity {
    /// `YYYYMMDD_HHMMSS`, with `_N` appended when that directory already exists
    pub run_id: String,
    pub run_dir: PathBuf,
    pub started_at: DateTime<Utc>,
}

impl RunIdentity {
    /// Creates a fresh run directory under `output_root`
    ///
    /// # Errors
    ///
    /// Returns `MirrorError::OutputUnwritable` if the root or the run
    /// directory cannot be created.
    pub fn allocate(output_root: &Path) -> Result<Self, MirrorError> {
        let started_at = Utc::now();
        let stamp = started_at
            .with_timezone(&Local)
            .format("%Y%m%d_%H%M%S")
            .to_string();
        Self::allocate_with_stamp(output_root, &stamp, started_at)
    }

    fn allocate_with_stamp(
        output_root: &Path,
        stamp: &str,
        started_at: DateTime<Utc>,
    ) -> Result<Self, MirrorError> {
        let unwritable = |path: &Path, source: io::Error| MirrorError::OutputUnwritable {
            path: path.to_path_buf(),
            source,
        };

        std::fs::create_dir_all(output_root).map_err(|e| unwritable(output_root, e))?;

        let mut suffix = 1;
        loop {
            let run_id = if suffix == 1 {
                stamp.to_string()
            } else {
                format!("{}_{}", stamp, suffix)
            };
            let run_dir = output_root.join(&run_id);

            match std::fs::create_dir(&run_dir) {
                Ok(()) => {
                    return Ok(Self {
                        run_id,
                        run_dir,
                        started_at,
                    })
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => suffix += 1,
                Err(e) => return Err(unwritable(&run_dir, e)),
            }
        }
    }
}
