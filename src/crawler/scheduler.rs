//! Crawl frontier and visited set
//!
//! This module handles:
//! - FIFO (breadth-first) queue of accepted crawl tasks
//! - The visited set that guarantees a URL is scheduled at most once per run
//! - Depth enforcement at acceptance time
//! - Discovery-order sequence numbers used to order the sitemap
//!
//! Queue and visited set share one lock so that the duplicate test, the
//! insert and the enqueue happen as a single step.

use crate::state::ContentKind;
use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use url::Url;

/// What a task downloads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    /// A document whose links are followed
    Page,
    /// A resource referenced by a page or stylesheet; never followed
    Asset(ContentKind),
}

impl TaskKind {
    /// The content kind expected before the response arrives
    pub fn expected_kind(&self) -> ContentKind {
        match self {
            Self::Page => ContentKind::Page,
            Self::Asset(kind) => *kind,
        }
    }

    pub fn is_page(&self) -> bool {
        matches!(self, Self::Page)
    }
}

/// A unit of work accepted into the frontier
///
/// Immutable once created and consumed exactly once by a worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlTask {
    /// Normalized absolute URL
    pub url: Url,

    /// Link hops from the seed (assets carry the depth of their page)
    pub depth: u32,

    /// Page the reference was found on; `None` for the seed
    pub origin: Option<Url>,

    pub kind: TaskKind,

    /// Discovery order, assigned at acceptance
    pub seq: u64,
}

/// Result of offering a URL to the frontier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Enqueued with this sequence number
    Queued(u64),
    /// Already scheduled or completed in this run
    Duplicate,
    /// Deeper than the configured maximum depth
    TooDeep,
}

#[derive(Debug, Default)]
struct FrontierInner {
    queue: VecDeque<CrawlTask>,
    visited: HashSet<String>,
    next_seq: u64,
}

/// Shared frontier of a run
///
/// The lock is never held across an `.await`; every method completes
/// synchronously.
#[derive(Debug)]
pub struct Frontier {
    inner: Mutex<FrontierInner>,
    max_depth: u32,
}

impl Frontier {
    /// Creates an empty frontier
    ///
    /// # Arguments
    ///
    /// * `max_depth` - Tasks deeper than this are never accepted
    pub fn new(max_depth: u32) -> Self {
        Self {
            inner: Mutex::new(FrontierInner::default()),
            max_depth,
        }
    }

    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    /// Tests, marks and enqueues a URL in one critical section
    ///
    /// # Arguments
    ///
    /// * `url` - Normalized URL
    /// * `depth` - Depth the task would run at
    /// * `origin` - Page the URL was discovered on
    /// * `kind` - Page or asset
    ///
    /// # Returns
    ///
    /// `Admission::Queued(seq)` when the task was enqueued, otherwise the
    /// reason it was not.
    pub fn accept(&self, url: Url, depth: u32, origin: Option<Url>, kind: TaskKind) -> Admission {
        if depth > self.max_depth {
            tracing::trace!("Rejecting {} at depth {} (max {})", url, depth, self.max_depth);
            return Admission::TooDeep;
        }

        let mut inner = self.inner.lock();
        if !inner.visited.insert(url.as_str().to_string()) {
            return Admission::Duplicate;
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;
        tracing::trace!("Queued #{} {} (depth {})", seq, url, depth);
        inner.queue.push_back(CrawlTask {
            url,
            depth,
            origin,
            kind,
            seq,
        });
        Admission::Queued(seq)
    }

    /// Atomically tests and inserts a URL into the visited set
    ///
    /// Returns true if the URL had not been seen before.
    pub fn is_new(&self, url: &Url) -> bool {
        self.inner.lock().visited.insert(url.as_str().to_string())
    }

    /// Takes the oldest queued task
    pub fn pop(&self) -> Option<CrawlTask> {
        self.inner.lock().queue.pop_front()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().queue.is_empty()
    }

    pub fn visited_count(&self) -> usize {
        self.inner.lock().visited.len()
    }

    /// Drops every queued task; used when a run is cancelled or fails
    pub fn clear(&self) -> usize {
        let mut inner = self.inner.lock();
        let dropped = inner.queue.len();
        inner.queue.clear();
        dropped
    }
}

/// Redirect targets claimed by one task
///
/// A retried task may pass through the targets it claimed on an earlier
/// attempt; every other visited URL stops its redirect chain.
#[derive(Debug)]
pub struct TaskClaims<'a> {
    frontier: &'a Frontier,
    claimed: Mutex<HashSet<String>>,
}

impl<'a> TaskClaims<'a> {
    pub fn new(frontier: &'a Frontier) -> Self {
        Self {
            frontier,
            claimed: Mutex::new(HashSet::new()),
        }
    }

    /// Claims a redirect target for this task
    pub fn claim(&self, url: &Url) -> bool {
        let mut claimed = self.claimed.lock();
        if claimed.contains(url.as_str()) {
            return true;
        }
        if self.frontier.is_new(url) {
            tracing::trace!("Claimed redirect target {}", url);
            claimed.insert(url.as_str().to_string());
            true
        } else {
            false
        }
    }
}
