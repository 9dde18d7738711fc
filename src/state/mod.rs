//! State module for tracking a mirror run
//!
//! # Components
//!
//! - `ContentKind`: The closed set of resource kinds (page, stylesheet, script, image, other)
//! - `ResourceStatus`: Terminal outcome of fetching one resource
//! - `RunStatus` / `RunState`: Run lifecycle state machine, counters and cancellation flag
//! - `RunIdentity`: The timestamped run directory

mod content_kind;
mod resource_status;
mod run_state;

// Re-export main types
pub use content_kind::ContentKind;
pub use resource_status::ResourceStatus;
pub use run_state::{RunCounters, RunIdentity, RunState, RunStatus};
