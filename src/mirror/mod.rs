//! On-disk mirror of a run
//!
//! - `layout`: deterministic URL to path mapping and sanitization
//! - `writer`: atomic writes, path uniqueness and the shortened-path fallback
//! - `rewrite`: relative links in the browsable `src/` copy

pub mod layout;
mod rewrite;
mod writer;

pub use layout::{relative_path, sanitize_segment, short_hash, LONG_PATH_DIR, SRC_DIR};
pub use rewrite::{rewrite_html, rewrite_mirror, RewriteTarget};
pub use writer::{write_atomic, MirrorWriter, WrittenFile};
