//! Deterministic mapping from URLs to mirror paths
//!
//! ```text
//! https://example.com/                  -> example.com/index.html
//! https://example.com/docs/             -> example.com/docs/index.html
//! https://example.com/about             -> example.com/about/index.html
//! https://example.com/a.css?v=2         -> example.com/a_<hash(query)>.css
//! http://localhost:8080/x.png           -> localhost_8080/x.png
//! ```
//!
//! Every segment is sanitized so no mapped path can leave the run directory.

use crate::state::ContentKind;
use crate::url::host_dir_name;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use url::Url;

/// Longest file or directory name produced, in bytes
pub const MAX_SEGMENT_BYTES: usize = 120;

/// Directory holding the browsable copy
pub const SRC_DIR: &str = "src";

/// Directory used for shortened fallback paths
pub const LONG_PATH_DIR: &str = "_long";

const INDEX_FILE: &str = "index.html";

/// First 8 hex characters of the SHA-256 of `input`
pub fn short_hash(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    hex::encode(digest)[..8].to_string()
}

/// Name of the per-host directory
pub fn host_dir(url: &Url) -> String {
    host_dir_name(url)
        .map(|h| sanitize_segment(&h))
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "_".to_string())
}

/// Replaces characters that are unsafe in file names and bounds the length
///
/// `\ / : * ? " < > |` and control characters become `_`. Names longer than
/// [`MAX_SEGMENT_BYTES`] are cut, keeping the extension.
pub fn sanitize_segment(segment: &str) -> String {
    let cleaned: String = segment
        .chars()
        .map(|c| match c {
            '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if cleaned.len() <= MAX_SEGMENT_BYTES {
        return cleaned;
    }

    let (stem, ext) = split_extension(&cleaned);
    let ext_len = ext.map(|e| e.len() + 1).unwrap_or(0);
    if ext_len >= MAX_SEGMENT_BYTES / 2 {
        return truncate_at_char(&cleaned, MAX_SEGMENT_BYTES).to_string();
    }

    let stem = truncate_at_char(stem, MAX_SEGMENT_BYTES - ext_len);
    match ext {
        Some(ext) => format!("{}.{}", stem, ext),
        None => stem.to_string(),
    }
}

fn truncate_at_char(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Splits `name.ext` into (`name`, `Some("ext")`); dotfiles have no extension
pub fn split_extension(name: &str) -> (&str, Option<&str>) {
    match name.rfind('.') {
        Some(idx) if idx > 0 && idx + 1 < name.len() => (&name[..idx], Some(&name[idx + 1..])),
        _ => (name, None),
    }
}

/// Appends `_<suffix>` to the stem of a path's file name
pub fn with_stem_suffix(path: &Path, suffix: &str) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let (stem, ext) = split_extension(&name);
    let renamed = match ext {
        Some(ext) => format!("{}_{}.{}", stem, suffix, ext),
        None => format!("{}_{}", stem, suffix),
    };
    path.with_file_name(renamed)
}

/// Path of a URL relative to its host directory
///
/// # Rules
///
/// - `/` or a trailing slash maps to `index.html` in that directory
/// - A page whose last segment has no extension maps to `<segment>/index.html`
/// - Any other extension-less resource gets the default extension of its kind
/// - A query string appends `_<hash(query)>` to the file stem
pub fn relative_path(url: &Url, kind: ContentKind) -> PathBuf {
    let raw_segments: Vec<&str> = url
        .path_segments()
        .map(|segments| segments.collect())
        .unwrap_or_default();

    let trailing_slash = raw_segments.last().map_or(true, |s| s.is_empty());
    let mut segments: Vec<String> = raw_segments
        .iter()
        .filter(|s| !s.is_empty() && **s != "." && **s != "..")
        .map(|s| sanitize_segment(s))
        .filter(|s| !s.is_empty() && s != "." && s != "..")
        .collect();

    let file_name = if trailing_slash || segments.is_empty() {
        INDEX_FILE.to_string()
    } else {
        let last = segments.pop().unwrap_or_default();
        match split_extension(&last) {
            (_, Some(_)) => last,
            (_, None) if kind == ContentKind::Page => {
                segments.push(last);
                INDEX_FILE.to_string()
            }
            (stem, None) => format!("{}.{}", stem, kind.default_extension()),
        }
    };

    let mut path: PathBuf = segments.iter().collect();
    path.push(&file_name);

    match url.query() {
        Some(query) if !query.is_empty() => with_stem_suffix(&path, &short_hash(query)),
        _ => path,
    }
}

/// `<host>/<kind-dir>/<path>`: the categorized copy
pub fn categorized_path(url: &Url, kind: ContentKind, relative: &Path) -> PathBuf {
    Path::new(&host_dir(url)).join(kind.dir_name()).join(relative)
}

/// `src/<host>/<path>`: the browsable copy
pub fn browsable_path(url: &Url, relative: &Path) -> PathBuf {
    Path::new(SRC_DIR).join(host_dir(url)).join(relative)
}

/// Hashed fallback used when the regular path cannot be written
///
/// Returns the categorized and browsable variants.
pub fn shortened_paths(url: &Url, kind: ContentKind) -> (PathBuf, PathBuf) {
    let digest = hex::encode(Sha256::digest(url.as_str().as_bytes()));
    let ext = url
        .path_segments()
        .and_then(|mut s| s.next_back())
        .and_then(|last| split_extension(last).1)
        .map(sanitize_segment)
        .filter(|e| e.len() <= 8 && !e.is_empty())
        .unwrap_or_else(|| kind.default_extension().to_string());
    let file = format!("{}.{}", &digest[..16], ext);

    let host = host_dir(url);
    (
        Path::new(&host)
            .join(kind.dir_name())
            .join(LONG_PATH_DIR)
            .join(&file),
        Path::new(SRC_DIR).join(&host).join(LONG_PATH_DIR).join(&file),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Component;

    fn rel(url: &str, kind: ContentKind) -> String {
        relative_path(&Url::parse(url).unwrap(), kind)
            .to_string_lossy()
            .replace('\\', "/")
    }

    #[test]
    fn test_index_mapping() {
        assert_eq!(rel("https://example.com/", ContentKind::Page), "index.html");
        assert_eq!(
            rel("https://example.com/docs/", ContentKind::Page),
            "docs/index.html"
        );
        assert_eq!(
            rel("https://example.com/about", ContentKind::Page),
            "about/index.html"
        );
        assert_eq!(
            rel("https://example.com/about.html", ContentKind::Page),
            "about.html"
        );
    }

    #[test]
    fn test_asset_without_extension() {
        assert_eq!(
            rel("https://example.com/img/photo", ContentKind::Image),
            "img/photo.png"
        );
        assert_eq!(
            rel("https://example.com/download", ContentKind::Other),
            "download.bin"
        );
    }

    #[test]
    fn test_query_hash() {
        let path = rel("https://example.com/a.css?v=2", ContentKind::Stylesheet);
        assert_eq!(path, format!("a_{}.css", short_hash("v=2")));

        let page = rel("https://example.com/list?page=2", ContentKind::Page);
        assert_eq!(page, format!("list/index_{}.html", short_hash("page=2")));

        assert_ne!(
            rel("https://example.com/a.css?v=1", ContentKind::Stylesheet),
            rel("https://example.com/a.css?v=2", ContentKind::Stylesheet)
        );
    }

    #[test]
    fn test_deterministic() {
        let a = rel("https://example.com/x/y.js?b=1&a=2", ContentKind::Script);
        let b = rel("https://example.com/x/y.js?b=1&a=2", ContentKind::Script);
        assert_eq!(a, b);
    }

    #[test]
    fn test_sanitize_segment() {
        assert_eq!(sanitize_segment("a:b*c?d\"e<f>g|h"), "a_b_c_d_e_f_g_h");
        assert_eq!(sanitize_segment("tab\there"), "tab_here");
        assert_eq!(sanitize_segment("plain-name.txt"), "plain-name.txt");
    }

    #[test]
    fn test_long_segment_truncated_keeps_extension() {
        let long = format!("{}.css", "a".repeat(300));
        let cleaned = sanitize_segment(&long);
        assert!(cleaned.len() <= MAX_SEGMENT_BYTES);
        assert!(cleaned.ends_with(".css"));

        let multibyte = "é".repeat(200);
        assert!(sanitize_segment(&multibyte).len() <= MAX_SEGMENT_BYTES);
    }

    #[test]
    fn test_paths_stay_inside_run_dir() {
        let url = Url::parse("https://example.com/%2e%2e/%2E%2E/etc/passwd").unwrap();
        let path = relative_path(&url, ContentKind::Other);
        assert!(path
            .components()
            .all(|c| matches!(c, Component::Normal(_))));
    }

    #[test]
    fn test_host_dir_with_port() {
        let url = Url::parse("http://localhost:8080/x.png").unwrap();
        let relative = relative_path(&url, ContentKind::Image);
        assert_eq!(
            categorized_path(&url, ContentKind::Image, &relative),
            Path::new("localhost_8080").join("img").join("x.png")
        );
        assert_eq!(
            browsable_path(&url, &relative),
            Path::new("src").join("localhost_8080").join("x.png")
        );
    }

    #[test]
    fn test_with_stem_suffix() {
        assert_eq!(
            with_stem_suffix(Path::new("a/b/index.html"), "deadbeef"),
            Path::new("a/b/index_deadbeef.html")
        );
        assert_eq!(
            with_stem_suffix(Path::new("a/README"), "deadbeef"),
            Path::new("a/README_deadbeef")
        );
    }

    #[test]
    fn test_shortened_paths() {
        let url = Url::parse(&format!("https://example.com/{}.js", "x".repeat(500))).unwrap();
        let (categorized, browsable) = shortened_paths(&url, ContentKind::Script);
        assert!(categorized.starts_with(Path::new("example.com").join("js").join("_long")));
        assert!(browsable.starts_with(Path::new("src").join("example.com").join("_long")));
        assert_eq!(categorized.extension().unwrap(), "js");
    }
}
