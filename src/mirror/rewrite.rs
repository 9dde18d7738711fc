//! Offline link rewriting for the browsable `src/` tree
//!
//! After the crawl, `href`/`src` attributes of mirrored pages that point at
//! other mirrored resources are replaced with relative file paths. Only the
//! `src/` copies are touched; the categorized copies stay byte-exact.

use crate::mirror::writer::write_atomic;
use crate::url::resolve_reference;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use url::Url;

static LINK_ATTR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\b(href|src)(\s*=\s*)(?:"([^"]*)"|'([^']*)')"#)
        .expect("Invalid link attribute regex")
});

/// A mirrored page whose browsable copy should be rewritten
#[derive(Debug, Clone)]
pub struct RewriteTarget {
    /// URL the page was fetched from (resolution base)
    pub url: Url,
    /// Browsable copy, relative to the run directory
    pub src_path: PathBuf,
}

/// Rewrites links in one HTML document
///
/// # Arguments
///
/// * `html` - Document text
/// * `page_url` - Base URL for resolving references
/// * `page_src` - Document location relative to the run directory
/// * `url_map` - Normalized URL to browsable path (relative to the run directory)
///
/// # Returns
///
/// The rewritten document and the number of attributes changed.
pub fn rewrite_html(
    html: &str,
    page_url: &Url,
    page_src: &Path,
    url_map: &HashMap<String, PathBuf>,
) -> (String, usize) {
    let from_dir = page_src.parent().unwrap_or_else(|| Path::new(""));
    let mut count = 0;

    let rewritten = LINK_ATTR_RE.replace_all(html, |caps: &Captures<'_>| {
        let (value, quote) = match (caps.get(3), caps.get(4)) {
            (Some(v), _) => (v.as_str(), '"'),
            (None, Some(v)) => (v.as_str(), '\''),
            _ => return caps[0].to_string(),
        };

        let local = resolve_reference(value, page_url)
            .ok()
            .flatten()
            .and_then(|target| url_map.get(target.as_str()))
            .and_then(|target_path| pathdiff::diff_paths(target_path, from_dir));

        match local {
            Some(relative) => {
                count += 1;
                let fragment = value.find('#').map(|i| &value[i..]).unwrap_or("");
                format!(
                    "{}{}{}{}{}{}",
                    &caps[1],
                    &caps[2],
                    quote,
                    to_link(&relative),
                    fragment,
                    quote
                )
            }
            None => caps[0].to_string(),
        }
    });

    (rewritten.into_owned(), count)
}

/// Relative path rendered with forward slashes
fn to_link(path: &Path) -> String {
    let parts: Vec<String> = path
        .components()
        .filter_map(|c| match c {
            Component::Normal(p) => Some(p.to_string_lossy().to_string()),
            Component::ParentDir => Some("..".to_string()),
            _ => None,
        })
        .collect();
    if parts.is_empty() {
        ".".to_string()
    } else {
        parts.join("/")
    }
}

/// Rewrites every target page in place
///
/// Per-file failures are logged and skipped. Returns the total number of
/// links rewritten.
pub fn rewrite_mirror(
    run_dir: &Path,
    targets: &[RewriteTarget],
    url_map: &HashMap<String, PathBuf>,
) -> usize {
    let mut total = 0;

    for target in targets {
        let path = run_dir.join(&target.src_path);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!("Cannot read {:?} for link rewriting: {}", path, e);
                continue;
            }
        };

        let html = String::from_utf8_lossy(&bytes);
        let (rewritten, count) = rewrite_html(&html, &target.url, &target.src_path, url_map);
        if count == 0 {
            continue;
        }

        match write_atomic(&path, rewritten.as_bytes()) {
            Ok(()) => {
                tracing::debug!("Rewrote {} links in {:?}", count, target.src_path);
                total += count;
            }
            Err(e) => tracing::warn!("Cannot rewrite links in {:?}: {}", path, e),
        }
    }

    total
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(entries: &[(&str, &str)]) -> HashMap<String, PathBuf> {
        entries
            .iter()
            .map(|(u, p)| (u.to_string(), PathBuf::from(p)))
            .collect()
    }

    #[test]
    fn test_rewrites_mirrored_links() {
        let url_map = map(&[
            ("https://example.com/", "src/example.com/index.html"),
            ("https://example.com/about", "src/example.com/about/index.html"),
            ("https://example.com/css/site.css", "src/example.com/css/site.css"),
        ]);
        let page_url = Url::parse("https://example.com/about").unwrap();
        let html = r#"<a href="/">Home</a><link href='/css/site.css'><a href="https://other.org/">x</a><a href="/about#team">Team</a>"#;

        let (out, count) = rewrite_html(
            html,
            &page_url,
            Path::new("src/example.com/about/index.html"),
            &url_map,
        );

        assert_eq!(count, 3);
        assert!(out.contains(r#"href="../index.html""#));
        assert!(out.contains(r#"href='../css/site.css'"#));
        assert!(out.contains(r#"href="https://other.org/""#));
        assert!(out.contains(r#"href="index.html#team""#));
    }

    #[test]
    fn test_unmapped_and_ignored_untouched() {
        let url_map = map(&[]);
        let page_url = Url::parse("https://example.com/").unwrap();
        let html = r#"<a href="mailto:x@y.z">m</a><img src="/missing.png">"#;
        let (out, count) = rewrite_html(html, &page_url, Path::new("src/example.com/index.html"), &url_map);
        assert_eq!(count, 0);
        assert_eq!(out, html);
    }

    #[test]
    fn test_rewrite_mirror_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let src = PathBuf::from("src/example.com/index.html");
        let page = dir.path().join(&src);
        std::fs::create_dir_all(page.parent().unwrap()).unwrap();
        std::fs::write(&page, r#"<img src="/logo.png">"#).unwrap();

        let url_map = map(&[("https://example.com/logo.png", "src/example.com/logo.png")]);
        let targets = vec![RewriteTarget {
            url: Url::parse("https://example.com/").unwrap(),
            src_path: src,
        }];

        assert_eq!(rewrite_mirror(dir.path(), &targets, &url_map), 1);
        assert_eq!(
            std::fs::read_to_string(&page).unwrap(),
            r#"<img src="logo.png">"#
        );
    }
}
