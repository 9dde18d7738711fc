//! Reference extraction from fetched documents
//!
//! This module scans downloaded content for URLs worth mirroring:
//! - HTML: links, embedded resources, inline `<style>`/`style=""` CSS and
//!   inline `<script>` blocks
//! - CSS: `url(...)` and `@import` references
//! - JavaScript: string literals that look like resource URLs
//!
//! References are returned raw (unresolved); the coordinator normalizes,
//! scope-checks and deduplicates them. Malformed markup never aborts
//! extraction: whatever `scraper` recovers is scanned.

use crate::state::ContentKind;
use crate::url::is_ignored_reference;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use url::Url;

/// A reference found in a document, before resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedRef {
    /// Raw attribute or literal value, trimmed
    pub url: String,

    /// Kind the reference is expected to have; `Page` refs are followed as links
    pub kind: ContentKind,

    /// Document the reference was found in
    pub from_url: Url,
}

/// Consuming iterator over the references of one document
///
/// Single pass: once drained it yields nothing more.
#[derive(Debug)]
pub struct ExtractedRefs {
    inner: std::vec::IntoIter<ExtractedRef>,
}

impl Iterator for ExtractedRefs {
    type Item = ExtractedRef;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for ExtractedRefs {}

/// Extracts references from a document of the given kind
///
/// # Arguments
///
/// * `kind` - Kind of the document; selects the scanner
/// * `bytes` - Document body (decoded lossily as UTF-8)
/// * `source_url` - URL the document was fetched from
///
/// # Example
///
/// ```
/// use site_mirror::crawler::extract;
/// use site_mirror::ContentKind;
/// use url::Url;
///
/// let html = br#"<a href="/about">About</a><img src="logo.png">"#;
/// let base = Url::parse("https://example.com/").unwrap();
/// let refs: Vec<_> = extract(ContentKind::Page, html, &base).collect();
/// assert_eq!(refs.len(), 2);
/// ```
pub fn extract(kind: ContentKind, bytes: &[u8], source_url: &Url) -> ExtractedRefs {
    let text = String::from_utf8_lossy(bytes);
    let mut collector = Collector::new(source_url);

    match kind {
        ContentKind::Page => scan_html(&text, &mut collector),
        ContentKind::Stylesheet => scan_css(&text, &mut collector),
        ContentKind::Script => scan_js(&text, &mut collector),
        ContentKind::Image | ContentKind::Other => {}
    }

    ExtractedRefs {
        inner: collector.refs.into_iter(),
    }
}

/// Accumulates references, dropping ignored schemes and repeats
struct Collector<'a> {
    source: &'a Url,
    seen: HashSet<String>,
    refs: Vec<ExtractedRef>,
}

impl<'a> Collector<'a> {
    fn new(source: &'a Url) -> Self {
        Self {
            source,
            seen: HashSet::new(),
            refs: Vec::new(),
        }
    }

    fn push(&mut self, raw: &str, kind: ContentKind) {
        let raw = raw.trim();
        if is_ignored_reference(raw) {
            return;
        }
        if self.seen.insert(raw.to_string()) {
            self.refs.push(ExtractedRef {
                url: raw.to_string(),
                kind,
                from_url: self.source.clone(),
            });
        }
    }
}

/// How the kind of an attribute value is decided
#[derive(Debug, Clone, Copy)]
enum RefRule {
    /// Always this kind
    Fixed(ContentKind),
    /// Guessed from the extension, defaulting to the given kind
    ByExtension(ContentKind),
    /// `srcset` candidate list of images
    SrcSet,
}

/// (selector, attribute, rule) table for HTML scanning
static HTML_RULES: Lazy<Vec<(Selector, &'static str, RefRule)>> = Lazy::new(|| {
    use ContentKind::*;
    let table: [(&str, &str, RefRule); 17] = [
        ("a[href]:not([download])", "href", RefRule::Fixed(Page)),
        ("a[href][download]", "href", RefRule::Fixed(Other)),
        ("link[rel~='canonical'][href]", "href", RefRule::Fixed(Page)),
        ("iframe[src]", "src", RefRule::Fixed(Page)),
        ("frame[src]", "src", RefRule::Fixed(Page)),
        ("link[rel~='stylesheet'][href]", "href", RefRule::Fixed(Stylesheet)),
        ("link[rel~='icon'][href]", "href", RefRule::Fixed(Image)),
        ("link[rel~='apple-touch-icon'][href]", "href", RefRule::Fixed(Image)),
        ("script[src]", "src", RefRule::Fixed(Script)),
        ("img[src]", "src", RefRule::Fixed(Image)),
        ("img[srcset]", "srcset", RefRule::SrcSet),
        ("source[srcset]", "srcset", RefRule::SrcSet),
        ("video[poster]", "poster", RefRule::Fixed(Image)),
        ("video[src]", "src", RefRule::ByExtension(Other)),
        ("audio[src], embed[src]", "src", RefRule::ByExtension(Other)),
        ("source[src]", "src", RefRule::ByExtension(Other)),
        ("object[data]", "data", RefRule::ByExtension(Other)),
    ];

    table
        .iter()
        .filter_map(|(css, attr, rule)| match Selector::parse(css) {
            Ok(selector) => Some((selector, *attr, *rule)),
            Err(e) => {
                tracing::error!("Invalid selector {}: {:?}", css, e);
                None
            }
        })
        .collect()
});

static PRELOAD_SELECTOR: Lazy<Option<Selector>> =
    Lazy::new(|| Selector::parse("link[rel~='preload'][href], link[rel~='prefetch'][href]").ok());
static STYLE_BLOCK_SELECTOR: Lazy<Option<Selector>> = Lazy::new(|| Selector::parse("style").ok());
static STYLE_ATTR_SELECTOR: Lazy<Option<Selector>> = Lazy::new(|| Selector::parse("[style]").ok());
static INLINE_SCRIPT_SELECTOR: Lazy<Option<Selector>> =
    Lazy::new(|| Selector::parse("script:not([src])").ok());

static CSS_URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"url\(\s*(?:"([^"]*)"|'([^']*)'|([^)'"\s]+))\s*\)"#).expect("Invalid CSS url regex")
});

static CSS_IMPORT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"@import\s+(?:"([^"]+)"|'([^']+)')"#).expect("Invalid CSS import regex")
});

static JS_URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"["'`]((?:https?://|/)[^"'`\s<>(){}]+?\.(?:js|mjs|css|png|jpe?g|gif|svg|webp|avif|ico|bmp|woff2?|ttf|otf|eot|json|xml|html?|mp4|webm|ogg|mp3|wav|pdf)(?:\?[^"'`\s<>]*)?)["'`]"#,
    )
    .expect("Invalid JS url regex")
});

fn scan_html(text: &str, collector: &mut Collector<'_>) {
    let document = Html::parse_document(text);

    for (selector, attr, rule) in HTML_RULES.iter() {
        for element in document.select(selector) {
            if let Some(value) = element.value().attr(attr) {
                push_by_rule(collector, value, *rule);
            }
        }
    }

    if let Some(selector) = PRELOAD_SELECTOR.as_ref() {
        for element in document.select(selector) {
            if let Some(href) = element.value().attr("href") {
                let kind = match element.value().attr("as") {
                    Some("style") => ContentKind::Stylesheet,
                    Some("script") => ContentKind::Script,
                    Some("image") => ContentKind::Image,
                    _ => kind_by_extension(href, ContentKind::Other),
                };
                collector.push(href, kind);
            }
        }
    }

    // Inline CSS and JS are scanned once; generated markup is not re-parsed
    if let Some(selector) = STYLE_BLOCK_SELECTOR.as_ref() {
        for element in document.select(selector) {
            scan_css(&element_text(&element), collector);
        }
    }
    if let Some(selector) = STYLE_ATTR_SELECTOR.as_ref() {
        for element in document.select(selector) {
            if let Some(style) = element.value().attr("style") {
                scan_css(style, collector);
            }
        }
    }
    if let Some(selector) = INLINE_SCRIPT_SELECTOR.as_ref() {
        for element in document.select(selector) {
            scan_js(&element_text(&element), collector);
        }
    }
}

fn element_text(element: &ElementRef<'_>) -> String {
    element.text().collect()
}

fn push_by_rule(collector: &mut Collector<'_>, value: &str, rule: RefRule) {
    match rule {
        RefRule::Fixed(kind) => collector.push(value, kind),
        RefRule::ByExtension(default) => collector.push(value, kind_by_extension(value, default)),
        RefRule::SrcSet => {
            for candidate in parse_srcset(value) {
                collector.push(candidate, ContentKind::Image);
            }
        }
    }
}

/// Splits a `srcset` value into its URLs, dropping width/density descriptors
pub fn parse_srcset(value: &str) -> Vec<&str> {
    value
        .split(',')
        .filter_map(|candidate| candidate.split_whitespace().next())
        .filter(|url| !url.is_empty())
        .collect()
}

/// Guesses a reference's kind from its path extension
fn kind_by_extension(raw: &str, default: ContentKind) -> ContentKind {
    let path = raw.split(['?', '#']).next().unwrap_or(raw);
    ContentKind::from_path(path).unwrap_or(default)
}

fn scan_css(text: &str, collector: &mut Collector<'_>) {
    for caps in CSS_IMPORT_RE.captures_iter(text) {
        if let Some(m) = caps.get(1).or_else(|| caps.get(2)) {
            collector.push(m.as_str(), ContentKind::Stylesheet);
        }
    }

    for caps in CSS_URL_RE.captures_iter(text) {
        if let Some(m) = caps.get(1).or_else(|| caps.get(2)).or_else(|| caps.get(3)) {
            let kind = match kind_by_extension(m.as_str(), ContentKind::Other) {
                // A stylesheet never links a page; treat unknown documents as files
                ContentKind::Page => ContentKind::Other,
                kind => kind,
            };
            collector.push(m.as_str(), kind);
        }
    }
}

fn scan_js(text: &str, collector: &mut Collector<'_>) {
    for caps in JS_URL_RE.captures_iter(text) {
        if let Some(m) = caps.get(1) {
            collector.push(m.as_str(), kind_by_extension(m.as_str(), ContentKind::Other));
        }
    }
}
