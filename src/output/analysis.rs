//! Content analysis of mirrored pages and scripts
//!
//! Heuristics only: keyword frequencies, meta tags, hidden elements, inline
//! scripts, frontend framework hints and API-looking URLs. Nothing found here
//! is fetched.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Words of this length or shorter are not counted as keywords
pub const MIN_KEYWORD_CHARS: usize = 4;

/// Framework name and the lowercase markers that suggest it
const FRAMEWORK_MARKERS: &[(&str, &[&str])] = &[
    ("React", &["react", "data-reactroot"]),
    ("Vue", &["vue", "data-v-"]),
    ("Angular", &["angular", "ng-version"]),
    ("Svelte", &["svelte"]),
    ("jQuery", &["jquery"]),
];

static META_SELECTOR: Lazy<Option<Selector>> =
    Lazy::new(|| Selector::parse("meta[content]").ok());
static STYLED_SELECTOR: Lazy<Option<Selector>> = Lazy::new(|| Selector::parse("[style]").ok());
static INLINE_SCRIPT_SELECTOR: Lazy<Option<Selector>> =
    Lazy::new(|| Selector::parse("script:not([src])").ok());
static BODY_SELECTOR: Lazy<Option<Selector>> = Lazy::new(|| Selector::parse("body").ok());

static API_URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"["'`]((?:https?://[^"'`\s]*)?/api/[^"'`\s]*)["'`]"#).expect("Invalid API url regex")
});

static WORD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\p{L}\p{N}][\p{L}\p{N}'_-]*").expect("Invalid word regex"));

/// What one HTML page contributes to the analysis report
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageInsights {
    /// Lowercase word counts from visible text
    pub keywords: HashMap<String, u64>,

    /// `name`/`property` to `content` of meta tags
    pub meta: BTreeMap<String, String>,

    pub hidden_elements: usize,
    pub inline_scripts: usize,
    pub frameworks: BTreeSet<String>,
    pub api_endpoints: BTreeSet<String>,
}

/// Analyzes an HTML document
pub fn analyze_page(html: &str) -> PageInsights {
    let document = Html::parse_document(html);
    let mut insights = PageInsights::default();

    if let Some(selector) = META_SELECTOR.as_ref() {
        for element in document.select(selector) {
            let el = element.value();
            let name = el.attr("name").or_else(|| el.attr("property"));
            if let (Some(name), Some(content)) = (name, el.attr("content")) {
                insights
                    .meta
                    .insert(name.trim().to_string(), content.trim().to_string());
            }
        }
    }

    if let Some(selector) = STYLED_SELECTOR.as_ref() {
        insights.hidden_elements = document
            .select(selector)
            .filter(|e| e.value().attr("style").map_or(false, is_hidden_style))
            .count();
    }

    if let Some(selector) = INLINE_SCRIPT_SELECTOR.as_ref() {
        for script in document.select(selector) {
            let code: String = script.text().collect();
            if code.trim().is_empty() {
                continue;
            }
            insights.inline_scripts += 1;
            insights.api_endpoints.extend(analyze_script(&code));
        }
    }

    if let Some(selector) = BODY_SELECTOR.as_ref() {
        for body in document.select(selector) {
            for node in body.descendants() {
                let Some(text) = node.value().as_text() else {
                    continue;
                };
                let in_code = node
                    .parent()
                    .and_then(|p| p.value().as_element().map(|e| e.name().to_string()))
                    .map_or(false, |name| matches!(name.as_str(), "script" | "style" | "noscript"));
                if !in_code {
                    count_words(text, &mut insights.keywords);
                }
            }
        }
    }

    insights.frameworks = detect_frameworks(html);
    insights
}

/// Collects API-looking URLs (`.../api/...`) from script source
pub fn analyze_script(code: &str) -> Vec<String> {
    API_URL_RE
        .captures_iter(code)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
        .collect()
}

/// Frameworks whose markers appear anywhere in the content
pub fn detect_frameworks(content: &str) -> BTreeSet<String> {
    let lower = content.to_lowercase();
    FRAMEWORK_MARKERS
        .iter()
        .filter(|(_, markers)| markers.iter().any(|m| lower.contains(m)))
        .map(|(name, _)| name.to_string())
        .collect()
}

fn is_hidden_style(style: &str) -> bool {
    let compact: String = style
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase();
    compact.contains("display:none") || compact.contains("visibility:hidden")
}

fn count_words(text: &str, counts: &mut HashMap<String, u64>) {
    for word in WORD_RE.find_iter(text) {
        let word = word.as_str().to_lowercase();
        if word.chars().count() >= MIN_KEYWORD_CHARS {
            *counts.entry(word).or_insert(0) += 1;
        }
    }
}

/// The `limit` most frequent words, ties broken alphabetically
pub fn top_keywords(counts: &HashMap<String, u64>, limit: usize) -> Vec<(String, u64)> {
    let mut ranked: Vec<(String, u64)> = counts.iter().map(|(w, c)| (w.clone(), *c)).collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.truncate(limit);
    ranked
}
