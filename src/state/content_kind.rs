use serde::Serialize;
use std::fmt;
use url::Url;

/// Closed set of resource kinds the crawler distinguishes
///
/// The kind selects the extractor, the mirror subdirectory and the
/// formatter used by the processing pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    /// HTML document; the only kind whose links are followed
    Page,
    Stylesheet,
    Script,
    Image,
    /// Fonts, media, archives and anything else
    Other,
}

impl ContentKind {
    /// Subdirectory name in the categorized mirror tree
    pub fn dir_name(&self) -> &'static str {
        match self {
            Self::Page => "html",
            Self::Stylesheet => "css",
            Self::Script => "js",
            Self::Image => "img",
            Self::Other => "other",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Page => "page",
            Self::Stylesheet => "stylesheet",
            Self::Script => "script",
            Self::Image => "image",
            Self::Other => "other",
        }
    }

    /// File extension used when the URL path does not carry one
    pub fn default_extension(&self) -> &'static str {
        match self {
            Self::Page => "html",
            Self::Stylesheet => "css",
            Self::Script => "js",
            Self::Image => "png",
            Self::Other => "bin",
        }
    }

    /// True for kinds stored and processed as text
    pub fn is_text(&self) -> bool {
        matches!(self, Self::Page | Self::Stylesheet | Self::Script)
    }

    /// Classifies a `Content-Type` header value
    ///
    /// Returns `None` for missing or generic types (`application/octet-stream`,
    /// `text/plain`) so the caller can fall back to the URL extension.
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase();

        match essence.as_str() {
            "" | "application/octet-stream" | "binary/octet-stream" | "text/plain" => None,
            "text/html" | "application/xhtml+xml" => Some(Self::Page),
            "text/css" => Some(Self::Stylesheet),
            e if e.contains("javascript") || e.contains("ecmascript") => Some(Self::Script),
            e if e.starts_with("image/") => Some(Self::Image),
            _ => Some(Self::Other),
        }
    }

    /// Guesses the kind from the extension of a URL path
    pub fn from_path(path: &str) -> Option<Self> {
        let last = path.rsplit('/').next().unwrap_or("");
        if !last.contains('.') {
            return None;
        }
        mime_guess::from_path(last)
            .first()
            .and_then(|mime| Self::from_content_type(mime.essence_str()))
            .or(Some(Self::Other))
    }

    /// Determines the kind of a fetched resource
    ///
    /// The header wins; without a usable header the URL extension decides,
    /// and extension-less URLs are treated as pages.
    pub fn detect(content_type: Option<&str>, url: &Url) -> Self {
        content_type
            .and_then(Self::from_content_type)
            .or_else(|| Self::from_path(url.path()))
            .unwrap_or(if url.path().ends_with('/') {
                Self::Page
            } else {
                Self::Other
            })
    }

    pub fn all() -> [Self; 5] {
        [
            Self::Page,
            Self::Stylesheet,
            Self::Script,
            Self::Image,
            Self::Other,
        ]
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
