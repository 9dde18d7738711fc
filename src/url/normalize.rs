use crate::UrlError;
use url::Url;

/// Tracking query parameters removed during normalization
const TRACKING_PARAMS: &[&str] = &["fbclid", "gclid", "mc_eid"];

/// Schemes that never lead to a fetchable resource
const IGNORED_PREFIXES: &[&str] = &["mailto:", "javascript:", "data:", "tel:", "about:", "blob:"];

/// Normalizes a possibly relative URL reference
///
/// # Normalization Steps
///
/// 1. Resolve the reference against `base` (or parse it as absolute)
/// 2. Reject anything that is not HTTP(S) or has no host
/// 3. Lowercase the host (default ports are dropped by the parser)
/// 4. Collapse empty, `.` and `..` path segments; an empty path becomes `/`.
///    A trailing slash is kept: `/docs/` and `/docs` resolve relative links differently
/// 5. Remove the fragment
/// 6. Remove tracking query parameters, sort the rest by key
/// 7. Remove an empty query string
///
/// Normalizing an already normalized URL returns it unchanged.
///
/// # Examples
///
/// ```
/// use site_mirror::url::normalize;
/// use url::Url;
///
/// let base = Url::parse("https://Example.com/docs/").unwrap();
/// let url = normalize("../about#team", Some(&base)).unwrap();
/// assert_eq!(url.as_str(), "https://example.com/about");
/// ```
pub fn normalize(raw: &str, base: Option<&Url>) -> Result<Url, UrlError> {
    let raw = raw.trim();

    // Step 1: Resolve
    let parsed = match base {
        Some(base) => base.join(raw),
        None => Url::parse(raw),
    };
    let mut url = parsed.map_err(|e| UrlError::Parse(format!("{}: {}", raw, e)))?;

    // Step 2: Validate scheme and host
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    // Step 3: Lowercase the host
    match url.host_str() {
        Some(host) if host.is_empty() => return Err(UrlError::MissingDomain),
        Some(host) => {
            let lowered = host.to_lowercase();
            if lowered != host {
                url.set_host(Some(&lowered))
                    .map_err(|e| UrlError::Malformed(format!("Failed to set host: {}", e)))?;
            }
        }
        None => return Err(UrlError::MissingDomain),
    }

    // Step 4: Normalize path
    let normalized_path = normalize_path(url.path());
    if normalized_path != url.path() {
        url.set_path(&normalized_path);
    }

    // Step 5: Remove fragment
    url.set_fragment(None);

    // Step 6 & 7: Filter and sort query parameters
    if url.query().is_some() {
        let params = filter_and_sort_query_params(&url);
        url.set_query(None);
        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params.iter());
        }
    }

    Ok(url)
}

/// Normalizes an absolute URL string
pub fn normalize_url(url_str: &str) -> Result<Url, UrlError> {
    normalize(url_str, None)
}

/// Resolves a raw reference found in a document
///
/// Returns `Ok(None)` for references that are never fetched
/// (`mailto:`, `javascript:`, `data:`, bare `#fragment`, empty), which are
/// ignored rather than treated as malformed.
pub fn resolve_reference(raw: &str, base: &Url) -> Result<Option<Url>, UrlError> {
    if is_ignored_reference(raw) {
        return Ok(None);
    }
    normalize(raw, Some(base)).map(Some)
}

/// Returns true for references that never lead to a fetchable resource
pub fn is_ignored_reference(raw: &str) -> bool {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return true;
    }
    let lowered = trimmed.to_ascii_lowercase();
    IGNORED_PREFIXES.iter().any(|p| lowered.starts_with(p))
}

/// Collapses empty, `.` and `..` segments, keeping a trailing slash
fn normalize_path(path: &str) -> String {
    if path.is_empty() {
        return "/".to_string();
    }

    let trailing_slash = path.len() > 1 && path.ends_with('/');
    let mut normalized_segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                normalized_segments.pop();
            }
            _ => normalized_segments.push(segment),
        }
    }

    if normalized_segments.is_empty() {
        return "/".to_string();
    }

    let mut result = format!("/{}", normalized_segments.join("/"));
    if trailing_slash {
        result.push('/');
    }
    result
}

/// Filters out tracking parameters and sorts remaining query parameters
fn filter_and_sort_query_params(url: &Url) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !is_tracking_param(key))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    // Stable sort: repeated keys keep their relative order
    params.sort_by(|a, b| a.0.cmp(&b.0));

    params
}

fn is_tracking_param(key: &str) -> bool {
    TRACKING_PARAMS.contains(&key) || key.starts_with("utm_")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://example.com/docs/guide/").unwrap()
    }

    #[test]
    fn test_lowercase_host() {
        let result = normalize_url("https://EXAMPLE.COM/Page").unwrap();
        assert_eq!(result.as_str(), "https://example.com/Page");
    }

    #[test]
    fn test_default_port_stripped() {
        assert_eq!(
            normalize_url("https://example.com:443/a").unwrap().as_str(),
            "https://example.com/a"
        );
        assert_eq!(
            normalize_url("http://example.com:80/a").unwrap().as_str(),
            "http://example.com/a"
        );
    }

    #[test]
    fn test_custom_port_kept() {
        let result = normalize_url("http://127.0.0.1:8080/a").unwrap();
        assert_eq!(result.as_str(), "http://127.0.0.1:8080/a");
    }

    #[test]
    fn test_scheme_not_rewritten() {
        let result = normalize_url("http://example.com/page").unwrap();
        assert_eq!(result.scheme(), "http");
    }

    #[test]
    fn test_trailing_slash_kept() {
        let result = normalize_url("https://example.com/page/").unwrap();
        assert_eq!(result.as_str(), "https://example.com/page/");
    }

    #[test]
    fn test_empty_path_becomes_root() {
        let result = normalize_url("https://example.com").unwrap();
        assert_eq!(result.as_str(), "https://example.com/");
    }

    #[test]
    fn test_remove_fragment() {
        let result = normalize_url("https://example.com/page#section").unwrap();
        assert_eq!(result.as_str(), "https://example.com/page");
    }

    #[test]
    fn test_multiple_slashes() {
        let result = normalize_url("https://example.com///path//to///page").unwrap();
        assert_eq!(result.as_str(), "https://example.com/path/to/page");
    }

    #[test]
    fn test_normalize_path_with_dots() {
        let result = normalize_url("https://example.com/a/../b/./c").unwrap();
        assert_eq!(result.as_str(), "https://example.com/b/c");
    }

    #[test]
    fn test_parent_directory_at_root() {
        let result = normalize_url("https://example.com/../page").unwrap();
        assert_eq!(result.as_str(), "https://example.com/page");
    }

    #[test]
    fn test_remove_tracking_params() {
        let result =
            normalize_url("https://example.com/page?utm_source=a&fbclid=b&keep=yes").unwrap();
        assert_eq!(result.as_str(), "https://example.com/page?keep=yes");
    }

    #[test]
    fn test_sort_query_params() {
        let result = normalize_url("https://example.com/page?b=2&a=1").unwrap();
        assert_eq!(result.as_str(), "https://example.com/page?a=1&b=2");
    }

    #[test]
    fn test_empty_query_removed() {
        let result = normalize_url("https://example.com/page?").unwrap();
        assert_eq!(result.as_str(), "https://example.com/page");
    }

    #[test]
    fn test_resolve_relative() {
        let result = normalize("intro.html", Some(&base())).unwrap();
        assert_eq!(result.as_str(), "https://example.com/docs/guide/intro.html");

        let result = normalize("../api/", Some(&base())).unwrap();
        assert_eq!(result.as_str(), "https://example.com/docs/api/");

        let result = normalize("/root.css", Some(&base())).unwrap();
        assert_eq!(result.as_str(), "https://example.com/root.css");

        let result = normalize("//cdn.example.net/x.js", Some(&base())).unwrap();
        assert_eq!(result.as_str(), "https://cdn.example.net/x.js");
    }

    #[test]
    fn test_self_reference_resolves_to_base() {
        let base = normalize_url("https://example.com/").unwrap();
        assert_eq!(normalize("./", Some(&base)).unwrap(), base);
        assert_eq!(normalize("", Some(&base)).unwrap(), base);
    }

    #[test]
    fn test_invalid_scheme() {
        let result = normalize_url("ftp://example.com/page");
        assert!(matches!(result.unwrap_err(), UrlError::InvalidScheme(_)));
    }

    #[test]
    fn test_malformed_url() {
        assert!(matches!(
            normalize_url("not a url"),
            Err(UrlError::Parse(_))
        ));
        assert!(matches!(
            normalize("http://[::1", Some(&base())),
            Err(UrlError::Parse(_))
        ));
    }

    #[test]
    fn test_ignored_references() {
        let base = base();
        for raw in [
            "mailto:someone@example.com",
            "javascript:void(0)",
            "JavaScript:alert(1)",
            "data:image/png;base64,AAAA",
            "tel:+123",
            "#top",
            "   ",
        ] {
            assert_eq!(resolve_reference(raw, &base).unwrap(), None, "{}", raw);
        }
        assert!(resolve_reference("page.html", &base).unwrap().is_some());
    }

    #[test]
    fn test_idempotent() {
        let samples = [
            "HTTP://Example.COM:80/a/./b/../c//d/?z=1&utm_medium=x&a=hello+world#frag",
            "https://example.com/search?q=a%26b&q=c",
            "https://example.com/path%20with%20spaces/",
            "https://example.com/?flag",
            "http://127.0.0.1:9000/x/y/../",
            "https://example.com/a/%2e%2e/b",
        ];

        for sample in samples {
            let once = normalize_url(sample).unwrap();
            let twice = normalize_url(once.as_str()).unwrap();
            assert_eq!(once, twice, "not idempotent for {}", sample);
        }
    }
}
