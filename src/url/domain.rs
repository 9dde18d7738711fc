use url::Url;

/// Extracts the lowercase host from a URL
///
/// # Examples
///
/// ```
/// use url::Url;
/// use site_mirror::url::extract_domain;
///
/// let url = Url::parse("https://EXAMPLE.COM/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Directory-safe name for a URL's origin host
///
/// The host alone for default ports; `host_port` when an explicit port is
/// present, so `localhost:8080` and `localhost:9090` mirror into different trees
/// without a `:` in the file name. IPv6 brackets are dropped.
pub fn host_dir_name(url: &Url) -> Option<String> {
    let host = extract_domain(url)?;
    let host = host.trim_start_matches('[').trim_end_matches(']').replace(':', "_");
    Some(match url.port() {
        Some(port) => format!("{}_{}", host, port),
        None => host,
    })
}

/// Returns true when both URLs have the same host and explicit port
///
/// The scheme is not compared: `http://example.com/` and
/// `https://example.com/` belong to the same site.
pub fn same_origin_host(a: &Url, b: &Url) -> bool {
    extract_domain(a) == extract_domain(b) && a.port() == b.port()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_subdomain() {
        let url = Url::parse("https://blog.example.com/post").unwrap();
        assert_eq!(extract_domain(&url), Some("blog.example.com".to_string()));
    }

    #[test]
    fn test_extract_ignores_port() {
        let url = Url::parse("https://example.com:8080/").unwrap();
        assert_eq!(extract_domain(&url), Some("example.com".to_string()));
    }

    #[test]
    fn test_host_dir_name_default_port() {
        let url = Url::parse("https://www.example.com/a/b").unwrap();
        assert_eq!(host_dir_name(&url), Some("www.example.com".to_string()));
    }

    #[test]
    fn test_host_dir_name_with_port() {
        let url = Url::parse("http://127.0.0.1:4321/").unwrap();
        assert_eq!(host_dir_name(&url), Some("127.0.0.1_4321".to_string()));
    }

    #[test]
    fn test_host_dir_name_ipv6() {
        let url = Url::parse("http://[::1]:8000/").unwrap();
        assert_eq!(host_dir_name(&url), Some("__1_8000".to_string()));
    }

    #[test]
    fn test_same_origin_host() {
        let a = Url::parse("http://example.com/a").unwrap();
        let b = Url::parse("http://EXAMPLE.com:80/b").unwrap();
        let c = Url::parse("http://example.com:8080/b").unwrap();
        let d = Url::parse("https://example.com/c").unwrap();
        assert!(same_origin_host(&a, &b));
        assert!(!same_origin_host(&a, &c));
        assert!(same_origin_host(&a, &d));
    }
}
