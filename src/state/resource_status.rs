/// Outcome classification for a single mirrored resource
///
/// Every fetched (or attempted) URL ends in exactly one of these states and
/// is recorded with it in the report.
use serde::{Serialize, Serializer};
use std::fmt;

/// Terminal classification of a resource fetch
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourceStatus {
    /// Body was fetched and written to the mirror
    Success,

    /// Redirect that was not followed: the target is outside the crawl
    /// scope or was already mirrored by this run
    Redirect(String),

    /// HTTP 4xx (permanent, never retried)
    ClientError(u16),

    /// HTTP 5xx (retried up to the configured attempt limit)
    ServerError(u16),

    /// Connection refused, DNS failure, TLS error, redirect loop...
    NetworkFailure(String),

    /// Request did not complete within the configured timeout
    Timeout,
}

impl ResourceStatus {
    /// Returns true if the resource was stored
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Returns true if another attempt may produce a different outcome
    ///
    /// Timeouts, network failures and 5xx responses are transient; 4xx
    /// responses and redirects are not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout | Self::NetworkFailure(_) | Self::ServerError(_)
        )
    }

    /// Returns true if this represents a failed fetch
    pub fn is_error(&self) -> bool {
        !matches!(self, Self::Success | Self::Redirect(_))
    }

    /// HTTP status code carried by the classification, if any
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::ClientError(code) | Self::ServerError(code) => Some(*code),
            _ => None,
        }
    }

    /// Stable string form used in the report and in log lines
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Redirect(_) => "redirect",
            Self::ClientError(_) => "client_error",
            Self::ServerError(_) => "server_error",
            Self::NetworkFailure(_) => "network_failure",
            Self::Timeout => "timeout",
        }
    }

    /// Human readable detail for failure events
    pub fn detail(&self) -> String {
        match self {
            Self::Success => "success".to_string(),
            Self::Redirect(to) => format!("redirected to {}", to),
            Self::ClientError(code) => format!("HTTP {}", code),
            Self::ServerError(code) => format!("HTTP {}", code),
            Self::NetworkFailure(reason) => format!("network failure: {}", reason),
            Self::Timeout => "timed out".to_string(),
        }
    }
}

impl fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for ResourceStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_retryable() {
        assert!(ResourceStatus::Timeout.is_retryable());
        assert!(ResourceStatus::NetworkFailure("reset".into()).is_retryable());
        assert!(ResourceStatus::ServerError(503).is_retryable());

        assert!(!ResourceStatus::ClientError(404).is_retryable());
        assert!(!ResourceStatus::Success.is_retryable());
        assert!(!ResourceStatus::Redirect("https://x.org/".into()).is_retryable());
    }

    #[test]
    fn test_is_error() {
        assert!(ResourceStatus::ClientError(404).is_error());
        assert!(ResourceStatus::Timeout.is_error());

        assert!(!ResourceStatus::Success.is_error());
        assert!(!ResourceStatus::Redirect("https://x.org/".into()).is_error());
    }

    #[test]
    fn test_as_str() {
        assert_eq!(ResourceStatus::Success.as_str(), "success");
        assert_eq!(ResourceStatus::Redirect(String::new()).as_str(), "redirect");
        assert_eq!(ResourceStatus::ClientError(404).as_str(), "client_error");
        assert_eq!(ResourceStatus::ServerError(500).as_str(), "server_error");
        assert_eq!(
            ResourceStatus::NetworkFailure(String::new()).as_str(),
            "network_failure"
        );
        assert_eq!(ResourceStatus::Timeout.as_str(), "timeout");
    }

    #[test]
    fn test_http_status() {
        assert_eq!(ResourceStatus::ClientError(410).http_status(), Some(410));
        assert_eq!(ResourceStatus::ServerError(502).http_status(), Some(502));
        assert_eq!(ResourceStatus::Timeout.http_status(), None);
    }

    #[test]
    fn test_serializes_as_string() {
        let json = serde_json::to_string(&ResourceStatus::ClientError(404)).unwrap();
        assert_eq!(json, "\"client_error\"");
    }
}
