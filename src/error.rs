//! Error types for fetching, parsing, delivery and configuration.
//!
//! Validation rejections (wrong date, summary too short) are not errors; they
//! are logged decisions made by the site scraper.

use thiserror::Error;

/// A page could not be retrieved.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The site answered with 403 or 429.
    #[error("blocked by {url} (status {status})")]
    Blocked { url: String, status: u16 },

    /// The site answered with a 5xx status.
    #[error("server error from {url} (status {status})")]
    Server { url: String, status: u16 },

    /// Connection, timeout or body read failure.
    #[error("network error fetching {url}: {reason}")]
    Network { url: String, reason: String },
}

impl FetchError {
    /// Blocks and network failures are worth another attempt; server errors are not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchError::Blocked { .. } | FetchError::Network { .. })
    }
}

/// A document or selector could not be understood.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("malformed feed: {0}")]
    Feed(String),

    #[error("invalid selector: {0}")]
    Selector(String),
}

/// Site-level failure. Recorded on the site result, never shown to readers.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// A chunk could not be handed to the delivery sink.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("sink rejected message (status {status})")]
    Rejected { status: u16 },

    #[error("sink transport error: {0}")]
    Transport(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        let blocked = FetchError::Blocked {
            url: "https://example.com".into(),
            status: 429,
        };
        let network = FetchError::Network {
            url: "https://example.com".into(),
            reason: "timed out".into(),
        };
        let server = FetchError::Server {
            url: "https://example.com".into(),
            status: 502,
        };
        assert!(blocked.is_retryable());
        assert!(network.is_retryable());
        assert!(!server.is_retryable());
    }

    #[test]
    fn test_scrape_error_wraps_fetch_error() {
        let err: ScrapeError = FetchError::Server {
            url: "https://example.com/local/".into(),
            status: 503,
        }
        .into();
        assert_eq!(
            err.to_string(),
            "server error from https://example.com/local/ (status 503)"
        );
    }
}
