//! Error types for Harvest.
//!
//! Errors are grouped by how far they propagate: per candidate, per entity,
//! or for the whole run. See [`HarvestError::is_fatal_to_run`].

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the Harvest library.
#[derive(Debug, Error)]
pub enum HarvestError {
    // Network errors
    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    #[error("Request timeout after {0:?}")]
    Timeout(std::time::Duration),

    #[error("HTTP {status} from {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Response from {url} exceeds {limit} bytes")]
    ResponseTooLarge { url: String, limit: u64 },

    // Browser session errors
    #[error("Acquisition session error: {message}")]
    Session { message: String },

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    #[error("Malformed mapping store {path}: {message}")]
    MalformedStore { path: PathBuf, message: String },

    // Candidate errors
    #[error("Invalid image source: {message}")]
    InvalidSource { message: String },

    #[error("Failed to decode inline image: {message}")]
    Decode { message: String },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Validation error for {field}: {message}")]
    Validation { field: String, message: String },
}

/// Result type alias for Harvest operations.
pub type Result<T> = std::result::Result<T, HarvestError>;

impl From<reqwest::Error> for HarvestError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            HarvestError::Timeout(std::time::Duration::from_secs(0))
        } else {
            HarvestError::Network {
                message: err.to_string(),
                source: Some(err),
            }
        }
    }
}

impl From<fantoccini::error::CmdError> for HarvestError {
    fn from(err: fantoccini::error::CmdError) -> Self {
        HarvestError::Session {
            message: err.to_string(),
        }
    }
}

impl From<fantoccini::error::NewSessionError> for HarvestError {
    fn from(err: fantoccini::error::NewSessionError) -> Self {
        HarvestError::Session {
            message: format!("Failed to start browser session: {}", err),
        }
    }
}

impl HarvestError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        HarvestError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Shorthand for a browser session failure.
    pub fn session(message: impl Into<String>) -> Self {
        HarvestError::Session {
            message: message.into(),
        }
    }

    /// Check if this error should trigger a retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            HarvestError::Network { .. } | HarvestError::Timeout(_) => true,
            HarvestError::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Whether this error must stop the entity loop.
    ///
    /// Only a store that cannot be parsed qualifies: continuing would
    /// overwrite the dedup history with whatever the next save holds.
    pub fn is_fatal_to_run(&self) -> bool {
        matches!(self, HarvestError::MalformedStore { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = HarvestError::HttpStatus {
            url: "https://example.com/a.jpg".into(),
            status: 404,
        };
        assert_eq!(err.to_string(), "HTTP 404 from https://example.com/a.jpg");

        let err = HarvestError::session("no such window");
        assert_eq!(err.to_string(), "Acquisition session error: no such window");
    }

    #[test]
    fn test_retryable_errors() {
        assert!(HarvestError::Timeout(std::time::Duration::from_secs(5)).is_retryable());
        assert!(HarvestError::HttpStatus {
            url: String::new(),
            status: 503
        }
        .is_retryable());
        assert!(HarvestError::HttpStatus {
            url: String::new(),
            status: 429
        }
        .is_retryable());
        assert!(!HarvestError::HttpStatus {
            url: String::new(),
            status: 404
        }
        .is_retryable());
        assert!(!HarvestError::session("gone").is_retryable());
    }

    #[test]
    fn test_only_malformed_store_is_fatal() {
        assert!(HarvestError::MalformedStore {
            path: PathBuf::from("url_filename_mapping.json"),
            message: "expected object".into(),
        }
        .is_fatal_to_run());
        assert!(!HarvestError::session("crashed").is_fatal_to_run());
        assert!(!HarvestError::Timeout(std::time::Duration::from_secs(1)).is_fatal_to_run());
    }
}
