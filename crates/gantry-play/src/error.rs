//! Publisher error types

use thiserror::Error;

/// Result type for publish operations
pub type Result<T> = std::result::Result<T, PublishError>;

/// Failure hierarchy for one edit transaction.
///
/// The classifier in [`crate::report`] matches these variants in a fixed
/// priority order, so every failure the library raises must land on one of
/// them rather than on an ad-hoc string.
#[derive(Debug, Error)]
pub enum PublishError {
    /// Credentials could not be loaded or were rejected locally, before any
    /// network call was attempted
    #[error("{0}")]
    Credentials(String),

    /// The remote API rejected a call with a structured error response
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Transport-level failure with no structured API error body
    #[error("Unknown error: {0}")]
    Unknown(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The transaction was cancelled before completion
    #[error("Publish cancelled before completion")]
    Cancelled,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl PublishError {
    /// Whether retrying the failed call could plausibly succeed.
    ///
    /// Structured API rejections are transient only for throttling and
    /// server-side statuses; everything else reflects the request content
    /// or the local environment.
    pub fn is_transient(&self) -> bool {
        match self {
            PublishError::Api { status, .. } => {
                matches!(*status, 408 | 429 | 500..=599)
            }
            PublishError::Http(err) => err.is_timeout() || err.is_connect(),
            PublishError::Io(err) => matches!(
                err.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::BrokenPipe
            ),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_transience() {
        let throttled = PublishError::Api {
            status: 429,
            message: "quota".to_string(),
        };
        let rejected = PublishError::Api {
            status: 400,
            message: "bad release".to_string(),
        };

        assert!(throttled.is_transient());
        assert!(!rejected.is_transient());
    }

    #[test]
    fn test_io_transience() {
        let reset = PublishError::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "connection reset",
        ));
        let missing = PublishError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "no such file",
        ));

        assert!(reset.is_transient());
        assert!(!missing.is_transient());
    }

    #[test]
    fn test_credentials_never_transient() {
        let err = PublishError::Credentials("bad key".to_string());
        assert!(!err.is_transient());
    }
}
