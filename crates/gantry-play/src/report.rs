//! Failure classification and diagnostic rendering
//!
//! The classifier is the last reporting step before the human-facing
//! surface: it assigns every failure a category and renders exactly one
//! message for it. Three categories compress the message to a single
//! actionable line; only the fallback category surfaces the full cause
//! chain.

use serde::Serialize;

use crate::error::PublishError;

/// Fixed line rendered when the remote service refuses the configured
/// credentials. Distinct from a local credential-loading failure: the fix is
/// in the Play Console permissions, not the key file.
const PERMISSION_DENIED: &str =
    "\n- The API credentials provided do not have permission to apply these changes\n";

/// Category assigned to a classified failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    /// Credentials could not be loaded or used locally
    Credentials,
    /// The remote service rejected the configured credentials
    Unauthorized,
    /// Transport failure carrying no actionable API-level detail
    UnknownApi,
    /// Anything else, including programming errors surfaced through the
    /// same path
    Other,
}

impl std::fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureCategory::Credentials => write!(f, "credentials"),
            FailureCategory::Unauthorized => write!(f, "unauthorized"),
            FailureCategory::UnknownApi => write!(f, "unknown-api"),
            FailureCategory::Other => write!(f, "other"),
        }
    }
}

/// A classified failure with its rendered message.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    /// Assigned category
    pub category: FailureCategory,

    /// Rendered human-facing message
    pub message: String,
}

/// Classify a failure and render its diagnostic message.
///
/// Total over the failure hierarchy; the first matching category wins.
pub fn classify(error: &PublishError) -> Diagnostic {
    match error {
        // Local credential problem: the failure's own text is the message,
        // with no wrapping.
        PublishError::Credentials(message) => Diagnostic {
            category: FailureCategory::Credentials,
            message: message.clone(),
        },
        PublishError::Api {
            status: 401 | 403, ..
        } => Diagnostic {
            category: FailureCategory::Unauthorized,
            message: PERMISSION_DENIED.to_string(),
        },
        // The cause carries no API-level detail, so a single line beats a
        // trace.
        PublishError::Unknown(_) => Diagnostic {
            category: FailureCategory::UnknownApi,
            message: error.to_string(),
        },
        _ => Diagnostic {
            category: FailureCategory::Other,
            message: render_cause_chain(error),
        },
    }
}

/// Render an error followed by its full source chain, one cause per line.
fn render_cause_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut cause = error.source();
    while let Some(err) = cause {
        message.push_str("\nCaused by: ");
        message.push_str(&err.to_string());
        cause = err.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct KeyRejected;

    impl std::fmt::Display for KeyRejected {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "General error")
        }
    }

    impl std::error::Error for KeyRejected {}

    #[test]
    fn test_credentials_message_passes_through() {
        let err = PublishError::Credentials("This is the auth error".to_string());
        let diagnostic = classify(&err);

        assert_eq!(diagnostic.category, FailureCategory::Credentials);
        assert_eq!(diagnostic.message, "This is the auth error");
    }

    #[test]
    fn test_plain_io_cause_is_unknown() {
        let cause = std::io::Error::other("root cause");
        let err = PublishError::Unknown(Box::new(cause));
        let diagnostic = classify(&err);

        assert_eq!(diagnostic.category, FailureCategory::UnknownApi);
        assert_eq!(diagnostic.message, "Unknown error: root cause");
    }

    #[test]
    fn test_unauthorized_status_is_permission_message() {
        let err = PublishError::Api {
            status: 401,
            message: "any body content at all".to_string(),
        };
        let diagnostic = classify(&err);

        assert_eq!(diagnostic.category, FailureCategory::Unauthorized);
        assert_eq!(
            diagnostic.message,
            "\n- The API credentials provided do not have permission to apply these changes\n"
        );
    }

    #[test]
    fn test_forbidden_status_is_permission_message() {
        let err = PublishError::Api {
            status: 403,
            message: "forbidden".to_string(),
        };

        assert_eq!(classify(&err).category, FailureCategory::Unauthorized);
    }

    #[test]
    fn test_other_api_status_is_generic() {
        let err = PublishError::Api {
            status: 400,
            message: "releases must specify a version code".to_string(),
        };
        let diagnostic = classify(&err);

        assert_eq!(diagnostic.category, FailureCategory::Other);
        assert!(diagnostic
            .message
            .contains("releases must specify a version code"));
    }

    #[test]
    fn test_generic_failure_renders_cause_chain() {
        let err = PublishError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            KeyRejected,
        ));
        let diagnostic = classify(&err);

        assert_eq!(diagnostic.category, FailureCategory::Other);
        assert!(diagnostic.message.starts_with(&err.to_string()));
        assert!(diagnostic.message.contains("Caused by: General error"));
    }

    #[test]
    fn test_cancelled_is_generic() {
        let diagnostic = classify(&PublishError::Cancelled);

        assert_eq!(diagnostic.category, FailureCategory::Other);
        assert_eq!(diagnostic.message, "Publish cancelled before completion");
    }
}
