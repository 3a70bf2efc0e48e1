//! Resumable upload transport
//!
//! Uploading an artifact is a two-step protocol: an initiation request opens
//! an upload session, and the server answers with a `Location` header
//! redirecting the actual byte transfer to a continuation URL. The redirect
//! is the expected path for large payloads, not a failure, so it consumes no
//! retry budget. Callers see one logical operation.
//!
//! The phase machine is explicit (`Initiated` → `Redirected` →
//! `Transferred`) and advanced by a pure function, so redirect handling is
//! testable without a network stack.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use crate::error::{PublishError, Result};
use crate::traits::TokenProvider;

/// Maximum number of retries for transient transport failures.
const MAX_RETRIES: u32 = 3;

/// Base delay for exponential backoff, in milliseconds.
const BASE_DELAY_MS: u64 = 1000;

/// A terminal HTTP response reduced to what the transport inspects.
#[derive(Debug, Clone)]
pub struct RawResponse {
    /// HTTP status code
    pub status: u16,

    /// `Location` header, when present
    pub location: Option<String>,

    /// Raw body text
    pub body: String,
}

impl RawResponse {
    fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Progress of one resumable upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadPhase {
    /// Initiation issued; no server answer consumed yet
    Initiated,

    /// Server redirected the byte transfer to a continuation URL
    Redirected {
        /// Continuation URL from the `Location` header
        location: String,
    },

    /// Bytes accepted; the upload is complete
    Transferred,
}

/// Advance the phase machine with a terminal response.
pub fn advance(phase: &UploadPhase, response: &RawResponse) -> Result<UploadPhase> {
    if !response.is_success() {
        return Err(response_error(response));
    }

    match phase {
        UploadPhase::Initiated => {
            let location = response.location.as_deref().ok_or_else(|| {
                PublishError::Other(
                    "Resumable upload initiation returned no continuation location".to_string(),
                )
            })?;

            let location = Url::parse(location).map_err(|_| {
                PublishError::Other(format!("Invalid continuation URL: {}", location))
            })?;

            Ok(UploadPhase::Redirected {
                location: location.to_string(),
            })
        }
        UploadPhase::Redirected { .. } | UploadPhase::Transferred => Ok(UploadPhase::Transferred),
    }
}

/// Structured Google API error body.
#[derive(Debug, Deserialize)]
struct GoogleErrorBody {
    error: GoogleErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GoogleErrorDetail {
    #[serde(default)]
    message: String,
}

/// Map a non-success terminal response into the failure hierarchy, keeping
/// the structured error message when the body parses as one.
pub(crate) fn response_error(response: &RawResponse) -> PublishError {
    let message = serde_json::from_str::<GoogleErrorBody>(&response.body)
        .map(|body| body.error.message)
        .unwrap_or_else(|_| response.body.clone());

    PublishError::Api {
        status: response.status,
        message,
    }
}

/// Retry policy for transient failures, with exponential backoff.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum retry attempts after the first try
    pub max_retries: u32,

    /// Delay before the first retry; doubles on each subsequent one
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            base_delay: Duration::from_millis(BASE_DELAY_MS),
        }
    }
}

impl RetryPolicy {
    /// Delay before the given retry attempt (1-based).
    fn delay(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }

    /// Run `operation`, retrying transient failures within budget.
    pub(crate) async fn run<T, F, Fut>(&self, name: &str, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let mut attempts = 0;

        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempts < self.max_retries => {
                    attempts += 1;
                    let delay = self.delay(attempts);
                    warn!(
                        "{} failed (attempt {}/{}): {}; retrying in {:?}",
                        name,
                        attempts,
                        self.max_retries + 1,
                        err,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Seam for issuing the two upload requests.
#[async_trait::async_trait]
pub trait UploadHttp: Send + Sync {
    /// Issue the resumable initiation request.
    async fn initiate(&self, url: &str) -> Result<RawResponse>;

    /// Transfer the artifact bytes to `url`.
    async fn transfer(&self, url: &str, bytes: &[u8]) -> Result<RawResponse>;
}

/// Drives one resumable upload through the phase machine.
pub struct ResumableUpload<H> {
    http: H,
    retry: RetryPolicy,
}

impl<H: UploadHttp> ResumableUpload<H> {
    /// Create a transport with the default retry policy.
    pub fn new(http: H) -> Self {
        Self::with_retry(http, RetryPolicy::default())
    }

    /// Create a transport with an explicit retry policy.
    pub fn with_retry(http: H, retry: RetryPolicy) -> Self {
        Self { http, retry }
    }

    /// Upload `bytes` to `url` as one logical operation, following the
    /// server's continuation redirect.
    pub async fn run(&self, url: &str, bytes: &[u8]) -> Result<RawResponse> {
        let initiation = self
            .retry
            .run("Upload initiation", || self.http.initiate(url))
            .await
            .map_err(wrap_transport)?;

        let location = match advance(&UploadPhase::Initiated, &initiation)? {
            UploadPhase::Redirected { location } => location,
            phase => {
                return Err(PublishError::Other(format!(
                    "Unexpected upload phase after initiation: {:?}",
                    phase
                )))
            }
        };

        debug!("Upload redirected to continuation URL");

        let transfer = self
            .retry
            .run("Upload transfer", || self.http.transfer(&location, bytes))
            .await
            .map_err(wrap_transport)?;

        advance(
            &UploadPhase::Redirected {
                location: location.clone(),
            },
            &transfer,
        )?;

        Ok(transfer)
    }
}

/// Terminal transport failures carry no structured API detail; wrap them so
/// the classifier reports them as unknown rather than generic.
fn wrap_transport(err: PublishError) -> PublishError {
    match err {
        PublishError::Http(e) => PublishError::Unknown(Box::new(e)),
        PublishError::Io(e) => PublishError::Unknown(Box::new(e)),
        other => other,
    }
}

/// `UploadHttp` implementation over reqwest.
pub struct HttpUploadClient {
    client: reqwest::Client,
    token: Arc<dyn TokenProvider>,
}

impl HttpUploadClient {
    /// Create a client issuing bearer-authenticated upload requests.
    pub fn new(client: reqwest::Client, token: Arc<dyn TokenProvider>) -> Self {
        Self { client, token }
    }
}

#[async_trait::async_trait]
impl UploadHttp for HttpUploadClient {
    async fn initiate(&self, url: &str) -> Result<RawResponse> {
        let token = self.token.access_token().await?;

        let response = self
            .client
            .post(url)
            .header("Authorization", format!("Bearer {}", token))
            .header("X-Goog-Upload-Protocol", "resumable")
            .send()
            .await?;

        into_raw(response).await
    }

    async fn transfer(&self, url: &str, bytes: &[u8]) -> Result<RawResponse> {
        let token = self.token.access_token().await?;

        let response = self
            .client
            .put(url)
            .header("Authorization", format!("Bearer {}", token))
            .header("Content-Type", "application/octet-stream")
            .body(bytes.to_vec())
            .send()
            .await?;

        into_raw(response).await
    }
}

async fn into_raw(response: reqwest::Response) -> Result<RawResponse> {
    let status = response.status().as_u16();
    let location = response
        .headers()
        .get(reqwest::header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    let body = response.text().await?;

    Ok(RawResponse {
        status,
        location,
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn success_with_location(location: &str) -> RawResponse {
        RawResponse {
            status: 200,
            location: Some(location.to_string()),
            body: String::new(),
        }
    }

    #[test]
    fn test_initiation_redirect_advances() {
        let response = success_with_location("https://google.local/uploading/foo");
        let phase = advance(&UploadPhase::Initiated, &response).unwrap();

        assert_eq!(
            phase,
            UploadPhase::Redirected {
                location: "https://google.local/uploading/foo".to_string()
            }
        );
    }

    #[test]
    fn test_initiation_without_location_fails() {
        let response = RawResponse {
            status: 200,
            location: None,
            body: String::new(),
        };
        let err = advance(&UploadPhase::Initiated, &response).unwrap_err();

        assert!(matches!(err, PublishError::Other(_)));
    }

    #[test]
    fn test_initiation_with_malformed_location_fails() {
        let response = success_with_location("not a url");
        let err = advance(&UploadPhase::Initiated, &response).unwrap_err();

        assert!(matches!(err, PublishError::Other(_)));
    }

    #[test]
    fn test_transfer_success_completes() {
        let phase = UploadPhase::Redirected {
            location: "https://google.local/uploading/foo".to_string(),
        };
        let response = RawResponse {
            status: 200,
            location: None,
            body: r#"{"versionCode": 42}"#.to_string(),
        };

        assert_eq!(
            advance(&phase, &response).unwrap(),
            UploadPhase::Transferred
        );
    }

    #[test]
    fn test_structured_error_body_is_kept() {
        let response = RawResponse {
            status: 403,
            location: None,
            body: r#"{"error": {"code": 403, "message": "APK specifies a version code already used"}}"#
                .to_string(),
        };

        match response_error(&response) {
            PublishError::Api { status, message } => {
                assert_eq!(status, 403);
                assert_eq!(message, "APK specifies a version code already used");
            }
            other => panic!("expected Api error, got {:?}", other),
        }
    }

    #[test]
    fn test_unstructured_error_body_is_raw_text() {
        let response = RawResponse {
            status: 502,
            location: None,
            body: "Bad Gateway".to_string(),
        };

        match response_error(&response) {
            PublishError::Api { status, message } => {
                assert_eq!(status, 502);
                assert_eq!(message, "Bad Gateway");
            }
            other => panic!("expected Api error, got {:?}", other),
        }
    }

    /// Fake transport: initiation always redirects; the transfer fails with
    /// connection resets a configured number of times before succeeding.
    struct FlakyHttp {
        transfer_failures: u32,
        transfers: AtomicU32,
    }

    impl FlakyHttp {
        fn new(transfer_failures: u32) -> Self {
            Self {
                transfer_failures,
                transfers: AtomicU32::new(0),
            }
        }
    }

    #[async_trait::async_trait]
    impl UploadHttp for FlakyHttp {
        async fn initiate(&self, _url: &str) -> Result<RawResponse> {
            Ok(success_with_location("https://google.local/uploading/foo"))
        }

        async fn transfer(&self, _url: &str, _bytes: &[u8]) -> Result<RawResponse> {
            let attempt = self.transfers.fetch_add(1, Ordering::SeqCst);
            if attempt < self.transfer_failures {
                return Err(PublishError::Io(std::io::Error::new(
                    std::io::ErrorKind::ConnectionReset,
                    "connection reset",
                )));
            }

            Ok(RawResponse {
                status: 200,
                location: None,
                body: r#"{"versionCode": 42}"#.to_string(),
            })
        }
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_retries: 2,
            base_delay: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn test_transient_transfer_failure_retried_within_budget() {
        let http = FlakyHttp::new(2);
        let upload = ResumableUpload::with_retry(http, fast_retry());

        let response = upload
            .run("https://publisher.local/upload", b"artifact bytes")
            .await
            .unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(upload.http.transfers.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausted_retry_budget_surfaces_unknown() {
        let http = FlakyHttp::new(10);
        let upload = ResumableUpload::with_retry(http, fast_retry());

        let err = upload
            .run("https://publisher.local/upload", b"artifact bytes")
            .await
            .unwrap_err();

        assert!(matches!(err, PublishError::Unknown(_)));
        // First try plus two retries.
        assert_eq!(upload.http.transfers.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_redirect_consumes_no_retry_budget() {
        let http = FlakyHttp::new(0);
        let upload = ResumableUpload::with_retry(
            http,
            RetryPolicy {
                max_retries: 0,
                base_delay: Duration::ZERO,
            },
        );

        let response = upload
            .run("https://publisher.local/upload", b"bytes")
            .await
            .unwrap();

        assert_eq!(response.body, r#"{"versionCode": 42}"#);
    }
}
