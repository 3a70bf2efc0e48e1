//! Edit transaction coordination
//!
//! The Play Developer API applies changes through an edit: a server-side
//! staging area that becomes visible only on commit. One [`EditTransaction`]
//! owns one edit id for its whole lifetime and drives it
//! `Opened → Staging → TrackUpdated → Committed`, or to `Abandoned` from any
//! non-terminal state. Abandoned edits are left for the service to expire;
//! the id must not be reused.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{PublishError, Result};
use crate::release::{build_release, transform_release_notes, RolloutCompletion, TrackRelease};
use crate::report::{classify, Diagnostic};
use crate::traits::{ArtifactSource, EditApi, TokenProvider};
use crate::types::{Artifact, PlayConfig, ReleasePlan};
use crate::upload::{response_error, HttpUploadClient, RawResponse, ResumableUpload, RetryPolicy};

const API_BASE_URL: &str = "https://androidpublisher.googleapis.com/androidpublisher/v3";
const UPLOAD_BASE_URL: &str = "https://androidpublisher.googleapis.com/upload/androidpublisher/v3";

/// Lifecycle of one edit transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EditState {
    /// Edit handle obtained; no remote changes visible
    Opened,
    /// Artifacts uploading into the edit
    Staging,
    /// Release descriptors attached to their tracks
    TrackUpdated,
    /// Commit accepted; all staged changes are live
    Committed,
    /// Terminal failure; the remote edit is left to expire
    Abandoned,
}

impl std::fmt::Display for EditState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EditState::Opened => write!(f, "opened"),
            EditState::Staging => write!(f, "staging"),
            EditState::TrackUpdated => write!(f, "track-updated"),
            EditState::Committed => write!(f, "committed"),
            EditState::Abandoned => write!(f, "abandoned"),
        }
    }
}

/// Terminal outcome of one transaction.
#[derive(Debug, Serialize)]
pub struct PublishOutcome {
    /// Terminal state: `Committed` or `Abandoned`
    pub state: EditState,

    /// Version codes of artifacts staged before the terminal state
    pub version_codes: Vec<i64>,

    /// Classified diagnostic; present exactly when abandoned
    pub diagnostic: Option<Diagnostic>,

    /// Completion timestamp
    pub finished_at: DateTime<Utc>,
}

impl PublishOutcome {
    /// Whether the edit was committed.
    pub fn success(&self) -> bool {
        self.state == EditState::Committed
    }
}

/// Real `EditApi` over the Play Developer API v3.
pub struct PlayEditApi {
    config: PlayConfig,
    client: reqwest::Client,
    token: Arc<dyn TokenProvider>,
    retry: RetryPolicy,
}

impl PlayEditApi {
    /// Create a client with per-request timeouts from the configuration.
    pub fn new(config: PlayConfig, token: Arc<dyn TokenProvider>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            config,
            client,
            token,
            retry: RetryPolicy::default(),
        })
    }

    /// Override the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Make an authenticated API request.
    async fn api_call<T: serde::de::DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<T> {
        let token = self.token.access_token().await?;
        let url = format!("{}{}", API_BASE_URL, endpoint);

        let mut request = self
            .client
            .request(method.clone(), &url)
            .header("Authorization", format!("Bearer {}", token))
            .header("Content-Type", "application/json");

        if let Some(body) = body {
            request = request.json(body);
        }

        debug!("Making {} request to {}", method, url);

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(response_error(&RawResponse {
                status: status.as_u16(),
                location: None,
                body,
            }));
        }

        Ok(response.json().await?)
    }
}

#[async_trait::async_trait]
impl EditApi for PlayEditApi {
    async fn open_edit(&self) -> Result<String> {
        #[derive(Deserialize)]
        struct EditResponse {
            id: String,
        }

        let endpoint = format!("/applications/{}/edits", self.config.package_name);
        let body = serde_json::json!({});

        let response: EditResponse = self
            .retry
            .run("Open edit", || {
                self.api_call(Method::POST, &endpoint, Some(&body))
            })
            .await?;

        debug!("Opened edit {}", response.id);
        Ok(response.id)
    }

    async fn upload_artifact(&self, edit_id: &str, artifact: &Artifact) -> Result<i64> {
        let url = format!(
            "{}/applications/{}/edits/{}/{}?uploadType=resumable",
            UPLOAD_BASE_URL,
            self.config.package_name,
            edit_id,
            artifact.kind.endpoint()
        );

        info!("Uploading {} ({} bytes)", artifact.name, artifact.bytes.len());

        let uploader = ResumableUpload::with_retry(
            HttpUploadClient::new(self.client.clone(), Arc::clone(&self.token)),
            self.retry,
        );
        let response = uploader.run(&url, &artifact.bytes).await?;

        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct UploadResponse {
            version_code: i64,
        }

        let parsed: UploadResponse = serde_json::from_str(&response.body)?;
        Ok(parsed.version_code)
    }

    async fn update_track(
        &self,
        edit_id: &str,
        track: &str,
        release: &TrackRelease,
    ) -> Result<()> {
        let endpoint = format!(
            "/applications/{}/edits/{}/tracks/{}",
            self.config.package_name, edit_id, track
        );
        let body = serde_json::json!({
            "track": track,
            "releases": [release]
        });

        let _: serde_json::Value = self
            .retry
            .run("Track update", || {
                self.api_call(Method::PUT, &endpoint, Some(&body))
            })
            .await?;

        Ok(())
    }

    async fn commit_edit(&self, edit_id: &str) -> Result<()> {
        // Never retried: a rejected commit reflects a content problem, and
        // re-posting after a transport failure could double-commit.
        let endpoint = format!(
            "/applications/{}/edits/{}:commit",
            self.config.package_name, edit_id
        );

        let _: serde_json::Value = self.api_call(Method::POST, &endpoint, None).await?;

        info!("Committed edit {}", edit_id);
        Ok(())
    }
}

/// Coordinates one edit transaction from open to commit.
pub struct EditTransaction {
    api: Arc<dyn EditApi>,
    artifacts: Arc<dyn ArtifactSource>,
    plans: Vec<ReleasePlan>,
    completion: RolloutCompletion,
    cancel: Arc<AtomicBool>,
}

impl EditTransaction {
    /// Create a transaction over injected collaborators.
    pub fn new(
        api: Arc<dyn EditApi>,
        artifacts: Arc<dyn ArtifactSource>,
        plans: Vec<ReleasePlan>,
    ) -> Self {
        Self {
            api,
            artifacts,
            plans,
            completion: RolloutCompletion::default(),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Set the full-rollout completion policy.
    pub fn with_completion(mut self, completion: RolloutCompletion) -> Self {
        self.completion = completion;
        self
    }

    /// Handle the caller can flip to stop the transaction before its next
    /// network call. In-flight calls are allowed to finish.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Run the transaction to a terminal state.
    ///
    /// Never returns an error: failures are classified into the outcome's
    /// diagnostic, exactly one per failed transaction.
    pub async fn run(self) -> PublishOutcome {
        let mut state = EditState::Opened;
        let mut version_codes = Vec::new();

        match self.execute(&mut state, &mut version_codes).await {
            Ok(()) => PublishOutcome {
                state: EditState::Committed,
                version_codes,
                diagnostic: None,
                finished_at: Utc::now(),
            },
            Err(err) => {
                warn!("Publish failed in {} state: {}", state, err);
                PublishOutcome {
                    state: EditState::Abandoned,
                    version_codes,
                    diagnostic: Some(classify(&err)),
                    finished_at: Utc::now(),
                }
            }
        }
    }

    async fn execute(
        &self,
        state: &mut EditState,
        version_codes: &mut Vec<i64>,
    ) -> Result<()> {
        self.checkpoint()?;
        let edit_id = self.api.open_edit().await?;
        *state = EditState::Opened;

        let artifacts = self.artifacts.artifacts().await?;

        *state = EditState::Staging;
        for artifact in &artifacts {
            self.checkpoint()?;
            // The first failure abandons the edit: a partially staged set
            // cannot be meaningfully committed.
            let version_code = self.api.upload_artifact(&edit_id, artifact).await?;
            info!("Staged {} as version code {}", artifact.name, version_code);
            version_codes.push(version_code);
        }

        for plan in &self.plans {
            self.checkpoint()?;
            let notes = transform_release_notes(plan.release_notes.as_deref());
            let release = build_release(
                version_codes.clone(),
                plan.rollout_fraction,
                plan.update_priority,
                notes,
            );
            let release = self.completion.apply(release);

            debug!(
                "Attaching {} release to track {}",
                release.status, plan.track
            );
            self.api
                .update_track(&edit_id, &plan.track, &release)
                .await?;
        }
        *state = EditState::TrackUpdated;

        self.checkpoint()?;
        self.api.commit_edit(&edit_id).await?;
        Ok(())
    }

    fn checkpoint(&self) -> Result<()> {
        if self.cancel.load(Ordering::SeqCst) {
            return Err(PublishError::Cancelled);
        }
        Ok(())
    }
}
