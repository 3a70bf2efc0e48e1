//! Google Play Console edit-transaction publisher
//!
//! This crate drives the Google Play Developer API v3 edit workflow:
//! open an edit, upload APKs or app bundles through the resumable upload
//! protocol, attach releases to distribution tracks with a staged-rollout
//! policy, and commit the edit atomically.
//!
//! ## Edit-Based Workflow
//!
//! The Play API collects changes in a server-side edit that becomes visible
//! only on commit:
//! 1. Open an edit session
//! 2. Stage artifacts and track releases within the edit
//! 3. Commit the edit to apply everything (or abandon it to discard)
//!
//! ## Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use gantry_play::{
//!     EditTransaction, FileArtifactSource, PlayConfig, PlayEditApi,
//!     ReleasePlan, ServiceAccountKey, ServiceAccountTokenProvider,
//! };
//!
//! let key = ServiceAccountKey::from_file(&key_path)?;
//! let token = Arc::new(ServiceAccountTokenProvider::new(key));
//! let api = Arc::new(PlayEditApi::new(PlayConfig::new("com.example.app"), token)?);
//! let artifacts = Arc::new(FileArtifactSource::new(vec![bundle_path]));
//!
//! let outcome = EditTransaction::new(api, artifacts, vec![ReleasePlan {
//!     track: "internal".to_string(),
//!     rollout_fraction: Some(0.05),
//!     ..ReleasePlan::default()
//! }])
//! .run()
//! .await;
//! ```
//!
//! ## Failure Reporting
//!
//! Failures form a closed hierarchy ([`PublishError`]) and are classified
//! into one of four categories with exactly one rendered message per failed
//! transaction (see [`report`]).

pub mod auth;
pub mod edit;
pub mod error;
pub mod release;
pub mod report;
pub mod traits;
pub mod types;
pub mod upload;

pub use auth::{ServiceAccountKey, ServiceAccountTokenProvider, StaticTokenProvider};
pub use edit::{EditState, EditTransaction, PlayEditApi, PublishOutcome};
pub use error::{PublishError, Result};
pub use release::{
    build_release, transform_release_notes, LocalizedText, ReleaseNote, ReleaseStatus,
    RolloutCompletion, TrackRelease,
};
pub use report::{classify, Diagnostic, FailureCategory};
pub use traits::{ArtifactSource, EditApi, TokenProvider};
pub use types::{Artifact, ArtifactKind, FileArtifactSource, PlayConfig, ReleasePlan};
pub use upload::{RawResponse, ResumableUpload, RetryPolicy, UploadHttp, UploadPhase};
