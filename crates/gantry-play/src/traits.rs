//! Injection seams for the edit transaction
//!
//! The coordinator receives these as explicit constructor parameters so
//! every collaborator can be replaced in tests without a network stack or
//! a real credential file.

use crate::error::Result;
use crate::release::TrackRelease;
use crate::types::Artifact;

/// Remote edit operations used by the coordinator.
///
/// Implemented over the Play Developer API by
/// [`crate::edit::PlayEditApi`]; test doubles script each call.
#[async_trait::async_trait]
pub trait EditApi: Send + Sync {
    /// Open a new edit and return its identifier.
    async fn open_edit(&self) -> Result<String>;

    /// Upload one artifact into the edit, returning its version code.
    async fn upload_artifact(&self, edit_id: &str, artifact: &Artifact) -> Result<i64>;

    /// Replace the releases of a track within the edit.
    async fn update_track(
        &self,
        edit_id: &str,
        track: &str,
        release: &TrackRelease,
    ) -> Result<()>;

    /// Commit the edit, making all staged changes live atomically.
    async fn commit_edit(&self, edit_id: &str) -> Result<()>;
}

/// Supplies the artifacts to stage into an edit.
#[async_trait::async_trait]
pub trait ArtifactSource: Send + Sync {
    /// Produce the artifacts for one transaction, in upload order.
    async fn artifacts(&self) -> Result<Vec<Artifact>>;
}

/// Supplies OAuth2 bearer tokens for API calls.
#[async_trait::async_trait]
pub trait TokenProvider: Send + Sync {
    /// Return a token valid for at least the next request.
    async fn access_token(&self) -> Result<String>;
}
