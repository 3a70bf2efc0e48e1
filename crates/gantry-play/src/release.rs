//! Track release construction
//!
//! Builds the release descriptor attached to a track within an edit. The
//! descriptor is immutable once built and serializes directly into the Play
//! API wire format, so unset fields must stay unset: a draft release that
//! carries `userFraction: 0.0` means something different to the API than one
//! that omits the field.

use serde::{Deserialize, Serialize};

/// Lifecycle status of a track release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReleaseStatus {
    /// Staged but not rolled out to any users
    Draft,
    /// Rolling out to a fraction of users
    InProgress,
    /// Fully rolled out
    Completed,
    /// Rollout stopped
    Halted,
}

impl std::fmt::Display for ReleaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReleaseStatus::Draft => write!(f, "draft"),
            ReleaseStatus::InProgress => write!(f, "inProgress"),
            ReleaseStatus::Completed => write!(f, "completed"),
            ReleaseStatus::Halted => write!(f, "halted"),
        }
    }
}

/// Operator-entered release note for one locale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseNote {
    /// BCP-47 locale tag (e.g., "en-US"); not validated here
    pub language: String,

    /// Free-form note text
    pub text: String,
}

/// Localized release-notes entry in Play API wire form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalizedText {
    /// BCP-47 locale tag
    pub language: String,

    /// Note text
    pub text: String,
}

/// Release descriptor for one track within an edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackRelease {
    /// Version codes included in the release, in caller order
    pub version_codes: Vec<i64>,

    /// Fraction of users receiving the release; unset for drafts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_fraction: Option<f64>,

    /// Derived lifecycle status
    pub status: ReleaseStatus,

    /// In-app update urgency; unset means "not specified", never 0
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_app_update_priority: Option<i32>,

    /// Localized release notes; sparse entries preserved positionally
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_notes: Option<Vec<Option<LocalizedText>>>,
}

/// Build a release descriptor from operator inputs.
///
/// Version codes are forwarded verbatim: order preserved, duplicates kept,
/// positivity is the caller's contract. The status is a total function of
/// the rollout fraction: absent or zero means a draft with the fraction left
/// unset, anything greater means an in-progress rollout at exactly that
/// fraction. Whether a full rollout should instead be marked completed is a
/// policy decision applied by the caller, not here (see
/// [`RolloutCompletion`]).
pub fn build_release(
    version_codes: Vec<i64>,
    rollout_fraction: Option<f64>,
    update_priority: Option<i32>,
    release_notes: Option<Vec<Option<LocalizedText>>>,
) -> TrackRelease {
    let (status, user_fraction) = match rollout_fraction {
        Some(fraction) if fraction > 0.0 => (ReleaseStatus::InProgress, Some(fraction)),
        _ => (ReleaseStatus::Draft, None),
    };

    TrackRelease {
        version_codes,
        user_fraction,
        status,
        in_app_update_priority: update_priority,
        release_notes,
    }
}

/// Map operator release notes into wire form.
///
/// Purely structural: the output has exactly the input's length, absent
/// entries stay absent at the same position, and locale tags are copied
/// without validation.
pub fn transform_release_notes(
    notes: Option<&[Option<ReleaseNote>]>,
) -> Option<Vec<Option<LocalizedText>>> {
    notes.map(|notes| {
        notes
            .iter()
            .map(|note| {
                note.as_ref().map(|note| LocalizedText {
                    language: note.language.clone(),
                    text: note.text.clone(),
                })
            })
            .collect()
    })
}

/// Policy for a rollout fraction at or above 1.0.
///
/// The visible API behavior does not pin this down, so it stays a caller
/// choice applied after [`build_release`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RolloutCompletion {
    /// Keep a full rollout as an in-progress release at fraction 1.0
    #[default]
    StayInProgress,

    /// Rewrite a full rollout to a completed release with no fraction
    CompleteAtFull,
}

impl RolloutCompletion {
    /// Apply the policy to a built release.
    pub fn apply(self, release: TrackRelease) -> TrackRelease {
        match self {
            RolloutCompletion::CompleteAtFull
                if release.user_fraction.is_some_and(|f| f >= 1.0) =>
            {
                TrackRelease {
                    user_fraction: None,
                    status: ReleaseStatus::Completed,
                    ..release
                }
            }
            _ => release,
        }
    }
}
