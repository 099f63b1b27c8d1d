//! Avatar upload workflow.
//!
//! A selected file goes through these steps:
//!
//! 1. Local validation (image type, 5 MiB). Nothing touches the network on
//!    rejection.
//! 2. A `data:` preview is built from the bytes.
//! 3. The user is marked as uploading; a second upload for the same user is
//!    refused until the first finishes.
//! 4. The bytes are stored under `{user_id}-{millis}.{ext}` with upsert and a
//!    one hour cache lifetime.
//! 5. The public reference of that key is written to the profile row.
//!
//! The uploading mark is released on every path. On success the preview is
//! dropped, since the stored avatar now displays the same image. On failure
//! it is handed back so the page can keep showing it until the next reload.

use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

use thiserror::Error;
use tracing::instrument;

use techplement_core::{
    AVATAR_CACHE_CONTROL_SECS, PreviewUrl, ProfilePatch, StorageKey, UploadCandidate, UploadError,
    UserId,
};

use super::Clock;
use crate::backend::{AccessToken, BackendError, ObjectStorage, ProfileStore, UploadOptions};

/// Why an avatar upload did not complete.
#[derive(Debug, Error)]
pub enum UploadWorkflowError {
    /// The file was refused locally.
    #[error(transparent)]
    Invalid(#[from] UploadError),

    /// Another upload for this user is still running.
    #[error("an upload is already in progress")]
    InProgress,

    /// Storing the object failed.
    #[error("upload failed: {0}")]
    Upload(BackendError),

    /// The object was stored but the profile row was not updated.
    #[error("saving avatar reference failed: {0}")]
    Persist(BackendError),
}

impl UploadWorkflowError {
    /// Message shown to the user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Invalid(err) => err.to_string(),
            Self::InProgress => "An upload is already in progress".to_string(),
            Self::Upload(_) | Self::Persist(_) => "Error uploading image".to_string(),
        }
    }

    /// Whether the backend no longer accepts the user's token.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Upload(e) | Self::Persist(e) if e.is_unauthorized())
    }
}

/// A failed upload, with the preview to keep on screen if one was built.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct UploadFailure {
    /// What went wrong.
    #[source]
    pub error: UploadWorkflowError,
    /// Preview of the accepted file. `None` if the file was never accepted.
    pub preview: Option<PreviewUrl>,
}

impl UploadFailure {
    const fn rejected(error: UploadWorkflowError) -> Self {
        Self {
            error,
            preview: None,
        }
    }
}

/// A completed upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    /// Key the object was stored under.
    pub key: StorageKey,
    /// Public reference written to the profile row.
    pub public_url: String,
}

/// Users with an upload in flight.
#[derive(Debug, Default)]
pub struct UploadTracker {
    in_flight: Mutex<HashSet<UserId>>,
}

impl UploadTracker {
    /// Create an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `user_id` as uploading.
    ///
    /// Returns `None` if an upload for that user is already running. The
    /// mark is cleared when the returned guard is dropped.
    #[must_use]
    pub fn begin(&self, user_id: &UserId) -> Option<UploadGuard<'_>> {
        let inserted = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(user_id.clone());

        inserted.then(|| UploadGuard {
            tracker: self,
            user_id: user_id.clone(),
        })
    }

    /// Whether an upload for `user_id` is running.
    #[must_use]
    pub fn is_uploading(&self, user_id: &UserId) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(user_id)
    }
}

/// Uploading mark for one user, released on drop.
#[derive(Debug)]
pub struct UploadGuard<'a> {
    tracker: &'a UploadTracker,
    user_id: UserId,
}

impl Drop for UploadGuard<'_> {
    fn drop(&mut self) {
        self.tracker
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.user_id);
    }
}

/// Avatar upload service.
pub struct AvatarUploadService<'a> {
    profiles: &'a dyn ProfileStore,
    storage: &'a dyn ObjectStorage,
    clock: &'a dyn Clock,
    tracker: &'a UploadTracker,
}

impl<'a> AvatarUploadService<'a> {
    /// Create a new upload service.
    #[must_use]
    pub const fn new(
        profiles: &'a dyn ProfileStore,
        storage: &'a dyn ObjectStorage,
        clock: &'a dyn Clock,
        tracker: &'a UploadTracker,
    ) -> Self {
        Self {
            profiles,
            storage,
            clock,
            tracker,
        }
    }

    /// Run the upload workflow for a file the user selected.
    ///
    /// # Errors
    ///
    /// Returns an [`UploadFailure`] describing the step that failed. When the
    /// file passed validation the failure carries its preview.
    #[instrument(
        skip(self, token, candidate),
        fields(user_id = %user_id, file = candidate.file_name(), size = candidate.len())
    )]
    pub async fn handle_image_selected(
        &self,
        token: &AccessToken,
        user_id: &UserId,
        candidate: UploadCandidate,
    ) -> Result<UploadOutcome, UploadFailure> {
        let upload = candidate
            .validate()
            .map_err(|e| UploadFailure::rejected(e.into()))?;
        let preview = upload.preview();

        let Some(_uploading) = self.tracker.begin(user_id) else {
            tracing::warn!("Upload already in progress");
            return Err(UploadFailure::rejected(UploadWorkflowError::InProgress));
        };

        let key = upload.storage_key(user_id, self.clock.now().timestamp_millis());
        let content_type = upload.content_type().to_owned();
        let options = UploadOptions {
            cache_control_secs: AVATAR_CACHE_CONTROL_SECS,
            upsert: true,
        };

        if let Err(e) = self
            .storage
            .upload(token, &key, &content_type, upload.into_bytes(), options)
            .await
        {
            tracing::error!(error = %e, key = %key, "Avatar upload failed");
            return Err(UploadFailure {
                error: UploadWorkflowError::Upload(e),
                preview: Some(preview),
            });
        }

        let public_url = self.storage.public_url(&key);
        if let Err(e) = self
            .profiles
            .update_profile(token, user_id, &ProfilePatch::avatar(public_url.clone()))
            .await
        {
            tracing::error!(error = %e, key = %key, "Saving avatar reference failed");
            return Err(UploadFailure {
                error: UploadWorkflowError::Persist(e),
                preview: Some(preview),
            });
        }

        tracing::info!(key = %key, "Avatar updated");
        Ok(UploadOutcome { key, public_url })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_tracker_guard_releases_on_drop() {
        let tracker = UploadTracker::new();
        let user = UserId::new("u1");

        {
            let guard = tracker.begin(&user);
            assert!(guard.is_some());
            assert!(tracker.is_uploading(&user));
            assert!(tracker.begin(&user).is_none());
        }

        assert!(!tracker.is_uploading(&user));
        assert!(tracker.begin(&user).is_some());
    }

    #[test]
    fn test_tracker_is_per_user() {
        let tracker = UploadTracker::new();
        let _a = tracker.begin(&UserId::new("a")).unwrap();
        assert!(tracker.begin(&UserId::new("b")).is_some());
    }

    #[test]
    fn test_user_messages() {
        let err: UploadWorkflowError = UploadError::TooLarge { size: 2, max: 1 }.into();
        assert_eq!(err.user_message(), "Image size should be less than 5MB");
        assert_eq!(
            UploadWorkflowError::Persist(BackendError::Parse("x".into())).user_message(),
            "Error uploading image"
        );
    }

    #[test]
    fn test_rejected_token_is_unauthorized() {
        let expired = || BackendError::Unauthorized("JWT expired".into());
        assert!(UploadWorkflowError::Upload(expired()).is_unauthorized());
        assert!(UploadWorkflowError::Persist(expired()).is_unauthorized());
        assert!(!UploadWorkflowError::InProgress.is_unauthorized());
        assert!(
            !UploadWorkflowError::Upload(BackendError::Parse("x".into())).is_unauthorized()
        );
    }
}
