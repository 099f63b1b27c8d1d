//! Profile loading and saving.
//!
//! The header and the profile page both need the signed-in user's avatar.
//! They each call [`ProfileService::resolve_avatar`] (or [`ProfileService::load`],
//! which runs the same resolution on the row it fetched) on every render.
//! Nothing is cached between requests.

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::instrument;

use techplement_core::{
    DisplayName, DisplayNameError, Profile, ProfilePatch, SIGNED_URL_TTL_SECS, UserId,
};

use crate::backend::{AccessToken, BackendError, ObjectStorage, ProfileStore};

/// Errors from profile operations.
#[derive(Debug, Error)]
pub enum ProfileError {
    /// Form input rejected before any backend call.
    #[error(transparent)]
    Validation(#[from] DisplayNameError),

    /// No profile row exists for the user.
    #[error("profile not found for user {0}")]
    NotFound(UserId),

    /// Backend call failed.
    #[error("backend error: {0}")]
    Backend(BackendError),
}

impl ProfileError {
    /// Whether the backend no longer accepts the user's token.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Backend(e) if e.is_unauthorized())
    }
}

/// A fetched profile with its avatar resolved for display.
#[derive(Debug, Clone)]
pub struct LoadedProfile {
    /// The stored row.
    pub profile: Profile,
    /// Signed display URL. `None` when there is no avatar or signing failed.
    pub avatar_url: Option<String>,
}

/// Profile service.
pub struct ProfileService<'a> {
    profiles: &'a dyn ProfileStore,
    storage: &'a dyn ObjectStorage,
}

impl<'a> ProfileService<'a> {
    /// Create a new profile service.
    #[must_use]
    pub const fn new(profiles: &'a dyn ProfileStore, storage: &'a dyn ObjectStorage) -> Self {
        Self { profiles, storage }
    }

    /// Fetch the profile row and resolve its avatar.
    ///
    /// # Errors
    ///
    /// Returns `ProfileError::NotFound` when the user has no row, and
    /// `ProfileError::Backend` when the fetch fails. A signing failure is
    /// not an error; the avatar is simply left unresolved.
    #[instrument(skip(self, token), fields(user_id = %user_id))]
    pub async fn load(
        &self,
        token: &AccessToken,
        user_id: &UserId,
    ) -> Result<LoadedProfile, ProfileError> {
        let profile = self.fetch(token, user_id).await?;
        let avatar_url = self.display_url(token, &profile).await;

        Ok(LoadedProfile {
            profile,
            avatar_url,
        })
    }

    /// Resolve the user's avatar display URL.
    ///
    /// Any failure is logged and yields `None`, so callers fall back to the
    /// initials or icon.
    #[instrument(skip(self, token), fields(user_id = %user_id))]
    pub async fn resolve_avatar(&self, token: &AccessToken, user_id: &UserId) -> Option<String> {
        match self.fetch(token, user_id).await {
            Ok(profile) => self.display_url(token, &profile).await,
            Err(e) => {
                tracing::error!(error = %e, "Failed to fetch profile for avatar");
                None
            }
        }
    }

    /// Save the display name from the profile form.
    ///
    /// Writes exactly the name and `now`.
    ///
    /// # Errors
    ///
    /// Returns `ProfileError::Validation` for an empty name (no backend call
    /// is made) and `ProfileError::Backend` if the update fails.
    #[instrument(skip(self, token, full_name), fields(user_id = %user_id))]
    pub async fn save_name(
        &self,
        token: &AccessToken,
        user_id: &UserId,
        full_name: &str,
        now: DateTime<Utc>,
    ) -> Result<DisplayName, ProfileError> {
        let name = DisplayName::parse(full_name)?;
        let patch = ProfilePatch::name(name.clone(), now);

        self.profiles
            .update_profile(token, user_id, &patch)
            .await
            .map_err(ProfileError::Backend)?;

        Ok(name)
    }

    async fn fetch(&self, token: &AccessToken, user_id: &UserId) -> Result<Profile, ProfileError> {
        self.profiles
            .fetch_profile(token, user_id)
            .await
            .map_err(|e| match e {
                BackendError::NotFound(_) => ProfileError::NotFound(user_id.clone()),
                other => ProfileError::Backend(other),
            })
    }

    /// Exchange the stored avatar reference for a signed display URL.
    async fn display_url(&self, token: &AccessToken, profile: &Profile) -> Option<String> {
        let key = profile.avatar_object_key()?;

        match self
            .storage
            .signed_url(token, key, SIGNED_URL_TTL_SECS)
            .await
        {
            Ok(url) => Some(url),
            Err(e) => {
                tracing::warn!(error = %e, object_key = key, "Failed to sign avatar URL");
                None
            }
        }
    }
}
