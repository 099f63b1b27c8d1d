//! Application state shared across handlers.

use std::sync::Arc;

use crate::backend::{AuthProvider, BackendError, ObjectStorage, ProfileStore, SupabaseClient};
use crate::config::WebConfig;
use crate::services::{
    AuthService, AvatarUploadService, Clock, ProfileService, SystemClock, UploadTracker,
};

/// Backend collaborators the application is wired to.
pub struct Collaborators {
    pub auth: Arc<dyn AuthProvider>,
    pub profiles: Arc<dyn ProfileStore>,
    pub storage: Arc<dyn ObjectStorage>,
    pub clock: Arc<dyn Clock>,
}

impl Collaborators {
    /// Wire every collaborator to one backend client and the wall clock.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend client cannot be built.
    pub fn from_config(config: &WebConfig) -> Result<Self, BackendError> {
        let client = Arc::new(SupabaseClient::new(&config.backend)?);
        Ok(Self {
            auth: client.clone(),
            profiles: client.clone(),
            storage: client,
            clock: Arc::new(SystemClock),
        })
    }
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: WebConfig,
    collaborators: Collaborators,
    uploads: UploadTracker,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(config: WebConfig, collaborators: Collaborators) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                collaborators,
                uploads: UploadTracker::new(),
            }),
        }
    }

    /// Get a reference to the web configuration.
    #[must_use]
    pub fn config(&self) -> &WebConfig {
        &self.inner.config
    }

    /// Current time source.
    #[must_use]
    pub fn clock(&self) -> &dyn Clock {
        self.inner.collaborators.clock.as_ref()
    }

    /// Users with an avatar upload in flight.
    #[must_use]
    pub fn uploads(&self) -> &UploadTracker {
        &self.inner.uploads
    }

    /// Authentication service for this request.
    #[must_use]
    pub fn auth(&self) -> AuthService<'_> {
        AuthService::new(self.inner.collaborators.auth.as_ref())
    }

    /// Profile service for this request.
    #[must_use]
    pub fn profiles(&self) -> ProfileService<'_> {
        let c = &self.inner.collaborators;
        ProfileService::new(c.profiles.as_ref(), c.storage.as_ref())
    }

    /// Avatar upload service for this request.
    #[must_use]
    pub fn avatar_uploads(&self) -> AvatarUploadService<'_> {
        let c = &self.inner.collaborators;
        AvatarUploadService::new(
            c.profiles.as_ref(),
            c.storage.as_ref(),
            c.clock.as_ref(),
            &self.inner.uploads,
        )
    }
}
