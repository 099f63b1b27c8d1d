//! Business logic services for the web application.
//!
//! # Services
//!
//! - [`auth`] - Sign in, registration, and sign out through the auth backend
//! - [`profile`] - Profile loading, avatar resolution, and name saves
//! - [`avatar_upload`] - The avatar upload workflow
//!
//! Services borrow their collaborators from [`AppState`](crate::state::AppState)
//! for the length of one request and never cache backend data.

pub mod auth;
pub mod avatar_upload;
pub mod profile;

use chrono::{DateTime, Utc};

pub use auth::{AuthError, AuthService, SignOutError};
pub use avatar_upload::{
    AvatarUploadService, UploadFailure, UploadOutcome, UploadTracker, UploadWorkflowError,
};
pub use profile::{LoadedProfile, ProfileError, ProfileService};

/// Source of the current time.
///
/// Storage keys and `updated_at` stamps read the clock through this trait so
/// tests can pin it.
pub trait Clock: Send + Sync {
    /// Current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
