//! Hosted backend collaborators.
//!
//! The application talks to three services of one hosted backend project:
//! password auth, the `profiles` table, and object storage. Each one sits
//! behind a trait so handlers and services hold `Arc<dyn ...>` values and
//! tests can swap in fakes.
//!
//! [`SupabaseClient`] implements all three over HTTP.

mod supabase;

use core::fmt;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use techplement_core::{DisplayName, Email, Profile, ProfilePatch, StorageKey, UserId};

pub use supabase::SupabaseClient;

/// Errors returned by backend collaborators.
#[derive(Debug, Error)]
pub enum BackendError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Requested row or object does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Credentials or access token were rejected.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Failed to parse response.
    #[error("Parse error: {0}")]
    Parse(String),
}

impl BackendError {
    /// Whether the backend refused the caller's token or credentials.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }

    /// Message safe to show to the person who triggered the call.
    ///
    /// Auth failures carry the backend's own wording ("Invalid login
    /// credentials"); anything else is reduced to a generic phrase.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Unauthorized(message) => message.clone(),
            Self::Api { status, message } if (400..500).contains(status) && !message.is_empty() => {
                message.clone()
            }
            Self::NotFound(_) => "Not found".to_string(),
            _ => "The service is unavailable, please try again".to_string(),
        }
    }
}

/// Bearer token of a signed-in user.
///
/// Kept secret in logs; serialized as a plain string so it can live in the
/// server-side session.
#[derive(Clone)]
pub struct AccessToken(SecretString);

impl AccessToken {
    /// Wrap a raw token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(SecretString::from(token.into()))
    }

    /// Raw token for the `Authorization` header.
    #[must_use]
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken([REDACTED])")
    }
}

impl Serialize for AccessToken {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.expose())
    }
}

impl<'de> Deserialize<'de> for AccessToken {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::new)
    }
}

/// A successful sign-in.
#[derive(Debug, Clone)]
pub struct AuthSession {
    /// Signed-in user.
    pub user_id: UserId,
    /// Address the user signed in with.
    pub email: Email,
    /// Name recorded at registration, if any.
    pub full_name: Option<String>,
    /// Token for subsequent calls on the user's behalf.
    pub access_token: AccessToken,
    /// Token that buys a new access token once this one expires.
    pub refresh_token: Option<AccessToken>,
    /// Unix timestamp when `access_token` expires.
    pub expires_at: i64,
}

/// Result of a registration.
#[derive(Debug, Clone)]
pub enum SignUp {
    /// The account is active and the user is signed in.
    SignedIn(AuthSession),
    /// The backend sent a confirmation email first.
    ConfirmationRequired,
}

/// Storage options for an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadOptions {
    /// `Cache-Control: max-age` for the stored object.
    pub cache_control_secs: u64,
    /// Overwrite an existing object with the same key.
    pub upsert: bool,
}

/// Password authentication.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Sign in with email and password.
    async fn sign_in(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<AuthSession, BackendError>;

    /// Register a new account, recording the display name as user metadata.
    async fn sign_up(
        &self,
        email: &Email,
        password: &SecretString,
        full_name: &DisplayName,
    ) -> Result<SignUp, BackendError>;

    /// Exchange a refresh token for a new session.
    ///
    /// `email` is used when the response does not repeat the address.
    async fn refresh_session(
        &self,
        email: &Email,
        refresh_token: &AccessToken,
    ) -> Result<AuthSession, BackendError>;

    /// Revoke the session behind `token`.
    async fn sign_out(&self, token: &AccessToken) -> Result<(), BackendError>;
}

/// Profile rows.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Fetch the row whose id is `user_id`.
    ///
    /// Returns [`BackendError::NotFound`] when no row exists.
    async fn fetch_profile(
        &self,
        token: &AccessToken,
        user_id: &UserId,
    ) -> Result<Profile, BackendError>;

    /// Apply `patch` to the row whose id is `user_id`.
    async fn update_profile(
        &self,
        token: &AccessToken,
        user_id: &UserId,
        patch: &ProfilePatch,
    ) -> Result<(), BackendError>;
}

/// Avatar object storage.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store `bytes` under `key`.
    async fn upload(
        &self,
        token: &AccessToken,
        key: &StorageKey,
        content_type: &str,
        bytes: Vec<u8>,
        options: UploadOptions,
    ) -> Result<(), BackendError>;

    /// Durable public reference for `key`. Computed locally.
    fn public_url(&self, key: &StorageKey) -> String;

    /// Short-lived display URL for the object named `object_key`.
    async fn signed_url(
        &self,
        token: &AccessToken,
        object_key: &str,
        ttl_secs: u64,
    ) -> Result<String, BackendError>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_access_token_debug_redacted() {
        let token = AccessToken::new("super-secret-jwt");
        let debug = format!("{token:?}");
        assert!(!debug.contains("super-secret-jwt"));
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn test_access_token_serde_roundtrip_keeps_value() {
        let token = AccessToken::new("abc");
        let json = serde_json::to_string(&token).unwrap();
        assert_eq!(json, "\"abc\"");
        let back: AccessToken = serde_json::from_str(&json).unwrap();
        assert_eq!(back.expose(), "abc");
    }

    #[test]
    fn test_user_message() {
        assert_eq!(
            BackendError::Unauthorized("Invalid login credentials".into()).user_message(),
            "Invalid login credentials"
        );
        assert_eq!(
            BackendError::Api {
                status: 422,
                message: "User already registered".into()
            }
            .user_message(),
            "User already registered"
        );
        assert_eq!(
            BackendError::Api {
                status: 503,
                message: "upstream connect error".into()
            }
            .user_message(),
            "The service is unavailable, please try again"
        );
    }
}
