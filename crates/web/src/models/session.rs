//! Session-related types.
//!
//! Types stored in the server-side session between requests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use techplement_core::{Email, UserId};

use crate::backend::{AccessToken, AuthSession};

/// Name used in greetings when the user never gave one.
const ANONYMOUS_NAME: &str = "User";

/// Refresh this long before the access token actually expires.
const REFRESH_MARGIN_SECS: i64 = 60;

/// Session-stored user identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    /// Backend user ID.
    pub id: UserId,
    /// User's email address.
    pub email: Email,
    /// Display name recorded at registration.
    pub full_name: Option<String>,
    /// Token for backend calls made on the user's behalf.
    pub access_token: AccessToken,
    /// Token used to renew `access_token`.
    pub refresh_token: Option<AccessToken>,
    /// Unix timestamp when `access_token` expires.
    pub expires_at: i64,
}

impl CurrentUser {
    /// Name to greet the user with.
    #[must_use]
    pub fn greeting_name(&self) -> &str {
        self.full_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(ANONYMOUS_NAME)
    }

    /// Whether the access token is expired or about to be.
    #[must_use]
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        now.timestamp() >= self.expires_at - REFRESH_MARGIN_SECS
    }
}

impl From<AuthSession> for CurrentUser {
    fn from(session: AuthSession) -> Self {
        Self {
            id: session.user_id,
            email: session.email,
            full_name: session.full_name,
            access_token: session.access_token,
            refresh_token: session.refresh_token,
            expires_at: session.expires_at,
        }
    }
}

/// Kind of a transient notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastKind {
    Success,
    Error,
}

impl ToastKind {
    /// CSS modifier class.
    #[must_use]
    pub const fn css_class(self) -> &'static str {
        match self {
            Self::Success => "toast-success",
            Self::Error => "toast-error",
        }
    }
}

/// A notification shown once on the next rendered page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toast {
    pub kind: ToastKind,
    pub message: String,
}

impl Toast {
    /// Success notification.
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: ToastKind::Success,
            message: message.into(),
        }
    }

    /// Error notification.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: ToastKind::Error,
            message: message.into(),
        }
    }
}

/// Session keys.
pub mod keys {
    /// Key for storing the current logged-in user.
    pub const CURRENT_USER: &str = "current_user";

    /// Key for notifications waiting to be shown.
    pub const TOASTS: &str = "toasts";

    /// Key for the preview of an upload that did not complete.
    pub const PENDING_PREVIEW: &str = "pending_avatar_preview";

    /// Key for a display name whose save failed.
    pub const PENDING_NAME: &str = "pending_full_name";
}
