//! User identifier.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a user in the hosted auth service.
///
/// The value is opaque to this application: it is whatever the auth
/// service hands back (in practice a UUID string) and is only ever
/// compared, displayed, and used as a filter value or key prefix.
///
/// # Example
///
/// ```rust
/// use techplement_core::UserId;
///
/// let id = UserId::new("u123");
/// assert_eq!(id.as_str(), "u123");
/// assert_eq!(id.to_string(), "u123");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Create a user ID from its string form.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for UserId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl AsRef<str> for UserId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
