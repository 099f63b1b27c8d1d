//! Profile rows and patches.
//!
//! One row per user in the backend's `profiles` table. The row is created by
//! the backend when the user registers; this application only reads it and
//! writes the two patches below.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{DisplayName, UserId};
use crate::upload::object_key;

/// A profile row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Owning user.
    pub id: UserId,
    /// Display name, if one was ever set.
    #[serde(default)]
    pub full_name: Option<String>,
    /// Stable reference to the stored avatar (public URL or object path).
    #[serde(default)]
    pub avatar_url: Option<String>,
    /// Last profile form save.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Profile {
    /// Object key of the stored avatar, if any.
    #[must_use]
    pub fn avatar_object_key(&self) -> Option<&str> {
        self.avatar_url.as_deref().and_then(object_key)
    }
}

/// Patch written by the profile form.
///
/// Carries exactly the display name and the save time. The email is owned
/// by the auth service and is never part of a profile write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NameUpdate {
    /// New display name.
    pub full_name: DisplayName,
    /// Save time.
    pub updated_at: DateTime<Utc>,
}

/// Patch written after a successful avatar upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AvatarUpdate {
    /// Durable public reference of the uploaded object.
    pub avatar_url: String,
}

/// Any write this application makes to a profile row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ProfilePatch {
    /// Profile form save.
    Name(NameUpdate),
    /// Avatar reference update.
    Avatar(AvatarUpdate),
}

impl ProfilePatch {
    /// Patch for a profile form save at `now`.
    #[must_use]
    pub fn name(full_name: DisplayName, now: DateTime<Utc>) -> Self {
        Self::Name(NameUpdate {
            full_name,
            updated_at: now,
        })
    }

    /// Patch pointing the avatar at a new public reference.
    #[must_use]
    pub fn avatar(public_url: impl Into<String>) -> Self {
        Self::Avatar(AvatarUpdate {
            avatar_url: public_url.into(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_deserialize_minimal_row() {
        let profile: Profile = serde_json::from_value(json!({ "id": "u1" })).unwrap();
        assert_eq!(profile.id, UserId::new("u1"));
        assert!(profile.full_name.is_none());
        assert!(profile.avatar_object_key().is_none());
    }

    #[test]
    fn test_deserialize_full_row_ignores_extra_columns() {
        let profile: Profile = serde_json::from_value(json!({
            "id": "u1",
            "full_name": "Ada Lovelace",
            "avatar_url": "https://p.supabase.co/storage/v1/object/public/avatars/u1-42.png",
            "updated_at": "2024-05-01T10:00:00+00:00",
            "website": null
        }))
        .unwrap();
        assert_eq!(profile.full_name.as_deref(), Some("Ada Lovelace"));
        assert_eq!(profile.avatar_object_key(), Some("u1-42.png"));
        assert!(profile.updated_at.is_some());
    }

    #[test]
    fn test_name_patch_has_exactly_name_and_timestamp() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let patch = ProfilePatch::name(DisplayName::parse("Ada").unwrap(), now);
        let value = serde_json::to_value(&patch).unwrap();

        let object = value.as_object().unwrap();
        assert_eq!(object.len(), 2);
        assert_eq!(object["full_name"], "Ada");
        assert_eq!(object["updated_at"], "2024-05-01T12:00:00Z");
        assert!(!object.contains_key("email"));
    }

    #[test]
    fn test_avatar_patch_shape() {
        let patch = ProfilePatch::avatar("https://cdn/avatars/u1-1.png");
        assert_eq!(
            serde_json::to_value(&patch).unwrap(),
            json!({ "avatar_url": "https://cdn/avatars/u1-1.png" })
        );
    }
}
