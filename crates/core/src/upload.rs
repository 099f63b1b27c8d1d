//! Avatar upload rules.
//!
//! A file picked on the profile page starts as an [`UploadCandidate`]. It is
//! checked locally, before anything touches the network, and becomes a
//! [`ValidatedUpload`] only if it declares an image content type and fits in
//! [`MAX_AVATAR_BYTES`]. A validated upload knows how to name itself in
//! object storage and how to render a local preview of its own bytes.

use core::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use thiserror::Error;

use crate::types::UserId;

/// Largest accepted avatar file (5 MiB).
pub const MAX_AVATAR_BYTES: usize = 5 * 1024 * 1024;

/// Cache lifetime requested for uploaded avatar objects, in seconds.
pub const AVATAR_CACHE_CONTROL_SECS: u64 = 3600;

/// Validity window of signed avatar display URLs, in seconds.
pub const SIGNED_URL_TTL_SECS: u64 = 60;

/// Reasons a selected file is refused before upload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadError {
    /// Declared content type is not `image/*`.
    #[error("Please upload an image file")]
    NotAnImage {
        /// The declared content type.
        content_type: String,
    },

    /// File is larger than [`MAX_AVATAR_BYTES`].
    #[error("Image size should be less than 5MB")]
    TooLarge {
        /// Actual size in bytes.
        size: usize,
        /// Limit in bytes.
        max: usize,
    },
}

/// A file selected for upload, not yet checked.
#[derive(Clone, PartialEq, Eq)]
pub struct UploadCandidate {
    file_name: String,
    content_type: String,
    bytes: Vec<u8>,
}

impl fmt::Debug for UploadCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadCandidate")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl UploadCandidate {
    /// Create a candidate from what the browser sent.
    #[must_use]
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    /// Original file name.
    #[must_use]
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the file has no content.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Check type and size.
    ///
    /// The type check runs first, so a large non-image is reported as a
    /// type problem.
    ///
    /// # Errors
    ///
    /// Returns [`UploadError::NotAnImage`] if the declared type is not
    /// `image/*`, or [`UploadError::TooLarge`] if the file exceeds
    /// [`MAX_AVATAR_BYTES`].
    pub fn validate(self) -> Result<ValidatedUpload, UploadError> {
        if !is_image_type(&self.content_type) {
            return Err(UploadError::NotAnImage {
                content_type: self.content_type,
            });
        }
        if self.bytes.len() > MAX_AVATAR_BYTES {
            return Err(UploadError::TooLarge {
                size: self.bytes.len(),
                max: MAX_AVATAR_BYTES,
            });
        }

        Ok(ValidatedUpload {
            extension: file_extension(&self.file_name, &self.content_type),
            file_name: self.file_name,
            content_type: self.content_type,
            bytes: self.bytes,
        })
    }
}

/// A file that passed local validation.
#[derive(Clone, PartialEq, Eq)]
pub struct ValidatedUpload {
    file_name: String,
    content_type: String,
    extension: String,
    bytes: Vec<u8>,
}

impl fmt::Debug for ValidatedUpload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidatedUpload")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl ValidatedUpload {
    /// Original file name.
    #[must_use]
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Declared content type.
    #[must_use]
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Extension used for the storage key.
    #[must_use]
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Raw file bytes.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consume the upload and return its bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Storage key for this file uploaded by `user_id` at `now_millis`.
    #[must_use]
    pub fn storage_key(&self, user_id: &UserId, now_millis: i64) -> StorageKey {
        StorageKey(format!("{user_id}-{now_millis}.{}", self.extension))
    }

    /// Local preview of the file as a `data:` URL.
    #[must_use]
    pub fn preview(&self) -> PreviewUrl {
        PreviewUrl(format!(
            "data:{};base64,{}",
            self.content_type,
            STANDARD.encode(&self.bytes)
        ))
    }
}

/// Object name of an avatar in the storage bucket.
///
/// Of the form `{user_id}-{millis}.{ext}`. The millisecond suffix keeps
/// successive uploads by the same user from colliding.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageKey(String);

impl StorageKey {
    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for StorageKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A preview of an upload built from its bytes.
///
/// Lives only between file selection and the end of the upload. It is never
/// written to the profile row.
#[derive(Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct PreviewUrl(String);

impl PreviewUrl {
    /// Returns the `data:` URL.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the preview and return the `data:` URL.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Debug for PreviewUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PreviewUrl({} bytes)", self.0.len())
    }
}

/// Object key referenced by a stored avatar value.
///
/// The profile row may hold a bare key or a full public URL; either way the
/// object key is the last `/`-separated segment. Returns `None` when that
/// segment is empty.
///
/// ```
/// use techplement_core::object_key;
///
/// assert_eq!(
///     object_key("https://x.supabase.co/storage/v1/object/public/avatars/u1-1.png"),
///     Some("u1-1.png"),
/// );
/// assert_eq!(object_key("u1-1.png"), Some("u1-1.png"));
/// assert_eq!(object_key("avatars/"), None);
/// ```
#[must_use]
pub fn object_key(reference: &str) -> Option<&str> {
    reference
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty())
}

fn is_image_type(content_type: &str) -> bool {
    content_type
        .trim()
        .get(..6)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("image/"))
}

/// Extension after the last `.` of the file name.
///
/// Names without a usable extension fall back to the content subtype, so
/// `avatar` sent as `image/svg+xml` becomes `svg`.
fn file_extension(file_name: &str, content_type: &str) -> String {
    match file_name.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() => return ext.to_owned(),
        _ => {}
    }

    let subtype = content_type
        .split_once('/')
        .map_or("", |(_, subtype)| subtype);
    let subtype = subtype.split([';', '+']).next().unwrap_or("").trim();
    if subtype.is_empty() {
        "bin".to_owned()
    } else {
        subtype.to_ascii_lowercase()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const MIB: usize = 1024 * 1024;

    fn png(name: &str, len: usize) -> UploadCandidate {
        UploadCandidate::new(name, "image/png", vec![0x89; len])
    }

    #[test]
    fn test_accepts_small_image() {
        let upload = png("photo.png", 1024).validate().unwrap();
        assert_eq!(upload.extension(), "png");
        assert_eq!(upload.bytes().len(), 1024);
    }

    #[test]
    fn test_accepts_exactly_five_mib() {
        assert!(png("photo.png", 5 * MIB).validate().is_ok());
    }

    #[test]
    fn test_rejects_six_mib_jpeg() {
        let candidate = UploadCandidate::new("big.jpg", "image/jpeg", vec![0; 6 * MIB]);
        assert_eq!(
            candidate.validate(),
            Err(UploadError::TooLarge {
                size: 6 * MIB,
                max: MAX_AVATAR_BYTES
            })
        );
    }

    #[test]
    fn test_rejects_non_image() {
        let candidate = UploadCandidate::new("notes.pdf", "application/pdf", vec![1, 2, 3]);
        assert!(matches!(
            candidate.validate(),
            Err(UploadError::NotAnImage { content_type }) if content_type == "application/pdf"
        ));
    }

    #[test]
    fn test_rejects_missing_content_type() {
        let candidate = UploadCandidate::new("photo.png", "", vec![1]);
        assert!(matches!(
            candidate.validate(),
            Err(UploadError::NotAnImage { .. })
        ));
    }

    #[test]
    fn test_type_check_runs_before_size_check() {
        let candidate = UploadCandidate::new("movie.mp4", "video/mp4", vec![0; 6 * MIB]);
        assert!(matches!(
            candidate.validate(),
            Err(UploadError::NotAnImage { .. })
        ));
    }

    #[test]
    fn test_content_type_prefix_is_case_insensitive() {
        let candidate = UploadCandidate::new("photo.PNG", "Image/PNG", vec![1]);
        assert_eq!(candidate.validate().unwrap().extension(), "PNG");
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            UploadError::NotAnImage {
                content_type: "text/plain".into()
            }
            .to_string(),
            "Please upload an image file"
        );
        assert_eq!(
            UploadError::TooLarge { size: 1, max: 0 }.to_string(),
            "Image size should be less than 5MB"
        );
    }

    #[test]
    fn test_storage_key_shape() {
        let upload = png("photo.png", 10).validate().unwrap();
        let key = upload.storage_key(&UserId::new("u123"), 1_700_000_000_123);
        assert_eq!(key.as_str(), "u123-1700000000123.png");
    }

    #[test]
    fn test_storage_key_uses_last_extension() {
        let upload = png("archive.tar.webp", 10).validate().unwrap();
        let key = upload.storage_key(&UserId::new("u1"), 5);
        assert_eq!(key.to_string(), "u1-5.webp");
    }

    #[test]
    fn test_storage_key_differs_between_uploads() {
        let upload = png("photo.png", 10).validate().unwrap();
        let user = UserId::new("u1");
        assert_ne!(upload.storage_key(&user, 1), upload.storage_key(&user, 2));
    }

    #[test]
    fn test_extension_falls_back_to_subtype() {
        assert_eq!(file_extension("avatar", "image/jpeg"), "jpeg");
        assert_eq!(file_extension("avatar.", "image/svg+xml"), "svg");
        assert_eq!(file_extension("avatar", "image/"), "bin");
    }

    #[test]
    fn test_preview_is_data_url() {
        let upload = UploadCandidate::new("a.gif", "image/gif", b"GIF89a".to_vec())
            .validate()
            .unwrap();
        assert_eq!(upload.preview().as_str(), "data:image/gif;base64,R0lGODlh");
    }

    #[test]
    fn test_object_key_from_public_url() {
        assert_eq!(
            object_key("https://p.supabase.co/storage/v1/object/public/avatars/u1-9.jpg"),
            Some("u1-9.jpg")
        );
    }

    #[test]
    fn test_object_key_empty() {
        assert_eq!(object_key(""), None);
        assert_eq!(object_key("https://host/avatars/"), None);
    }

    #[test]
    fn test_debug_hides_bytes() {
        let candidate = png("photo.png", 3);
        let debug = format!("{candidate:?}");
        assert!(debug.contains("len: 3"));
        assert!(!debug.contains("137"));
    }
}
