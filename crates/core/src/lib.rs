//! Techplement Core - Shared types library.
//!
//! This crate provides the types and rules used by the `techplement-web`
//! application and its integration tests.
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no HTTP
//! clients, no clock. Anything time-dependent takes the current time as an
//! argument so the rules stay deterministic under test.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for user IDs, emails, and display names
//! - [`avatar`] - Avatar slot contents and initials fallback
//! - [`upload`] - Avatar upload validation, storage keys, and previews
//! - [`profile`] - Profile rows and the patches written back to them

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod avatar;
pub mod profile;
pub mod types;
pub mod upload;

pub use avatar::{Avatar, AvatarDisplay, AvatarSize, initials};
pub use profile::{AvatarUpdate, NameUpdate, Profile, ProfilePatch};
pub use types::*;
pub use upload::{
    AVATAR_CACHE_CONTROL_SECS, MAX_AVATAR_BYTES, PreviewUrl, SIGNED_URL_TTL_SECS, StorageKey,
    UploadCandidate, UploadError, ValidatedUpload, object_key,
};
