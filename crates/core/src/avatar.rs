//! Avatar slot contents.
//!
//! An [`Avatar`] decides what a single avatar slot shows when the page is
//! rendered: the image, the initials of a fallback name, or a generic user
//! icon. Pages always render the fallback next to the image.
//!
//! Whether the image actually loads is only known in the browser. The page
//! script (`static/js/app.js`) tracks it per slot: on the first load error it
//! marks the slot failed, removes the `<img>` so the URL is never requested
//! again, and reveals the fallback.
//!
//! ```
//! use techplement_core::{Avatar, AvatarDisplay, AvatarSize};
//!
//! let avatar = Avatar::new(None, AvatarSize::Large)
//!     .with_fallback(Some("Ada Lovelace".into()));
//! assert_eq!(avatar.display(), AvatarDisplay::Initials("AL".into()));
//! ```

use serde::{Deserialize, Serialize};

/// Maximum number of characters rendered as initials.
const MAX_INITIALS: usize = 2;

/// Size category of an avatar slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AvatarSize {
    /// Header and menu avatars.
    Small,
    #[default]
    Medium,
    /// Profile page avatar.
    Large,
}

impl AvatarSize {
    /// CSS classes for the round container.
    #[must_use]
    pub const fn container_class(self) -> &'static str {
        match self {
            Self::Small => "h-8 w-8",
            Self::Medium => "h-12 w-12",
            Self::Large => "h-24 w-24",
        }
    }

    /// CSS classes for the generic user icon.
    #[must_use]
    pub const fn icon_class(self) -> &'static str {
        match self {
            Self::Small => "h-4 w-4",
            Self::Medium => "h-6 w-6",
            Self::Large => "h-12 w-12",
        }
    }
}

/// What an avatar slot renders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AvatarDisplay {
    /// Render the image.
    Image {
        /// Display URL.
        url: String,
        /// Alt text.
        alt: String,
    },
    /// Render up to two initials.
    Initials(String),
    /// Render the generic user icon.
    Icon,
}

/// A single avatar slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Avatar {
    url: Option<String>,
    alt: String,
    size: AvatarSize,
    fallback: Option<String>,
}

impl Avatar {
    /// Create an avatar for an optional display URL.
    ///
    /// Empty URLs are treated as absent.
    #[must_use]
    pub fn new(url: Option<String>, size: AvatarSize) -> Self {
        Self {
            url: url.filter(|u| !u.is_empty()),
            size,
            ..Self::default()
        }
    }

    /// Set the image alt text.
    #[must_use]
    pub fn with_alt(mut self, alt: impl Into<String>) -> Self {
        self.alt = alt.into();
        self
    }

    /// Set the text initials are derived from.
    #[must_use]
    pub fn with_fallback(mut self, fallback: Option<String>) -> Self {
        self.fallback = fallback;
        self
    }

    /// Size category.
    #[must_use]
    pub const fn size(&self) -> AvatarSize {
        self.size
    }

    /// Whether rendering this avatar would issue an image request.
    #[must_use]
    pub const fn should_load_image(&self) -> bool {
        self.url.is_some()
    }

    /// Decide what to render.
    #[must_use]
    pub fn display(&self) -> AvatarDisplay {
        match &self.url {
            Some(url) => AvatarDisplay::Image {
                url: url.clone(),
                alt: self.alt.clone(),
            },
            None => self.fallback_display(),
        }
    }

    /// What to render when the image is absent or broken.
    #[must_use]
    pub fn fallback_display(&self) -> AvatarDisplay {
        self.fallback
            .as_deref()
            .map(initials)
            .filter(|i| !i.is_empty())
            .map_or(AvatarDisplay::Icon, AvatarDisplay::Initials)
    }
}

/// Derive initials from a name.
///
/// Takes the first character of each whitespace-separated token, uppercases
/// it, and keeps at most two characters.
///
/// ```
/// use techplement_core::initials;
///
/// assert_eq!(initials("ada lovelace"), "AL");
/// assert_eq!(initials("Jean Paul Sartre"), "JP");
/// assert_eq!(initials("  "), "");
/// ```
#[must_use]
pub fn initials(name: &str) -> String {
    name.split_whitespace()
        .filter_map(|word| word.chars().next())
        .flat_map(char::to_uppercase)
        .take(MAX_INITIALS)
        .collect()
}
