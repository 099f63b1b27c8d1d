//! View models shared by every page: the header and avatar slots.

use techplement_core::{Avatar, AvatarDisplay, AvatarSize};

use crate::models::CurrentUser;
use crate::state::AppState;

/// Image part of an avatar slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvatarImage {
    pub url: String,
    pub alt: String,
}

/// Everything a template needs to render one avatar slot.
///
/// The fallback is always rendered next to the image so the browser can
/// swap to it when the image fails to load, without asking the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvatarView {
    pub container_class: &'static str,
    pub icon_class: &'static str,
    pub image: Option<AvatarImage>,
    /// Initials to show instead of the icon.
    pub initials: Option<String>,
}

impl From<&Avatar> for AvatarView {
    fn from(avatar: &Avatar) -> Self {
        let size = avatar.size();
        let image = match avatar.display() {
            AvatarDisplay::Image { url, alt } => Some(AvatarImage { url, alt }),
            AvatarDisplay::Initials(_) | AvatarDisplay::Icon => None,
        };
        let initials = match avatar.fallback_display() {
            AvatarDisplay::Initials(initials) => Some(initials),
            AvatarDisplay::Image { .. } | AvatarDisplay::Icon => None,
        };

        Self {
            container_class: size.container_class(),
            icon_class: size.icon_class(),
            image,
            initials,
        }
    }
}

/// Site header for a signed-in user.
#[derive(Debug, Clone)]
pub struct HeaderView {
    pub display_name: String,
    pub email: String,
    pub avatar: AvatarView,
    pub repository_url: String,
}

impl HeaderView {
    /// Build the header, resolving the user's avatar.
    ///
    /// Runs its own profile fetch; a failure only costs the avatar image.
    pub async fn load(state: &AppState, user: &CurrentUser) -> Self {
        let url = state
            .profiles()
            .resolve_avatar(&user.access_token, &user.id)
            .await;

        let avatar = Avatar::new(url, AvatarSize::Small)
            .with_alt(user.greeting_name())
            .with_fallback(user.full_name.clone());

        Self {
            display_name: user.greeting_name().to_string(),
            email: user.email.to_string(),
            avatar: AvatarView::from(&avatar),
            repository_url: state.config().repository_url.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_with_image_keeps_initials_fallback() {
        let avatar = Avatar::new(Some("https://cdn/a.png".into()), AvatarSize::Large)
            .with_alt("Ada")
            .with_fallback(Some("Ada Lovelace".into()));
        let view = AvatarView::from(&avatar);

        assert_eq!(
            view.image,
            Some(AvatarImage {
                url: "https://cdn/a.png".into(),
                alt: "Ada".into()
            })
        );
        assert_eq!(view.initials.as_deref(), Some("AL"));
        assert_eq!(view.container_class, "h-24 w-24");
    }

    #[test]
    fn test_view_without_url_or_name_is_icon() {
        let view = AvatarView::from(&Avatar::new(None, AvatarSize::Small));
        assert!(view.image.is_none());
        assert!(view.initials.is_none());
        assert_eq!(view.icon_class, "h-4 w-4");
    }

    #[test]
    fn test_page_script_retires_failed_image() {
        let script = include_str!("../../static/js/app.js");

        // Failure is terminal and drops the <img> for good
        assert!(script.contains(r#"if (avatar.dataset.avatarStatus === "failed") return;"#));
        assert!(script.contains("img.remove();"));
        assert!(script.contains("fallback.hidden = false;"));
        // Uploads are refused by size before any preview is built
        assert!(script.contains("input.dataset.maxBytes"));
    }
}
