//! Profile route handlers.
//!
//! These routes require authentication. Every outcome is reported as a toast
//! on the profile page, except a token the backend refuses: that ends the
//! session and sends the user to the login page.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Multipart, State, multipart::MultipartError},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use techplement_core::{Avatar, AvatarSize, MAX_AVATAR_BYTES, UploadCandidate, UploadError};

use super::layout::{AvatarView, HeaderView};
use crate::error::add_breadcrumb;
use crate::filters;
use crate::middleware::{
    RequireAuth, end_expired_session, push_toast, set_pending_name, set_pending_preview,
    take_pending_name, take_pending_preview, take_toasts,
};
use crate::models::Toast;
use crate::services::ProfileError;
use crate::state::AppState;

/// Path of the profile page.
const PROFILE_PATH: &str = "/profile";

/// Multipart field carrying the avatar file.
pub const AVATAR_FIELD: &str = "avatar";

/// Request body limit for avatar uploads.
///
/// Above [`MAX_AVATAR_BYTES`] so oversized images reach validation and get
/// the usual message instead of a transport error.
pub const AVATAR_BODY_LIMIT: usize = 8 * 1024 * 1024;

// =============================================================================
// Form Types
// =============================================================================

/// Profile form data.
#[derive(Debug, Deserialize)]
pub struct ProfileForm {
    #[serde(default)]
    pub full_name: String,
}

// =============================================================================
// Templates
// =============================================================================

/// Profile page template.
#[derive(Template, WebTemplate)]
#[template(path = "profile.html")]
pub struct ProfileTemplate {
    pub header: Option<HeaderView>,
    pub toasts: Vec<Toast>,
    pub email: String,
    pub full_name: String,
    pub avatar: AvatarView,
    /// Alt text for an image the page script puts in the avatar slot.
    pub avatar_alt: String,
    pub uploading: bool,
    pub max_upload_bytes: usize,
    /// Messages the page script shows for a file it refuses.
    pub type_message: String,
    pub size_message: String,
}

// =============================================================================
// Handlers
// =============================================================================

/// Display the profile page.
///
/// A missing or unreadable profile row is reported and the page still
/// renders, with an empty name and the fallback avatar.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
) -> Response {
    let header = HeaderView::load(&state, &user).await;

    let (stored_name, avatar_url) = match state
        .profiles()
        .load(&user.access_token, &user.id)
        .await
    {
        Ok(loaded) => (loaded.profile.full_name, loaded.avatar_url),
        Err(e) if e.is_unauthorized() => {
            tracing::warn!(error = %e, "Backend refused access token");
            return Redirect::to(&end_expired_session(&session, PROFILE_PATH).await)
                .into_response();
        }
        Err(e) => {
            tracing::error!(error = %e, "Error loading profile");
            push_toast(&session, Toast::error("Error loading profile")).await;
            (None, None)
        }
    };

    let full_name = take_pending_name(&session)
        .await
        .or_else(|| stored_name.clone())
        .unwrap_or_default();

    // A preview left by a failed upload stays on screen until the next load.
    let preview = take_pending_preview(&session).await;
    let display_url = preview.map(|p| p.into_inner()).or(avatar_url);

    let owner_name = stored_name.or_else(|| user.full_name.clone());
    let avatar_alt = owner_name
        .as_deref()
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| user.greeting_name())
        .to_string();
    let avatar = Avatar::new(display_url, AvatarSize::Large)
        .with_alt(avatar_alt.clone())
        .with_fallback(owner_name);

    ProfileTemplate {
        header: Some(header),
        toasts: take_toasts(&session).await,
        email: user.email.to_string(),
        full_name,
        avatar: AvatarView::from(&avatar),
        avatar_alt,
        uploading: state.uploads().is_uploading(&user.id),
        max_upload_bytes: MAX_AVATAR_BYTES,
        type_message: UploadError::NotAnImage {
            content_type: String::new(),
        }
        .to_string(),
        size_message: UploadError::TooLarge {
            size: 0,
            max: MAX_AVATAR_BYTES,
        }
        .to_string(),
    }
    .into_response()
}

/// Handle profile form submission.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn save(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Form(form): Form<ProfileForm>,
) -> Redirect {
    let now = state.clock().now();

    match state
        .profiles()
        .save_name(&user.access_token, &user.id, &form.full_name, now)
        .await
    {
        Ok(_) => {
            push_toast(&session, Toast::success("Profile updated successfully!")).await;
        }
        Err(ProfileError::Validation(_)) => {
            push_toast(&session, Toast::error("Please enter your full name")).await;
        }
        Err(e) if e.is_unauthorized() => {
            tracing::warn!(error = %e, "Backend refused access token");
            return Redirect::to(&end_expired_session(&session, PROFILE_PATH).await);
        }
        Err(e) => {
            tracing::error!(error = %e, "Error updating profile");
            set_pending_name(&session, &form.full_name).await;
            push_toast(&session, Toast::error("Error updating profile")).await;
        }
    }

    Redirect::to(PROFILE_PATH)
}

/// Handle an avatar file selection.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn upload_avatar(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    mut multipart: Multipart,
) -> Redirect {
    let candidate = match read_avatar_field(&mut multipart).await {
        Ok(Some(candidate)) => candidate,
        // Nothing selected
        Ok(None) => return Redirect::to(PROFILE_PATH),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read avatar upload");
            push_toast(&session, Toast::error(multipart_message(&e))).await;
            return Redirect::to(PROFILE_PATH);
        }
    };

    match state
        .avatar_uploads()
        .handle_image_selected(&user.access_token, &user.id, candidate)
        .await
    {
        Ok(outcome) => {
            add_breadcrumb(
                "profile",
                "Avatar uploaded",
                Some(&[("key", outcome.key.as_str())]),
            );
            push_toast(
                &session,
                Toast::success("Profile picture updated successfully!"),
            )
            .await;
        }
        Err(failure) if failure.error.is_unauthorized() => {
            tracing::warn!(error = %failure.error, "Backend refused access token");
            return Redirect::to(&end_expired_session(&session, PROFILE_PATH).await);
        }
        Err(failure) => {
            if let Some(preview) = &failure.preview {
                set_pending_preview(&session, preview).await;
            }
            push_toast(&session, Toast::error(failure.error.user_message())).await;
        }
    }

    Redirect::to(PROFILE_PATH)
}

/// Read the avatar file from the form.
///
/// Returns `None` when the form carried no file.
async fn read_avatar_field(
    multipart: &mut Multipart,
) -> Result<Option<UploadCandidate>, MultipartError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(AVATAR_FIELD) {
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().unwrap_or_default().to_string();
        let bytes = field.bytes().await?;

        if file_name.is_empty() && bytes.is_empty() {
            return Ok(None);
        }
        return Ok(Some(UploadCandidate::new(
            file_name,
            content_type,
            bytes.to_vec(),
        )));
    }

    Ok(None)
}

fn multipart_message(err: &MultipartError) -> String {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        UploadError::TooLarge {
            size: AVATAR_BODY_LIMIT,
            max: MAX_AVATAR_BYTES,
        }
        .to_string()
    } else {
        "Error uploading image".to_string()
    }
}
