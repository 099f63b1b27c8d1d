//! Authentication extractors.
//!
//! Provides extractors for requiring a signed-in user in route handlers.

use axum::{
    extract::{FromRef, FromRequestParts, OriginalUri},
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

use super::flash::push_toast;
use crate::error::clear_sentry_user;
use crate::models::{CurrentUser, Toast, keys};
use crate::state::AppState;

/// Shown on the login page after a session could not be renewed.
pub const SESSION_EXPIRED_MESSAGE: &str = "Your session has expired. Please sign in again.";

/// Extractor that requires a signed-in user.
///
/// If nobody is signed in, redirects to the login page with the requested
/// path as `return_to`. An access token at or near its expiry is renewed
/// first; when renewal fails the session is ended and the user is sent to
/// the login page the same way.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(
///     RequireAuth(user): RequireAuth,
/// ) -> impl IntoResponse {
///     format!("Hello, {}!", user.email)
/// }
/// ```
pub struct RequireAuth(pub CurrentUser);

/// Error returned when authentication is required but nobody is signed in.
pub enum AuthRejection {
    /// Redirect to the login page.
    RedirectToLogin(String),
    /// Session layer missing from the stack.
    MissingSession,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToLogin(location) => Redirect::to(&location).into_response(),
            Self::MissingSession => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        }
    }
}

/// Login URL that returns to `path` afterwards.
fn login_location(path: &str) -> String {
    if path == "/" {
        "/auth/login".to_string()
    } else {
        format!("/auth/login?return_to={}", urlencoding::encode(path))
    }
}

impl<S> FromRequestParts<S> for RequireAuth
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        // Set by SessionManagerLayer
        let session = parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or(AuthRejection::MissingSession)?;

        // Nested routers see a stripped URI
        let path = parts
            .extensions
            .get::<OriginalUri>()
            .map_or_else(|| parts.uri.path(), |original| original.0.path())
            .to_owned();

        let user: CurrentUser = session
            .get(keys::CURRENT_USER)
            .await
            .ok()
            .flatten()
            .ok_or_else(|| AuthRejection::RedirectToLogin(login_location(&path)))?;

        let state = AppState::from_ref(state);
        if !user.needs_refresh(state.clock().now()) {
            return Ok(Self(user));
        }

        match state.auth().refresh(&user).await {
            Ok(renewed) => {
                if let Err(e) = session.insert(keys::CURRENT_USER, &renewed).await {
                    tracing::error!(error = %e, "Failed to store renewed session");
                }
                tracing::debug!(user_id = %renewed.id, "Access token renewed");
                Ok(Self(renewed))
            }
            Err(e) => {
                tracing::warn!(user_id = %user.id, error = %e, "Access token renewal failed");
                Err(AuthRejection::RedirectToLogin(
                    end_expired_session(&session, &path).await,
                ))
            }
        }
    }
}

/// Extractor that optionally gets the signed-in user.
///
/// Unlike `RequireAuth`, this does not reject the request if nobody is
/// signed in.
pub struct OptionalAuth(pub Option<CurrentUser>);

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = match parts.extensions.get::<Session>() {
            Some(session) => session
                .get::<CurrentUser>(keys::CURRENT_USER)
                .await
                .ok()
                .flatten(),
            None => None,
        };

        Ok(Self(user))
    }
}

/// Store the signed-in user in the session.
///
/// The session ID is cycled first so a pre-login ID cannot be reused.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_user(
    session: &Session,
    user: &CurrentUser,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session.insert(keys::CURRENT_USER, user).await
}

/// Sign the user out locally after the backend stopped accepting their
/// token, and return the login URL that leads back to `path`.
pub async fn end_expired_session(session: &Session, path: &str) -> String {
    if let Err(e) = clear_current_user(session).await {
        tracing::error!(error = %e, "Failed to clear expired session");
    }
    clear_sentry_user();
    push_toast(session, Toast::error(SESSION_EXPIRED_MESSAGE)).await;
    login_location(path)
}

/// Drop everything held for the user (logout).
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_current_user(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.flush().await
}
