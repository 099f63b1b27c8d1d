//! Authentication route handlers.
//!
//! Login, registration, and sign out through the hosted auth service.
//! Failures are reported as toasts on the page the user came from.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use secrecy::SecretString;
use serde::Deserialize;
use tower_sessions::Session;

use crate::backend::SignUp;
use crate::error::{Result, clear_sentry_user, set_sentry_user};
use crate::filters;
use crate::middleware::{
    OptionalAuth, clear_current_user, push_toast, set_current_user, take_toasts,
};
use crate::models::{CurrentUser, Toast};
use crate::routes::layout::HeaderView;
use crate::state::AppState;

// =============================================================================
// Form Types
// =============================================================================

/// Login form data.
///
/// Passwords are wrapped in [`SecretString`] as soon as the form is read.
#[derive(Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub return_to: Option<String>,
}

/// Registration form data.
#[derive(Deserialize)]
pub struct RegisterForm {
    pub email: String,
    pub full_name: String,
    pub password: String,
    pub password_confirm: String,
}

/// Sign-out form data.
#[derive(Debug, Deserialize)]
pub struct LogoutForm {
    #[serde(default)]
    pub return_to: Option<String>,
}

// =============================================================================
// Query Types
// =============================================================================

/// Where to go after signing in.
#[derive(Debug, Deserialize)]
pub struct ReturnQuery {
    pub return_to: Option<String>,
}

// =============================================================================
// Templates
// =============================================================================

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub header: Option<HeaderView>,
    pub toasts: Vec<Toast>,
    pub return_to: String,
}

/// Register page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/register.html")]
pub struct RegisterTemplate {
    pub header: Option<HeaderView>,
    pub toasts: Vec<Toast>,
}

// =============================================================================
// Login Routes
// =============================================================================

/// Display the login page.
pub async fn login_page(
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Query(query): Query<ReturnQuery>,
) -> Response {
    if user.is_some() {
        return Redirect::to("/").into_response();
    }

    LoginTemplate {
        header: None,
        toasts: take_toasts(&session).await,
        return_to: safe_return_path(query.return_to.as_deref()).to_string(),
    }
    .into_response()
}

/// Handle login form submission.
///
/// # Errors
///
/// Returns `AppError::Session` if the signed-in user cannot be stored.
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Result<Redirect> {
    let return_to = safe_return_path(form.return_to.as_deref()).to_string();
    let password = SecretString::from(form.password);

    match state.auth().login(&form.email, &password).await {
        Ok(auth) => {
            let user = CurrentUser::from(auth);
            set_current_user(&session, &user).await?;

            set_sentry_user(&user.id, Some(user.email.as_str()));
            tracing::info!(user_id = %user.id, "User signed in");
            Ok(Redirect::to(&return_to))
        }
        Err(e) => {
            tracing::warn!("Login failed: {}", e);
            push_toast(&session, Toast::error(e.user_message())).await;
            Ok(Redirect::to(&login_with_return(&return_to)))
        }
    }
}

// =============================================================================
// Registration Routes
// =============================================================================

/// Display the registration page.
pub async fn register_page(session: Session, OptionalAuth(user): OptionalAuth) -> Response {
    if user.is_some() {
        return Redirect::to("/").into_response();
    }

    RegisterTemplate {
        header: None,
        toasts: take_toasts(&session).await,
    }
    .into_response()
}

/// Handle registration form submission.
///
/// # Errors
///
/// Returns `AppError::Session` if the new user cannot be stored.
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<RegisterForm>,
) -> Result<Redirect> {
    let password = SecretString::from(form.password);
    let password_confirm = SecretString::from(form.password_confirm);
    let result = state
        .auth()
        .register(&form.email, &form.full_name, &password, &password_confirm)
        .await;

    match result {
        Ok(SignUp::SignedIn(auth)) => {
            let user = CurrentUser::from(auth);
            set_current_user(&session, &user).await?;

            set_sentry_user(&user.id, Some(user.email.as_str()));
            tracing::info!(user_id = %user.id, "User registered");
            push_toast(&session, Toast::success("Account created successfully!")).await;
            Ok(Redirect::to("/"))
        }
        Ok(SignUp::ConfirmationRequired) => {
            push_toast(
                &session,
                Toast::success("Check your email to confirm your account"),
            )
            .await;
            Ok(Redirect::to("/auth/login"))
        }
        Err(e) => {
            tracing::warn!("Registration failed: {}", e);
            push_toast(&session, Toast::error(e.user_message())).await;
            Ok(Redirect::to("/auth/register"))
        }
    }
}

// =============================================================================
// Logout Route
// =============================================================================

/// Handle sign out.
///
/// If the backend call fails the user stays signed in and is sent back to
/// the page the form was on, so they can retry.
///
/// # Errors
///
/// Returns `AppError::Session` if the session cannot be cleared.
pub async fn logout(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Form(form): Form<LogoutForm>,
) -> Result<Redirect> {
    let Some(user) = user else {
        return Ok(Redirect::to("/auth/login"));
    };

    if let Err(e) = state.auth().sign_out(&user.access_token).await {
        tracing::error!(user_id = %user.id, "Error signing out: {}", e);
        push_toast(&session, Toast::error("Error signing out")).await;
        return Ok(Redirect::to(safe_return_path(form.return_to.as_deref())));
    }

    clear_current_user(&session).await?;
    clear_sentry_user();
    tracing::info!(user_id = %user.id, "User signed out");

    push_toast(&session, Toast::success("Signed out successfully")).await;
    Ok(Redirect::to("/auth/login"))
}

// =============================================================================
// Helpers
// =============================================================================

/// Keep redirects on this site.
///
/// Accepts absolute paths only; anything else (including `//host` and
/// `/\host`, which browsers treat as another origin) becomes `/`.
fn safe_return_path(candidate: Option<&str>) -> &str {
    match candidate {
        Some(path)
            if path.starts_with('/')
                && !path.starts_with("//")
                && !path.starts_with("/\\")
                && !path.starts_with("/auth/") =>
        {
            path
        }
        _ => "/",
    }
}

fn login_with_return(return_to: &str) -> String {
    if return_to == "/" {
        "/auth/login".to_string()
    } else {
        format!("/auth/login?return_to={}", urlencoding::encode(return_to))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_return_path() {
        assert_eq!(safe_return_path(Some("/profile")), "/profile");
        assert_eq!(safe_return_path(Some("//evil.example")), "/");
        assert_eq!(safe_return_path(Some("/\\evil.example")), "/");
        assert_eq!(safe_return_path(Some("https://evil.example")), "/");
        assert_eq!(safe_return_path(Some("/auth/logout")), "/");
        assert_eq!(safe_return_path(None), "/");
    }

    #[test]
    fn test_login_with_return() {
        assert_eq!(login_with_return("/"), "/auth/login");
        assert_eq!(
            login_with_return("/profile"),
            "/auth/login?return_to=%2Fprofile"
        );
    }
}
