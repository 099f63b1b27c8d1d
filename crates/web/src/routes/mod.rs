//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                  - Home page (requires auth)
//! GET  /health            - Health check
//!
//! # Auth
//! GET  /auth/login        - Login page
//! POST /auth/login        - Login action
//! GET  /auth/register     - Register page
//! POST /auth/register     - Register action
//! POST /auth/logout       - Sign out
//!
//! # Profile (requires auth)
//! GET  /profile           - Profile page
//! POST /profile           - Save display name
//! POST /profile/avatar    - Upload avatar (multipart, field `avatar`)
//! ```

pub mod auth;
pub mod home;
pub mod layout;
pub mod profile;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::Uri,
    routing::{get, post},
};

use crate::error::AppError;
use crate::state::AppState;

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", get(auth::login_page).post(auth::login))
        .route("/register", get(auth::register_page).post(auth::register))
        .route("/logout", post(auth::logout))
}

/// Create the profile routes router.
pub fn profile_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(profile::show).post(profile::save))
        .route(
            "/avatar",
            post(profile::upload_avatar).layer(DefaultBodyLimit::max(profile::AVATAR_BODY_LIMIT)),
        )
}

/// Create the main routes router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(home::home))
        .route("/health", get(health))
        .nest("/auth", auth_routes())
        .nest("/profile", profile_routes())
        .fallback(not_found)
}

/// Anything without a route.
async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound(uri.path().to_string())
}

/// Liveness health check endpoint.
async fn health() -> &'static str {
    "ok"
}
