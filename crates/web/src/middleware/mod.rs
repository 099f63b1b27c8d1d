//! HTTP middleware stack for the web application.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layer (capture errors)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. Security headers (CSP, frame and referrer policy)
//! 5. Session layer (tower-sessions with in-memory store)

pub mod auth;
pub mod flash;
pub mod request_id;
pub mod security_headers;
pub mod session;

pub use auth::{
    OptionalAuth, RequireAuth, SESSION_EXPIRED_MESSAGE, clear_current_user, end_expired_session,
    set_current_user,
};
pub use flash::{
    push_toast, set_pending_name, set_pending_preview, take_pending_name, take_pending_preview,
    take_toasts,
};
pub use request_id::request_id_middleware;
pub use security_headers::{SecurityHeaders, security_headers_middleware};
pub use session::{SESSION_COOKIE_NAME, create_session_layer};
