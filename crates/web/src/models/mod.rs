//! Session-stored models for the web application.

pub mod session;

pub use session::{CurrentUser, Toast, ToastKind, keys};
