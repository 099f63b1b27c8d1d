//! Authentication service.
//!
//! Validates form input locally, then delegates to the [`AuthProvider`].
//! Password storage, hashing and confirmation emails belong to the backend.

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tracing::instrument;

use techplement_core::{DisplayName, DisplayNameError, Email, EmailError};

use crate::backend::{AccessToken, AuthProvider, AuthSession, BackendError, SignUp};
use crate::models::CurrentUser;

/// Minimum password length accepted at registration.
const MIN_PASSWORD_LENGTH: usize = 6;

/// Errors from sign in and registration.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    /// Registration without a name.
    #[error("invalid name: {0}")]
    InvalidName(#[from] DisplayNameError),

    /// No password entered.
    #[error("password is required")]
    MissingPassword,

    /// Password too weak.
    #[error("password validation failed: {0}")]
    WeakPassword(String),

    /// Password and confirmation differ.
    #[error("passwords do not match")]
    PasswordMismatch,

    /// Backend rejected the credentials.
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    /// Backend call failed.
    #[error("backend error: {0}")]
    Backend(BackendError),
}

impl From<BackendError> for AuthError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Unauthorized(message) => Self::InvalidCredentials(message),
            other => Self::Backend(other),
        }
    }
}

impl AuthError {
    /// Message shown on the login or registration page.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidEmail(_) => "Please enter a valid email address".to_string(),
            Self::InvalidName(_) => "Please enter your full name".to_string(),
            Self::MissingPassword => "Please enter your password".to_string(),
            Self::WeakPassword(msg) => msg.clone(),
            Self::PasswordMismatch => "Passwords do not match".to_string(),
            Self::InvalidCredentials(msg) if !msg.is_empty() => msg.clone(),
            Self::InvalidCredentials(_) => "Invalid login credentials".to_string(),
            Self::Backend(err) => err.user_message(),
        }
    }
}

/// Sign-out failure. The user stays signed in and may retry.
#[derive(Debug, Error)]
#[error("sign out failed: {0}")]
pub struct SignOutError(#[from] pub BackendError);

/// Authentication service.
pub struct AuthService<'a> {
    provider: &'a dyn AuthProvider,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(provider: &'a dyn AuthProvider) -> Self {
        Self { provider }
    }

    /// Sign in with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` or `AuthError::MissingPassword` for
    /// bad input, `AuthError::InvalidCredentials` if the backend rejects the
    /// pair, and `AuthError::Backend` for transport failures.
    #[instrument(skip(self, password))]
    pub async fn login(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<AuthSession, AuthError> {
        let email = Email::parse(email)?;
        if password.expose_secret().is_empty() {
            return Err(AuthError::MissingPassword);
        }

        Ok(self.provider.sign_in(&email, password).await?)
    }

    /// Register a new account.
    ///
    /// # Errors
    ///
    /// Returns a validation variant of [`AuthError`] for bad input, or the
    /// backend's rejection (for example an address already registered).
    #[instrument(skip(self, password, password_confirm))]
    pub async fn register(
        &self,
        email: &str,
        full_name: &str,
        password: &SecretString,
        password_confirm: &SecretString,
    ) -> Result<SignUp, AuthError> {
        let email = Email::parse(email)?;
        let full_name = DisplayName::parse(full_name)?;
        validate_password(password.expose_secret())?;
        if password.expose_secret() != password_confirm.expose_secret() {
            return Err(AuthError::PasswordMismatch);
        }

        Ok(self.provider.sign_up(&email, password, &full_name).await?)
    }

    /// Renew the user's access token.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Unauthorized` when the user holds no refresh
    /// token or the backend refuses it.
    #[instrument(skip_all, fields(user_id = %user.id))]
    pub async fn refresh(&self, user: &CurrentUser) -> Result<CurrentUser, BackendError> {
        let refresh_token = user
            .refresh_token
            .as_ref()
            .ok_or_else(|| BackendError::Unauthorized("no refresh token".to_string()))?;

        let session = self
            .provider
            .refresh_session(&user.email, refresh_token)
            .await?;
        Ok(CurrentUser::from(session))
    }

    /// Revoke the backend session.
    ///
    /// A token the backend no longer recognizes counts as signed out.
    ///
    /// # Errors
    ///
    /// Returns `SignOutError` if the backend could not be reached or refused
    /// for another reason.
    #[instrument(skip_all)]
    pub async fn sign_out(&self, token: &AccessToken) -> Result<(), SignOutError> {
        match self.provider.sign_out(token).await {
            Ok(()) | Err(BackendError::Unauthorized(_)) => Ok(()),
            Err(err) => Err(SignOutError(err)),
        }
    }
}

/// Validate password strength.
fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}
