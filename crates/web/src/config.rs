//! Web application configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `TECHPLEMENT_BASE_URL` - Public URL of this application
//! - `SUPABASE_URL` - Hosted backend project URL (e.g., <https://abc.supabase.co>)
//! - `SUPABASE_ANON_KEY` - Backend anonymous API key
//!
//! ## Optional
//! - `TECHPLEMENT_HOST` - Bind address (default: 127.0.0.1)
//! - `TECHPLEMENT_PORT` - Listen port (default: 3000)
//! - `TECHPLEMENT_STATIC_DIR` - Static asset directory (default: crates/web/static)
//! - `TECHPLEMENT_REPOSITORY_URL` - Repository linked from the header and home page
//! - `SUPABASE_AVATAR_BUCKET` - Storage bucket for avatars (default: avatars)
//! - `SUPABASE_PROFILES_TABLE` - Table holding profile rows (default: profiles)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::net::{IpAddr, SocketAddr};

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

/// Default repository link shown in the header.
const DEFAULT_REPOSITORY_URL: &str = "https://github.com/ASHOKDUPATI09/Techplement";

/// Minimum length of a real backend API key.
const MIN_API_KEY_LENGTH: usize = 32;

/// Values that show up when a `.env` template was copied but never filled in.
const PLACEHOLDER_PREFIXES: &[&str] = &[
    "your-",
    "your_",
    "changeme",
    "replace",
    "placeholder",
    "xxx",
    "todo",
    "insert",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Web application configuration.
#[derive(Debug, Clone)]
pub struct WebConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL of the application
    pub base_url: String,
    /// Directory served under `/static`
    pub static_dir: String,
    /// Repository linked from the header and home page
    pub repository_url: String,
    /// Hosted backend configuration
    pub backend: BackendConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// Hosted backend (auth, rows, storage) configuration.
#[derive(Clone)]
pub struct BackendConfig {
    /// Project URL, without trailing slash
    pub url: Url,
    /// Anonymous API key sent as `apikey` on every request
    pub anon_key: SecretString,
    /// Storage bucket for avatars
    pub avatar_bucket: String,
    /// Table holding profile rows
    pub profiles_table: String,
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("url", &self.url.as_str())
            .field("anon_key", &"[REDACTED]")
            .field("avatar_bucket", &self.avatar_bucket)
            .field("profiles_table", &self.profiles_table)
            .finish()
    }
}

impl WebConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid, or
    /// if the backend key looks like an unfilled placeholder.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let host = get_env_or_default("TECHPLEMENT_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("TECHPLEMENT_HOST".to_string(), e.to_string())
            })?;
        let port = get_env_or_default("TECHPLEMENT_PORT", "3000")
            .parse::<u16>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("TECHPLEMENT_PORT".to_string(), e.to_string())
            })?;

        Ok(Self {
            host,
            port,
            base_url: get_required_env("TECHPLEMENT_BASE_URL")?,
            static_dir: get_env_or_default("TECHPLEMENT_STATIC_DIR", "crates/web/static"),
            repository_url: get_env_or_default(
                "TECHPLEMENT_REPOSITORY_URL",
                DEFAULT_REPOSITORY_URL,
            ),
            backend: BackendConfig::from_env()?,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether cookies should carry the `Secure` attribute.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

impl BackendConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let raw_url = get_required_env("SUPABASE_URL")?;
        let url = parse_backend_url(&raw_url)
            .map_err(|e| ConfigError::InvalidEnvVar("SUPABASE_URL".to_string(), e))?;

        Ok(Self {
            url,
            anon_key: get_validated_key("SUPABASE_ANON_KEY")?,
            avatar_bucket: get_env_or_default("SUPABASE_AVATAR_BUCKET", "avatars"),
            profiles_table: get_env_or_default("SUPABASE_PROFILES_TABLE", "profiles"),
        })
    }

    /// Origin of the backend, used to allow its images in the CSP.
    #[must_use]
    pub fn origin(&self) -> String {
        self.url.origin().ascii_serialization()
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable, treating empty values as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Parse the backend URL, requiring http(s) and dropping any trailing slash.
fn parse_backend_url(raw: &str) -> Result<Url, String> {
    let url = Url::parse(raw.trim().trim_end_matches('/')).map_err(|e| e.to_string())?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(format!("unsupported scheme '{other}'")),
    }
}

/// Reject keys that are obviously not real.
fn validate_key(value: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = value.trim().to_lowercase();

    if let Some(prefix) = PLACEHOLDER_PREFIXES.iter().find(|p| lower.starts_with(**p)) {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!("appears to be a placeholder (starts with '{prefix}')"),
        ));
    }

    if lower.len() < MIN_API_KEY_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {MIN_API_KEY_LENGTH} characters (got {})",
                lower.len()
            ),
        ));
    }

    Ok(())
}

/// Load and validate an API key from environment.
fn get_validated_key(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_key(&value, key)?;
    Ok(SecretString::from(value.trim().to_string()))
}

/// Expose the anon key for request headers.
pub(crate) fn anon_key(config: &BackendConfig) -> &str {
    config.anon_key.expose_secret()
}
