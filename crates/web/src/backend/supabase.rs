//! HTTP client for a Supabase-compatible backend.
//!
//! Endpoints used:
//!
//! | Concern  | Request                                                   |
//! |----------|-----------------------------------------------------------|
//! | Sign in  | `POST /auth/v1/token?grant_type=password`                 |
//! | Refresh  | `POST /auth/v1/token?grant_type=refresh_token`            |
//! | Register | `POST /auth/v1/signup`                                    |
//! | Sign out | `POST /auth/v1/logout`                                    |
//! | Profile  | `GET` / `PATCH /rest/v1/{table}?id=eq.{id}`               |
//! | Upload   | `POST /storage/v1/object/{bucket}/{key}`                  |
//! | Signing  | `POST /storage/v1/object/sign/{bucket}/{key}`             |
//!
//! Every request carries the anon key as `apikey`. Calls made on a user's
//! behalf send that user's access token as the bearer; auth calls send the
//! anon key.

use async_trait::async_trait;
use reqwest::header::{CACHE_CONTROL, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use chrono::Utc;
use serde::Deserialize;
use tracing::instrument;

use techplement_core::{DisplayName, Email, Profile, ProfilePatch, StorageKey, UserId};

use super::{
    AccessToken, AuthProvider, AuthSession, BackendError, ObjectStorage, ProfileStore, SignUp,
    UploadOptions,
};
use crate::config::{BackendConfig, anon_key};

/// Client for auth, profile rows, and avatar storage.
#[derive(Clone)]
pub struct SupabaseClient {
    client: reqwest::Client,
    base_url: String,
    anon_key: SecretString,
    bucket: String,
    table: String,
}

impl SupabaseClient {
    /// Create a new backend client.
    ///
    /// # Errors
    ///
    /// Returns error if the anon key is not a valid header value or the HTTP
    /// client fails to build.
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "apikey",
            HeaderValue::from_str(anon_key(config))
                .map_err(|e| BackendError::Parse(format!("Invalid API key format: {e}")))?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: config.url.as_str().trim_end_matches('/').to_string(),
            anon_key: config.anon_key.clone(),
            bucket: config.avatar_bucket.clone(),
            table: config.profiles_table.clone(),
        })
    }

    fn auth_endpoint(&self, path: &str) -> String {
        format!("{}/auth/v1/{path}", self.base_url)
    }

    fn profile_endpoint(&self, user_id: &UserId) -> String {
        format!(
            "{}/rest/v1/{}?id=eq.{}",
            self.base_url,
            self.table,
            urlencoding::encode(user_id.as_str())
        )
    }

    fn object_endpoint(&self, kind: &str, key: &str) -> String {
        format!(
            "{}/storage/v1/object/{kind}{}/{}",
            self.base_url,
            self.bucket,
            urlencoding::encode(key)
        )
    }

    fn with_anon(&self, request: RequestBuilder) -> RequestBuilder {
        request.bearer_auth(self.anon_key.expose_secret())
    }

    async fn password_grant(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<AuthSession, BackendError> {
        let body = serde_json::json!({
            "email": email.as_str(),
            "password": password.expose_secret(),
        });

        let response = self
            .with_anon(
                self.client
                    .post(self.auth_endpoint("token?grant_type=password")),
            )
            .json(&body)
            .send()
            .await?;

        let token: TokenResponse = read_json(response, true).await?;
        token.into_session(email, Utc::now().timestamp())
    }
}

/// Access token lifetime assumed when the response omits it.
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

#[async_trait]
impl AuthProvider for SupabaseClient {
    #[instrument(skip(self, password), fields(email = %email))]
    async fn sign_in(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<AuthSession, BackendError> {
        self.password_grant(email, password).await
    }

    #[instrument(skip(self, password), fields(email = %email))]
    async fn sign_up(
        &self,
        email: &Email,
        password: &SecretString,
        full_name: &DisplayName,
    ) -> Result<SignUp, BackendError> {
        let body = serde_json::json!({
            "email": email.as_str(),
            "password": password.expose_secret(),
            "data": { "full_name": full_name.as_str() },
        });

        let response = self
            .with_anon(self.client.post(self.auth_endpoint("signup")))
            .json(&body)
            .send()
            .await?;

        // With autoconfirm on, the backend answers with a full session;
        // otherwise with the bare user and no token.
        let signup: TokenResponse = read_json(response, false).await?;
        if signup.access_token.is_none() {
            return Ok(SignUp::ConfirmationRequired);
        }
        signup
            .into_session(email, Utc::now().timestamp())
            .map(SignUp::SignedIn)
    }

    #[instrument(skip(self, refresh_token), fields(email = %email))]
    async fn refresh_session(
        &self,
        email: &Email,
        refresh_token: &AccessToken,
    ) -> Result<AuthSession, BackendError> {
        let response = self
            .with_anon(
                self.client
                    .post(self.auth_endpoint("token?grant_type=refresh_token")),
            )
            .json(&serde_json::json!({ "refresh_token": refresh_token.expose() }))
            .send()
            .await?;

        let token: TokenResponse = read_json(response, true).await?;
        token.into_session(email, Utc::now().timestamp())
    }

    #[instrument(skip_all)]
    async fn sign_out(&self, token: &AccessToken) -> Result<(), BackendError> {
        let response = self
            .client
            .post(self.auth_endpoint("logout"))
            .bearer_auth(token.expose())
            .send()
            .await?;

        check_status(response, true).await.map(drop)
    }
}

#[async_trait]
impl ProfileStore for SupabaseClient {
    #[instrument(skip(self, token), fields(user_id = %user_id))]
    async fn fetch_profile(
        &self,
        token: &AccessToken,
        user_id: &UserId,
    ) -> Result<Profile, BackendError> {
        let url = format!("{}&select=*&limit=1", self.profile_endpoint(user_id));

        let response = self
            .client
            .get(&url)
            .bearer_auth(token.expose())
            .send()
            .await?;

        let rows: Vec<Profile> = read_json(response, false).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| BackendError::NotFound(format!("profile {user_id}")))
    }

    #[instrument(skip(self, token, patch), fields(user_id = %user_id))]
    async fn update_profile(
        &self,
        token: &AccessToken,
        user_id: &UserId,
        patch: &ProfilePatch,
    ) -> Result<(), BackendError> {
        let response = self
            .client
            .patch(self.profile_endpoint(user_id))
            .bearer_auth(token.expose())
            .header("Prefer", "return=minimal")
            .json(patch)
            .send()
            .await?;

        check_status(response, false).await.map(drop)
    }
}

#[async_trait]
impl ObjectStorage for SupabaseClient {
    #[instrument(skip(self, token, bytes), fields(key = %key, size = bytes.len()))]
    async fn upload(
        &self,
        token: &AccessToken,
        key: &StorageKey,
        content_type: &str,
        bytes: Vec<u8>,
        options: UploadOptions,
    ) -> Result<(), BackendError> {
        let response = self
            .client
            .post(self.object_endpoint("", key.as_str()))
            .bearer_auth(token.expose())
            .header(CONTENT_TYPE, content_type)
            .header(
                CACHE_CONTROL,
                format!("max-age={}", options.cache_control_secs),
            )
            .header("x-upsert", if options.upsert { "true" } else { "false" })
            .body(bytes)
            .send()
            .await?;

        check_status(response, false).await.map(drop)
    }

    fn public_url(&self, key: &StorageKey) -> String {
        self.object_endpoint("public/", key.as_str())
    }

    #[instrument(skip(self, token))]
    async fn signed_url(
        &self,
        token: &AccessToken,
        object_key: &str,
        ttl_secs: u64,
    ) -> Result<String, BackendError> {
        let response = self
            .client
            .post(self.object_endpoint("sign/", object_key))
            .bearer_auth(token.expose())
            .json(&serde_json::json!({ "expiresIn": ttl_secs }))
            .send()
            .await?;

        let signed: SignedUrlResponse = read_json(response, false).await?;
        Ok(absolute_signed_url(&self.base_url, &signed.signed_url))
    }
}

// =============================================================================
// Response handling
// =============================================================================

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    expires_at: Option<i64>,
    user: Option<AuthUser>,
}

#[derive(Debug, Deserialize)]
struct AuthUser {
    id: String,
    email: Option<String>,
    #[serde(default)]
    user_metadata: UserMetadata,
}

#[derive(Debug, Default, Deserialize)]
struct UserMetadata {
    full_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SignedUrlResponse {
    #[serde(rename = "signedURL")]
    signed_url: String,
}

/// Error bodies come in several shapes depending on the service.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    error_description: Option<String>,
    msg: Option<String>,
    message: Option<String>,
    error: Option<String>,
}

impl ErrorBody {
    fn into_message(self) -> Option<String> {
        self.error_description
            .or(self.msg)
            .or(self.message)
            .or(self.error)
            .filter(|m| !m.trim().is_empty())
    }
}

impl TokenResponse {
    /// `now` is the Unix time the response was received.
    fn into_session(self, email: &Email, now: i64) -> Result<AuthSession, BackendError> {
        let access_token = self
            .access_token
            .ok_or_else(|| BackendError::Parse("missing access_token".to_string()))?;
        let user = self
            .user
            .ok_or_else(|| BackendError::Parse("missing user".to_string()))?;

        let email = user
            .email
            .as_deref()
            .and_then(|e| Email::parse(e).ok())
            .unwrap_or_else(|| email.clone());

        Ok(AuthSession {
            user_id: UserId::new(user.id),
            email,
            full_name: user.user_metadata.full_name.filter(|n| !n.trim().is_empty()),
            access_token: AccessToken::new(access_token),
            refresh_token: self.refresh_token.map(AccessToken::new),
            expires_at: self
                .expires_at
                .unwrap_or_else(|| now + self.expires_in.unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS)),
        })
    }
}

/// Turn a non-success response into a [`BackendError`].
///
/// `auth_call` marks requests where 400 and 401 mean the credentials or
/// token were rejected.
async fn check_status(response: Response, auth_call: bool) -> Result<Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .ok()
        .and_then(ErrorBody::into_message)
        .unwrap_or(text);

    Err(classify(status, message, auth_call))
}

fn classify(status: StatusCode, message: String, auth_call: bool) -> BackendError {
    match status {
        StatusCode::UNAUTHORIZED => BackendError::Unauthorized(message),
        StatusCode::BAD_REQUEST if auth_call => BackendError::Unauthorized(message),
        StatusCode::NOT_FOUND => BackendError::NotFound(message),
        _ => BackendError::Api {
            status: status.as_u16(),
            message,
        },
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(
    response: Response,
    auth_call: bool,
) -> Result<T, BackendError> {
    check_status(response, auth_call)
        .await?
        .json()
        .await
        .map_err(|e| BackendError::Parse(e.to_string()))
}

/// Signed paths come back relative to the storage API root.
fn absolute_signed_url(base_url: &str, signed: &str) -> String {
    if signed.starts_with("http://") || signed.starts_with("https://") {
        return signed.to_string();
    }
    let path = signed.trim_start_matches('/');
    format!("{base_url}/storage/v1/{path}")
}
