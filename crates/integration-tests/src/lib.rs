//! Integration test support for Techplement.
//!
//! The tests under `tests/` drive the real router and services against an
//! in-memory backend. [`FakeBackend`] implements the auth, profile, and
//! storage collaborators, records every call it receives, and can be told to
//! fail individual operations.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p techplement-integration-tests
//! ```
//!
//! No network, database, or credentials are needed.

use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, Response, header},
};
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use tower::ServiceExt;
use url::Url;

use techplement_core::{DisplayName, Email, Profile, ProfilePatch, StorageKey, UserId};
use techplement_web::backend::{
    AccessToken, AuthProvider, AuthSession, BackendError, ObjectStorage, ProfileStore, SignUp,
    UploadOptions,
};
use techplement_web::config::{BackendConfig, WebConfig};
use techplement_web::middleware::SESSION_COOKIE_NAME;
use techplement_web::services::Clock;
use techplement_web::state::{AppState, Collaborators};

/// Time the test clock is pinned to, in Unix milliseconds.
pub const NOW_MILLIS: i64 = 1_700_000_000_000;

/// Storage root the fake backend builds object URLs under.
pub const STORAGE_ROOT: &str = "https://backend.test/storage/v1/object";

/// Bucket the fake backend stores avatars in.
pub const AVATAR_BUCKET: &str = "avatars";

/// Lifetime of the access tokens the fake backend issues.
pub const TOKEN_LIFETIME_SECS: i64 = 3600;

// =============================================================================
// Fake Backend
// =============================================================================

/// An operation the fake backend can be told to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailOn {
    FetchProfile,
    UpdateProfile,
    Upload,
    SignUrl,
    SignOut,
}

/// An object stored through [`ObjectStorage::upload`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedUpload {
    pub key: String,
    pub content_type: String,
    pub len: usize,
    pub options: UploadOptions,
}

/// A call to [`ObjectStorage::signed_url`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignRequest {
    pub object_key: String,
    pub ttl_secs: u64,
}

/// A call to [`ProfileStore::update_profile`], with the patch as sent on the
/// wire.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedPatch {
    pub user_id: UserId,
    pub body: serde_json::Value,
}

#[derive(Debug, Clone)]
struct FakeUser {
    id: UserId,
    password: String,
    full_name: Option<String>,
}

#[derive(Debug, Default)]
struct Recorded {
    users: HashMap<String, FakeUser>,
    profiles: HashMap<UserId, Profile>,
    failing: HashSet<FailOn>,
    uploads: Vec<RecordedUpload>,
    sign_requests: Vec<SignRequest>,
    patches: Vec<RecordedPatch>,
    profile_fetches: usize,
    sign_outs: usize,
    refreshes: usize,
    issue_expired: bool,
    tokens_revoked: bool,
}

/// In-memory auth, profile, and storage backend.
#[derive(Debug, Default)]
pub struct FakeBackend {
    inner: Mutex<Recorded>,
}

impl FakeBackend {
    /// Create an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Recorded> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a user with a profile row.
    #[must_use]
    pub fn with_user(self, id: &str, email: &str, password: &str, full_name: Option<&str>) -> Self {
        {
            let mut inner = self.lock();
            let user_id = UserId::new(id);
            inner.users.insert(
                email.to_owned(),
                FakeUser {
                    id: user_id.clone(),
                    password: password.to_owned(),
                    full_name: full_name.map(str::to_owned),
                },
            );
            inner.profiles.insert(
                user_id.clone(),
                Profile {
                    id: user_id,
                    full_name: full_name.map(str::to_owned),
                    avatar_url: None,
                    updated_at: None,
                },
            );
        }
        self
    }

    /// Point a user's stored avatar at `reference`.
    #[must_use]
    pub fn with_avatar(self, id: &str, reference: &str) -> Self {
        if let Some(profile) = self.lock().profiles.get_mut(&UserId::new(id)) {
            profile.avatar_url = Some(reference.to_owned());
        }
        self
    }

    /// Remove a user's profile row, keeping the account.
    #[must_use]
    pub fn without_profile(self, id: &str) -> Self {
        self.lock().profiles.remove(&UserId::new(id));
        self
    }

    /// Issue access tokens that are already expired at sign-in.
    #[must_use]
    pub fn with_expired_sessions(self) -> Self {
        self.lock().issue_expired = true;
        self
    }

    /// Refuse every token issued so far, access and refresh alike.
    pub fn revoke_tokens(&self) {
        self.lock().tokens_revoked = true;
    }

    /// Make `op` fail from now on.
    pub fn fail(&self, op: FailOn) {
        self.lock().failing.insert(op);
    }

    /// Let `op` succeed again.
    pub fn recover(&self, op: FailOn) {
        self.lock().failing.remove(&op);
    }

    /// Stored profile row for `id`.
    #[must_use]
    pub fn profile(&self, id: &str) -> Option<Profile> {
        self.lock().profiles.get(&UserId::new(id)).cloned()
    }

    /// Every upload received, in order.
    #[must_use]
    pub fn uploads(&self) -> Vec<RecordedUpload> {
        self.lock().uploads.clone()
    }

    /// Every signing request received, in order.
    #[must_use]
    pub fn sign_requests(&self) -> Vec<SignRequest> {
        self.lock().sign_requests.clone()
    }

    /// Every profile patch received, in order.
    #[must_use]
    pub fn patches(&self) -> Vec<RecordedPatch> {
        self.lock().patches.clone()
    }

    /// Number of profile fetches received.
    #[must_use]
    pub fn profile_fetches(&self) -> usize {
        self.lock().profile_fetches
    }

    /// Number of successful sign-outs.
    #[must_use]
    pub fn sign_outs(&self) -> usize {
        self.lock().sign_outs
    }

    /// Number of successful token refreshes.
    #[must_use]
    pub fn refreshes(&self) -> usize {
        self.lock().refreshes
    }

    fn check_token(&self) -> Result<(), BackendError> {
        if self.lock().tokens_revoked {
            return Err(BackendError::Unauthorized("JWT expired".to_string()));
        }
        Ok(())
    }

    fn session_for(&self, user: &FakeUser, email: &Email, access_token: String) -> AuthSession {
        let now = NOW_MILLIS / 1000;
        let expires_at = if self.lock().issue_expired {
            now - 1
        } else {
            now + TOKEN_LIFETIME_SECS
        };

        AuthSession {
            user_id: user.id.clone(),
            email: email.clone(),
            full_name: user.full_name.clone(),
            access_token: AccessToken::new(access_token),
            refresh_token: Some(AccessToken::new(refresh_token_for(&user.id))),
            expires_at,
        }
    }

    fn check(&self, op: FailOn) -> Result<(), BackendError> {
        if self.lock().failing.contains(&op) {
            return Err(BackendError::Api {
                status: 503,
                message: format!("{op:?} unavailable"),
            });
        }
        Ok(())
    }
}

/// Token the fake backend issues to a user.
#[must_use]
pub fn token_for(user_id: &UserId) -> String {
    format!("token-{user_id}")
}

/// Refresh token the fake backend issues to a user.
#[must_use]
pub fn refresh_token_for(user_id: &UserId) -> String {
    format!("refresh-{user_id}")
}

#[async_trait]
impl AuthProvider for FakeBackend {
    async fn sign_in(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<AuthSession, BackendError> {
        let user = self
            .lock()
            .users
            .get(email.as_str())
            .filter(|user| user.password == password.expose_secret())
            .cloned()
            .ok_or_else(|| BackendError::Unauthorized("Invalid login credentials".to_string()))?;

        Ok(self.session_for(&user, email, token_for(&user.id)))
    }

    async fn sign_up(
        &self,
        email: &Email,
        password: &SecretString,
        full_name: &DisplayName,
    ) -> Result<SignUp, BackendError> {
        let mut inner = self.lock();
        if inner.users.contains_key(email.as_str()) {
            return Err(BackendError::Api {
                status: 422,
                message: "User already registered".to_string(),
            });
        }

        let user_id = UserId::new(format!("u-{}", inner.users.len() + 1));
        let user = FakeUser {
            id: user_id.clone(),
            password: password.expose_secret().to_owned(),
            full_name: Some(full_name.to_string()),
        };
        inner.users.insert(email.as_str().to_owned(), user.clone());
        inner.profiles.insert(
            user_id.clone(),
            Profile {
                id: user_id.clone(),
                full_name: Some(full_name.to_string()),
                avatar_url: None,
                updated_at: None,
            },
        );
        drop(inner);

        Ok(SignUp::SignedIn(self.session_for(
            &user,
            email,
            token_for(&user_id),
        )))
    }

    async fn refresh_session(
        &self,
        email: &Email,
        refresh_token: &AccessToken,
    ) -> Result<AuthSession, BackendError> {
        let mut inner = self.lock();
        let user = inner
            .users
            .values()
            .find(|user| refresh_token_for(&user.id) == refresh_token.expose())
            .filter(|_| !inner.tokens_revoked)
            .cloned()
            .ok_or_else(|| BackendError::Unauthorized("Invalid Refresh Token".to_string()))?;

        inner.refreshes += 1;
        let access_token = format!("{}-r{}", token_for(&user.id), inner.refreshes);
        drop(inner);

        let mut session = self.session_for(&user, email, access_token);
        session.expires_at = NOW_MILLIS / 1000 + TOKEN_LIFETIME_SECS;
        Ok(session)
    }

    async fn sign_out(&self, _token: &AccessToken) -> Result<(), BackendError> {
        self.check(FailOn::SignOut)?;
        self.lock().sign_outs += 1;
        Ok(())
    }
}

#[async_trait]
impl ProfileStore for FakeBackend {
    async fn fetch_profile(
        &self,
        _token: &AccessToken,
        user_id: &UserId,
    ) -> Result<Profile, BackendError> {
        self.lock().profile_fetches += 1;
        self.check_token()?;
        self.check(FailOn::FetchProfile)?;

        self.lock()
            .profiles
            .get(user_id)
            .cloned()
            .ok_or_else(|| BackendError::NotFound(format!("profile {user_id}")))
    }

    async fn update_profile(
        &self,
        _token: &AccessToken,
        user_id: &UserId,
        patch: &ProfilePatch,
    ) -> Result<(), BackendError> {
        let body = serde_json::to_value(patch).map_err(|e| BackendError::Parse(e.to_string()))?;
        self.lock().patches.push(RecordedPatch {
            user_id: user_id.clone(),
            body,
        });
        self.check_token()?;
        self.check(FailOn::UpdateProfile)?;

        let mut inner = self.lock();
        if let Some(profile) = inner.profiles.get_mut(user_id) {
            match patch {
                ProfilePatch::Name(update) => {
                    profile.full_name = Some(update.full_name.to_string());
                    profile.updated_at = Some(update.updated_at);
                }
                ProfilePatch::Avatar(update) => {
                    profile.avatar_url = Some(update.avatar_url.clone());
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStorage for FakeBackend {
    async fn upload(
        &self,
        _token: &AccessToken,
        key: &StorageKey,
        content_type: &str,
        bytes: Vec<u8>,
        options: UploadOptions,
    ) -> Result<(), BackendError> {
        self.lock().uploads.push(RecordedUpload {
            key: key.to_string(),
            content_type: content_type.to_owned(),
            len: bytes.len(),
            options,
        });
        self.check_token()?;
        self.check(FailOn::Upload)
    }

    fn public_url(&self, key: &StorageKey) -> String {
        format!("{STORAGE_ROOT}/public/{AVATAR_BUCKET}/{key}")
    }

    async fn signed_url(
        &self,
        _token: &AccessToken,
        object_key: &str,
        ttl_secs: u64,
    ) -> Result<String, BackendError> {
        self.lock().sign_requests.push(SignRequest {
            object_key: object_key.to_owned(),
            ttl_secs,
        });
        self.check_token()?;
        self.check(FailOn::SignUrl)?;

        Ok(format!(
            "{STORAGE_ROOT}/sign/{AVATAR_BUCKET}/{object_key}?token=signed-{ttl_secs}"
        ))
    }
}

// =============================================================================
// Clock
// =============================================================================

/// Clock pinned to one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl FixedClock {
    /// Clock pinned to `millis` since the Unix epoch.
    ///
    /// # Panics
    ///
    /// Panics if `millis` is out of range for `DateTime`.
    #[must_use]
    pub fn at_millis(millis: i64) -> Self {
        Self(DateTime::from_timestamp_millis(millis).expect("timestamp in range"))
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

// =============================================================================
// Application Harness
// =============================================================================

/// Configuration for an application under test.
///
/// # Panics
///
/// Panics if the hard-coded backend URL does not parse.
#[must_use]
pub fn test_config() -> WebConfig {
    WebConfig {
        host: IpAddr::from([127, 0, 0, 1]),
        port: 0,
        base_url: "http://localhost:3000".to_string(),
        static_dir: "static".to_string(),
        repository_url: "https://github.com/ASHOKDUPATI09/Techplement".to_string(),
        backend: BackendConfig {
            url: Url::parse("https://backend.test").expect("valid backend URL"),
            anon_key: SecretString::from("test-anon-key-0123456789abcdefghijklmnop"),
            avatar_bucket: AVATAR_BUCKET.to_string(),
            profiles_table: "profiles".to_string(),
        },
        sentry_dsn: None,
        sentry_environment: None,
    }
}

/// The full router wired to a [`FakeBackend`] and a [`FixedClock`].
pub struct TestApp {
    pub backend: Arc<FakeBackend>,
    pub state: AppState,
    router: Router,
}

impl TestApp {
    /// Build the application around `backend`.
    #[must_use]
    pub fn new(backend: FakeBackend) -> Self {
        let backend = Arc::new(backend);
        let collaborators = Collaborators {
            auth: backend.clone(),
            profiles: backend.clone(),
            storage: backend.clone(),
            clock: Arc::new(FixedClock::at_millis(NOW_MILLIS)),
        };
        let state = AppState::new(test_config(), collaborators);
        let router = techplement_web::app(state.clone());

        Self {
            backend,
            state,
            router,
        }
    }

    /// Send one request through the router.
    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        match self.router.clone().oneshot(request).await {
            Ok(response) => response,
            Err(never) => match never {},
        }
    }

    /// `GET path`, optionally with a session cookie.
    ///
    /// # Panics
    ///
    /// Panics if `path` is not a valid URI.
    pub async fn get(&self, path: &str, cookie: Option<&str>) -> Response<Body> {
        let request = with_cookie(Request::get(path), cookie)
            .body(Body::empty())
            .expect("valid request");
        self.send(request).await
    }

    /// `POST path` with a URL-encoded form body.
    ///
    /// # Panics
    ///
    /// Panics if `path` is not a valid URI.
    pub async fn post_form(&self, path: &str, cookie: Option<&str>, form: &str) -> Response<Body> {
        let request = with_cookie(Request::post(path), cookie)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(form.to_owned()))
            .expect("valid request");
        self.send(request).await
    }

    /// `POST /profile/avatar` with one file in the `avatar` field.
    ///
    /// # Panics
    ///
    /// Panics if the request cannot be built.
    pub async fn upload_avatar(
        &self,
        cookie: &str,
        file_name: &str,
        content_type: &str,
        bytes: &[u8],
    ) -> Response<Body> {
        let (boundary_header, body) = multipart_file("avatar", file_name, content_type, bytes);
        let request = with_cookie(Request::post("/profile/avatar"), Some(cookie))
            .header(header::CONTENT_TYPE, boundary_header)
            .body(Body::from(body))
            .expect("valid request");
        self.send(request).await
    }

    /// Sign in through the login form and return the session cookie.
    ///
    /// # Panics
    ///
    /// Panics if the login does not set a session cookie.
    pub async fn sign_in(&self, email: &str, password: &str) -> String {
        let form = format!(
            "email={}&password={}",
            form_encode(email),
            form_encode(password)
        );
        let response = self.post_form("/auth/login", None, &form).await;
        session_cookie(&response).expect("login sets a session cookie")
    }
}

fn with_cookie(
    builder: axum::http::request::Builder,
    cookie: Option<&str>,
) -> axum::http::request::Builder {
    match cookie {
        Some(cookie) => builder.header(header::COOKIE, cookie),
        None => builder,
    }
}

fn form_encode(value: &str) -> String {
    value
        .bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                char::from(b).to_string()
            }
            _ => format!("%{b:02X}"),
        })
        .collect()
}

/// Build a `multipart/form-data` body holding a single file field.
///
/// Returns the `Content-Type` header value and the body.
#[must_use]
pub fn multipart_file(
    field: &str,
    file_name: &str,
    content_type: &str,
    bytes: &[u8],
) -> (String, Vec<u8>) {
    const BOUNDARY: &str = "techplement-test-boundary";

    let mut body = format!(
        "--{BOUNDARY}\r\n\
         Content-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n\
         Content-Type: {content_type}\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    (format!("multipart/form-data; boundary={BOUNDARY}"), body)
}

/// The `name=value` pair of the session cookie set by `response`.
#[must_use]
pub fn session_cookie(response: &Response<Body>) -> Option<String> {
    let prefix = format!("{SESSION_COOKIE_NAME}=");
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter(|value| value.starts_with(&prefix))
        .find_map(|value| value.split(';').next().map(str::to_owned))
}

/// The `Location` header of a redirect.
#[must_use]
pub fn location(response: &Response<Body>) -> Option<&str> {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
}

/// Read the whole response body as text.
///
/// # Panics
///
/// Panics if the body cannot be read.
pub async fn body_text(response: Response<Body>) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("readable body");
    String::from_utf8_lossy(&bytes).into_owned()
}
