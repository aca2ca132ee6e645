//! Supabase backend: GoTrue auth plus PostgREST row access over HTTP.
//!
//! A thin pass-through: every trait call is one HTTP request. The current
//! session is held in memory and its access token is attached to row calls
//! so row-level security applies.
//!
//! Access tokens are refreshed shortly before they expire. When a refresh is
//! refused, or a row call comes back 401, the session is ended locally and a
//! sign-out event is broadcast so the gate drops to `Unauthenticated`.

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use reqwest::{RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio::sync::{Mutex, RwLock, broadcast};
use tracing::{debug, info, warn};

use super::traits::{
    AuthEvent, Credentials, IdentityProvider, OrganizationDirectory, ProfileStore, RequestStore,
    Session,
};
use crate::error::{AuthError, BackendError};
use crate::profile::{Organization, Profile, ProfilePatch};
use crate::requests::{NewRequest, Request};

const PROFILES_TABLE: &str = "profiles";
const ORGANIZATIONS_TABLE: &str = "empresas";
const REQUESTS_TABLE: &str = "solicitudes";

const AUTH_EVENT_CAPACITY: usize = 16;

/// Refresh this many seconds before the stated token expiry.
const REFRESH_MARGIN_SECS: i64 = 60;

/// Connection settings for a Supabase project.
#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    /// Project URL, e.g. `https://xyz.supabase.co`.
    pub url: String,
    /// Public anon key.
    pub anon_key: SecretString,
}

/// Hosted backend client.
pub struct SupabaseBackend {
    base_url: String,
    anon_key: SecretString,
    client: reqwest::Client,
    session: RwLock<Option<StoredSession>>,
    /// Serializes refreshes; refresh tokens are single use.
    refreshing: Mutex<()>,
    tx: broadcast::Sender<AuthEvent>,
}

/// The held session plus what is needed to keep it alive.
struct StoredSession {
    session: Session,
    refresh_token: Option<SecretString>,
    expires_at: Option<DateTime<Utc>>,
}

impl StoredSession {
    fn from_token(token: TokenResponse, fallback_email: &str, now: DateTime<Utc>) -> Self {
        let expires_at = token
            .expires_at
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .or_else(|| {
                token
                    .expires_in
                    .and_then(TimeDelta::try_seconds)
                    .map(|ttl| now + ttl)
            });
        Self {
            session: Session::new(
                token.user.id,
                token.user.email.unwrap_or_else(|| fallback_email.to_string()),
                token.access_token,
            ),
            refresh_token: token.refresh_token.map(SecretString::from),
            expires_at,
        }
    }

    fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at
            .is_some_and(|at| now + TimeDelta::seconds(REFRESH_MARGIN_SECS) >= at)
    }
}

#[derive(Debug, Deserialize)]
struct AuthUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    /// Lifetime in seconds.
    #[serde(default)]
    expires_in: Option<i64>,
    /// Unix timestamp; preferred over `expires_in` when present.
    #[serde(default)]
    expires_at: Option<i64>,
    user: AuthUser,
}

/// `/signup` returns a full token response when auto-confirm is on, and a
/// bare user when email confirmation is pending.
#[derive(Debug, Deserialize)]
struct SignUpResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    #[serde(default)]
    user: Option<AuthUser>,
}

#[derive(Debug, Default, Deserialize)]
struct AuthErrorBody {
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    msg: Option<String>,
}

impl AuthErrorBody {
    fn code(&self) -> Option<&str> {
        self.error_code.as_deref().or(self.error.as_deref())
    }

    fn message(&self) -> String {
        self.msg
            .clone()
            .or_else(|| self.error_description.clone())
            .or_else(|| self.code().map(str::to_string))
            .unwrap_or_else(|| "unknown error".to_string())
    }
}

/// Map a failed GoTrue response to the auth taxonomy.
fn classify_auth_error(status: StatusCode, body: &str) -> AuthError {
    let parsed: AuthErrorBody = serde_json::from_str(body).unwrap_or_default();
    match (status, parsed.code()) {
        (StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED, Some("invalid_credentials"))
        | (StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED, Some("invalid_grant")) => {
            AuthError::InvalidCredentials
        }
        (_, Some("user_already_exists")) | (_, Some("email_exists")) => {
            AuthError::AlreadyRegistered
        }
        _ => AuthError::Unknown(format!("{status}: {}", parsed.message())),
    }
}

/// Map a failed PostgREST response to the backend taxonomy.
fn classify_row_error(status: StatusCode, body: String, entity: &str, id: &str) -> BackendError {
    match status {
        StatusCode::CONFLICT => BackendError::Conflict {
            entity: entity.to_string(),
            id: id.to_string(),
        },
        StatusCode::NOT_FOUND => BackendError::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        },
        StatusCode::UNAUTHORIZED => BackendError::SessionExpired,
        s if s.is_server_error()
            || s == StatusCode::TOO_MANY_REQUESTS
            || s == StatusCode::REQUEST_TIMEOUT =>
        {
            BackendError::Transient(format!("{s}: {body}"))
        }
        s => BackendError::Unexpected(format!("{s}: {body}")),
    }
}

/// Strip characters that carry meaning in PostgREST filter syntax.
fn sanitize_filter(query: &str) -> String {
    query
        .chars()
        .filter(|c| !matches!(c, '*' | '%' | ',' | '(' | ')' | '.'))
        .collect()
}

impl SupabaseBackend {
    pub fn new(config: SupabaseConfig) -> Self {
        let (tx, _rx) = broadcast::channel(AUTH_EVENT_CAPACITY);
        Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            anon_key: config.anon_key,
            client: reqwest::Client::new(),
            session: RwLock::new(None),
            refreshing: Mutex::new(()),
            tx,
        }
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{path}", self.base_url)
    }

    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.base_url)
    }

    /// Attach the API key and the session bearer (anon key when signed out).
    async fn authorized(&self, builder: RequestBuilder) -> Result<RequestBuilder, BackendError> {
        let bearer = match self.fresh_session().await? {
            Some(session) => session.access_token,
            None => self.anon_key.expose_secret().to_string(),
        };
        Ok(builder
            .header("apikey", self.anon_key.expose_secret())
            .bearer_auth(bearer))
    }

    /// Replace the held session and broadcast the change.
    async fn set_session(&self, stored: Option<StoredSession>) {
        let session = stored.as_ref().map(|s| s.session.clone());
        *self.session.write().await = stored;
        let _ = self.tx.send(AuthEvent { session });
    }

    async fn end_session(&self, reason: &str) {
        warn!(reason, "Ending session");
        self.set_session(None).await;
    }

    /// The held session, refreshed first when its token is about to expire.
    async fn fresh_session(&self) -> Result<Option<Session>, BackendError> {
        let _refreshing = self.refreshing.lock().await;
        let (refresh_token, email) = {
            let held = self.session.read().await;
            let Some(stored) = held.as_ref() else {
                return Ok(None);
            };
            if !stored.needs_refresh(Utc::now()) {
                return Ok(Some(stored.session.clone()));
            }
            (stored.refresh_token.clone(), stored.session.email.clone())
        };

        let Some(refresh_token) = refresh_token else {
            self.end_session("access token expired without a refresh token")
                .await;
            return Err(BackendError::SessionExpired);
        };
        match self.refresh_grant(&refresh_token).await {
            Ok(token) => {
                let stored = StoredSession::from_token(token, &email, Utc::now());
                let session = stored.session.clone();
                // Same identity, so no auth event.
                *self.session.write().await = Some(stored);
                debug!(user_id = %session.user_id, "Access token refreshed");
                Ok(Some(session))
            }
            Err(BackendError::SessionExpired) => {
                self.end_session("refresh token rejected").await;
                Err(BackendError::SessionExpired)
            }
            Err(e) => Err(e),
        }
    }

    async fn refresh_grant(&self, refresh_token: &SecretString) -> Result<TokenResponse, BackendError> {
        let response = self
            .client
            .post(self.auth_url("token"))
            .query(&[("grant_type", "refresh_token")])
            .header("apikey", self.anon_key.expose_secret())
            .json(&serde_json::json!({
                "refresh_token": refresh_token.expose_secret(),
            }))
            .send()
            .await?;

        let status = response.status();
        if status.is_client_error() {
            let body = response.text().await.unwrap_or_default();
            debug!(status = %status, body = %body, "Token refresh refused");
            return Err(BackendError::SessionExpired);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Transient(format!("{status}: {body}")));
        }
        Ok(response.json::<TokenResponse>().await?)
    }

    async fn rows<T: DeserializeOwned>(
        &self,
        response: Response,
        entity: &str,
        id: &str,
    ) -> Result<Vec<T>, BackendError> {
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            let signed_in = self.session.read().await.is_some();
            if signed_in {
                self.end_session("access token rejected").await;
            }
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_row_error(status, body, entity, id));
        }
        Ok(response.json::<Vec<T>>().await?)
    }

    async fn password_grant(&self, credentials: &Credentials) -> Result<TokenResponse, AuthError> {
        let response = self
            .client
            .post(self.auth_url("token"))
            .query(&[("grant_type", "password")])
            .header("apikey", self.anon_key.expose_secret())
            .json(&serde_json::json!({
                "email": credentials.email,
                "password": credentials.password.expose_secret(),
            }))
            .send()
            .await
            .map_err(|e| AuthError::Unknown(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_auth_error(status, &body));
        }
        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| AuthError::Unknown(format!("Invalid token response: {e}")))
    }
}

#[async_trait]
impl IdentityProvider for SupabaseBackend {
    async fn sign_in(&self, credentials: &Credentials) -> Result<Session, AuthError> {
        let token = self.password_grant(credentials).await?;
        let stored = StoredSession::from_token(token, &credentials.email, Utc::now());
        let session = stored.session.clone();
        info!(user_id = %session.user_id, "Signed in");
        self.set_session(Some(stored)).await;
        Ok(session)
    }

    async fn sign_up(&self, credentials: &Credentials) -> Result<Session, AuthError> {
        let response = self
            .client
            .post(self.auth_url("signup"))
            .header("apikey", self.anon_key.expose_secret())
            .json(&serde_json::json!({
                "email": credentials.email,
                "password": credentials.password.expose_secret(),
            }))
            .send()
            .await
            .map_err(|e| AuthError::Unknown(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_auth_error(status, &body));
        }
        let body: SignUpResponse = response
            .json()
            .await
            .map_err(|e| AuthError::Unknown(format!("Invalid signup response: {e}")))?;

        match (body.access_token, body.user) {
            (Some(access_token), Some(user)) => {
                let token = TokenResponse {
                    access_token,
                    refresh_token: body.refresh_token,
                    expires_in: body.expires_in,
                    expires_at: body.expires_at,
                    user,
                };
                let stored = StoredSession::from_token(token, &credentials.email, Utc::now());
                let session = stored.session.clone();
                info!(user_id = %session.user_id, "Account registered");
                self.set_session(Some(stored)).await;
                Ok(session)
            }
            _ => Err(AuthError::Unknown(
                "Account created; confirm the email address before signing in".into(),
            )),
        }
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        let held = self.session.read().await.as_ref().map(|s| s.session.clone());
        let Some(session) = held else {
            return Ok(());
        };
        // The local session is dropped even if the server call fails.
        self.set_session(None).await;

        let response = self
            .client
            .post(self.auth_url("logout"))
            .header("apikey", self.anon_key.expose_secret())
            .bearer_auth(&session.access_token)
            .send()
            .await
            .map_err(|e| AuthError::Unknown(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            warn!(status = %status, "Server-side sign-out failed");
            let body = response.text().await.unwrap_or_default();
            return Err(classify_auth_error(status, &body));
        }
        debug!(user_id = %session.user_id, "Signed out");
        Ok(())
    }

    async fn current_session(&self) -> Option<Session> {
        match self.fresh_session().await {
            Ok(session) => session,
            Err(e) => {
                // An unreachable auth server is not a sign-out; the token may
                // still be accepted.
                debug!(error = %e, "Token refresh deferred");
                self.session.read().await.as_ref().map(|s| s.session.clone())
            }
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.tx.subscribe()
    }
}

#[async_trait]
impl ProfileStore for SupabaseBackend {
    async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>, BackendError> {
        let request = self
            .client
            .get(self.rest_url(PROFILES_TABLE))
            .query(&[("id", format!("eq.{user_id}")), ("select", "*".to_string())]);
        let response = self.authorized(request).await?.send().await?;
        let mut rows: Vec<Profile> = self.rows(response, "profile", user_id).await?;
        Ok(if rows.is_empty() {
            None
        } else {
            Some(rows.swap_remove(0))
        })
    }

    async fn insert_profile(&self, profile: &Profile) -> Result<Profile, BackendError> {
        let request = self
            .client
            .post(self.rest_url(PROFILES_TABLE))
            .header("Prefer", "return=representation")
            .json(profile);
        let response = self.authorized(request).await?.send().await?;
        let rows: Vec<Profile> = self.rows(response, "profile", &profile.id).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| BackendError::Unexpected("insert returned no row".into()))
    }

    async fn update_profile(
        &self,
        user_id: &str,
        patch: &ProfilePatch,
    ) -> Result<Profile, BackendError> {
        let request = self
            .client
            .patch(self.rest_url(PROFILES_TABLE))
            .query(&[("id", format!("eq.{user_id}"))])
            .header("Prefer", "return=representation")
            .json(patch);
        let response = self.authorized(request).await?.send().await?;
        let rows: Vec<Profile> = self.rows(response, "profile", user_id).await?;
        rows.into_iter().next().ok_or_else(|| BackendError::NotFound {
            entity: "profile".into(),
            id: user_id.to_string(),
        })
    }
}

#[async_trait]
impl OrganizationDirectory for SupabaseBackend {
    async fn find_organizations(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<Organization>, BackendError> {
        let pattern = sanitize_filter(query);
        let request = self.client.get(self.rest_url(ORGANIZATIONS_TABLE)).query(&[
            ("select", "id,nombre".to_string()),
            ("nombre", format!("ilike.*{pattern}*")),
            ("order", "nombre.asc".to_string()),
            ("limit", limit.to_string()),
        ]);
        let response = self.authorized(request).await?.send().await?;
        self.rows(response, "organization", query).await
    }
}

#[async_trait]
impl RequestStore for SupabaseBackend {
    async fn list_requests(&self, user_id: &str) -> Result<Vec<Request>, BackendError> {
        let request = self.client.get(self.rest_url(REQUESTS_TABLE)).query(&[
            ("select", "*".to_string()),
            ("colaborador_id", format!("eq.{user_id}")),
            ("order", "created_at.desc".to_string()),
        ]);
        let response = self.authorized(request).await?.send().await?;
        self.rows(response, "request", user_id).await
    }

    async fn append_request(&self, new_request: &NewRequest) -> Result<Request, BackendError> {
        let request = self
            .client
            .post(self.rest_url(REQUESTS_TABLE))
            .header("Prefer", "return=representation")
            .json(new_request);
        let response = self.authorized(request).await?.send().await?;
        let rows: Vec<Request> = self.rows(response, "request", &new_request.user_id).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| BackendError::Unexpected("insert returned no row".into()))
    }
}
