//! Collaborator traits: the seams between the portal core and whatever
//! hosts authentication, rows and search.

use async_trait::async_trait;
use secrecy::SecretString;
use tokio::sync::broadcast;

use crate::error::{AuthError, BackendError};
use crate::profile::{Organization, Profile, ProfilePatch};
use crate::requests::{NewRequest, Request};

/// Proof of authentication issued by the Identity Provider.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    /// Identity the profile is keyed by.
    pub user_id: String,
    pub email: String,
    /// Bearer token for the hosted backend. Never logged.
    pub access_token: String,
}

impl Session {
    pub fn new(
        user_id: impl Into<String>,
        email: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            email: email.into(),
            access_token: access_token.into(),
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("user_id", &self.user_id)
            .field("email", &self.email)
            .field("access_token", &"[REDACTED]")
            .finish()
    }
}

/// Login or registration input.
#[derive(Debug)]
pub struct Credentials {
    pub email: String,
    pub password: SecretString,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into().trim().to_string(),
            password: SecretString::from(password.into()),
        }
    }
}

/// Session change notification from the Identity Provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthEvent {
    pub session: Option<Session>,
}

impl AuthEvent {
    pub fn signed_in(session: Session) -> Self {
        Self {
            session: Some(session),
        }
    }

    pub fn signed_out() -> Self {
        Self { session: None }
    }
}

/// Issues and tracks sessions.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Password sign-in.
    async fn sign_in(&self, credentials: &Credentials) -> Result<Session, AuthError>;

    /// Register a new identity and sign it in.
    async fn sign_up(&self, credentials: &Credentials) -> Result<Session, AuthError>;

    /// End the current session.
    async fn sign_out(&self) -> Result<(), AuthError>;

    /// The session currently held, if any.
    async fn current_session(&self) -> Option<Session>;

    /// Stream of session changes, including out-of-band ones (expiry,
    /// sign-out elsewhere).
    fn subscribe(&self) -> broadcast::Receiver<AuthEvent>;
}

/// Profile rows keyed by session identity.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Look up a profile. `Ok(None)` is a normal outcome, not an error.
    async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>, BackendError>;

    /// Insert a profile. Fails with `Conflict` if one already exists.
    async fn insert_profile(&self, profile: &Profile) -> Result<Profile, BackendError>;

    /// Apply a partial update. Fails with `NotFound` if there is no profile.
    async fn update_profile(
        &self,
        user_id: &str,
        patch: &ProfilePatch,
    ) -> Result<Profile, BackendError>;
}

/// Substring lookup over the organization directory.
#[async_trait]
pub trait OrganizationDirectory: Send + Sync {
    /// Case-insensitive match on the organization name, ordered by name.
    async fn find_organizations(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<Organization>, BackendError>;
}

/// Per-user HR request collection.
#[async_trait]
pub trait RequestStore: Send + Sync {
    /// All requests of a user, newest first.
    async fn list_requests(&self, user_id: &str) -> Result<Vec<Request>, BackendError>;

    /// Append a request and return the stored row.
    async fn append_request(&self, request: &NewRequest) -> Result<Request, BackendError>;
}
