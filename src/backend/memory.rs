//! In-memory backend: mock data store used for demos and tests.
//!
//! Implements every collaborator trait over `RwLock`-guarded maps, with an
//! optional simulated network delay. Session changes are fanned out on a
//! broadcast channel like the hosted provider does.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use secrecy::ExposeSecret;
use tokio::sync::{RwLock, broadcast};
use tracing::{debug, info};
use uuid::Uuid;

use super::traits::{
    AuthEvent, Credentials, IdentityProvider, OrganizationDirectory, ProfileStore, RequestStore,
    Session,
};
use crate::error::{AuthError, BackendError};
use crate::profile::{Organization, Profile, ProfilePatch, Role};
use crate::requests::{NewRequest, Request, RequestKind, RequestStatus};

const AUTH_EVENT_CAPACITY: usize = 16;
const MIN_PASSWORD_LEN: usize = 6;

/// Demo account seeded by [`MemoryBackend::seeded`].
pub const DEMO_EMAIL: &str = "colaborador@empresa.com";
pub const DEMO_PASSWORD: &str = "portal123";

struct Account {
    user_id: String,
    password: String,
}

/// Mock backend holding everything in process memory.
pub struct MemoryBackend {
    accounts: RwLock<HashMap<String, Account>>,
    session: RwLock<Option<Session>>,
    profiles: RwLock<HashMap<String, Profile>>,
    organizations: RwLock<Vec<Organization>>,
    requests: RwLock<Vec<Request>>,
    tx: broadcast::Sender<AuthEvent>,
    latency: Duration,
    directory_calls: AtomicUsize,
}

impl MemoryBackend {
    /// Empty backend with no simulated latency.
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(AUTH_EVENT_CAPACITY);
        Self {
            accounts: RwLock::new(HashMap::new()),
            session: RwLock::new(None),
            profiles: RwLock::new(HashMap::new()),
            organizations: RwLock::new(Vec::new()),
            requests: RwLock::new(Vec::new()),
            tx,
            latency: Duration::ZERO,
            directory_calls: AtomicUsize::new(0),
        }
    }

    /// Backend seeded with a demo collaborator, a few organizations and two
    /// past requests.
    pub async fn seeded() -> Self {
        let backend = Self::new();
        for (id, name) in [
            ("org-1", "Disruptive Talent"),
            ("org-2", "Acme Corporación"),
            ("org-3", "Banco Andino"),
            ("org-4", "Constructora Acero"),
            ("org-42", "Talent Hackers"),
        ] {
            backend.add_organization(Organization::new(id, name)).await;
        }

        let user_id = backend.add_account(DEMO_EMAIL, DEMO_PASSWORD).await;
        backend
            .add_profile(Profile {
                id: user_id.clone(),
                email: DEMO_EMAIL.to_string(),
                full_name: "Ana García".to_string(),
                role: Role::Collaborator,
                organization_id: "org-1".to_string(),
                area: Some("Desarrollo de Producto".to_string()),
                job_title: Some("Frontend Lead".to_string()),
                start_date: chrono::NaiveDate::from_ymd_opt(2022, 3, 15),
                id_type: None,
                id_number: None,
                personal_email: None,
                whatsapp_phone: None,
                avatar_url: None,
            })
            .await;

        let mut requests = backend.requests.write().await;
        requests.push(Request {
            id: "102".to_string(),
            user_id: user_id.clone(),
            organization_id: "org-1".to_string(),
            kind: RequestKind::Certificate,
            status: RequestStatus::Pending,
            details: Some("Para trámite bancario".to_string()),
            created_at: Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).single().unwrap_or_default(),
        });
        requests.push(Request {
            id: "101".to_string(),
            user_id,
            organization_id: "org-1".to_string(),
            kind: RequestKind::Reference,
            status: RequestStatus::Completed,
            details: Some("Referencia laboral".to_string()),
            created_at: Utc.with_ymd_and_hms(2023, 11, 10, 0, 0, 0).single().unwrap_or_default(),
        });
        drop(requests);

        backend
    }

    /// Delay every call by `latency`, like a remote service would.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Register an account directly. Returns the new identity.
    pub async fn add_account(&self, email: &str, password: &str) -> String {
        let user_id = format!("user-{}", Uuid::new_v4());
        self.accounts.write().await.insert(
            email.to_lowercase(),
            Account {
                user_id: user_id.clone(),
                password: password.to_string(),
            },
        );
        user_id
    }

    pub async fn add_profile(&self, profile: Profile) {
        self.profiles.write().await.insert(profile.id.clone(), profile);
    }

    pub async fn add_organization(&self, organization: Organization) {
        self.organizations.write().await.push(organization);
    }

    /// Number of profiles stored.
    pub async fn profile_count(&self) -> usize {
        self.profiles.read().await.len()
    }

    /// Number of directory lookups that reached the backend.
    pub fn directory_calls(&self) -> usize {
        self.directory_calls.load(Ordering::SeqCst)
    }

    /// Drop the current session out-of-band, as a token expiry would.
    pub async fn expire_session(&self) {
        let had_session = self.session.write().await.take().is_some();
        if had_session {
            info!("Session expired");
            let _ = self.tx.send(AuthEvent::signed_out());
        }
    }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }

    async fn start_session(&self, user_id: String, email: &str) -> Session {
        let session = Session::new(user_id, email, Uuid::new_v4().to_string());
        *self.session.write().await = Some(session.clone());
        // Broadcast; ok if nobody is subscribed
        let _ = self.tx.send(AuthEvent::signed_in(session.clone()));
        session
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityProvider for MemoryBackend {
    async fn sign_in(&self, credentials: &Credentials) -> Result<Session, AuthError> {
        self.simulate_latency().await;
        let email = credentials.email.to_lowercase();
        let user_id = {
            let accounts = self.accounts.read().await;
            match accounts.get(&email) {
                Some(account) if account.password == credentials.password.expose_secret() => {
                    account.user_id.clone()
                }
                _ => return Err(AuthError::InvalidCredentials),
            }
        };
        debug!(user_id = %user_id, "Signed in");
        Ok(self.start_session(user_id, &email).await)
    }

    async fn sign_up(&self, credentials: &Credentials) -> Result<Session, AuthError> {
        self.simulate_latency().await;
        let email = credentials.email.to_lowercase();
        if !email.contains('@') {
            return Err(AuthError::Unknown("Unable to validate email address".into()));
        }
        if credentials.password.expose_secret().chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::Unknown(format!(
                "Password should be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        if self.accounts.read().await.contains_key(&email) {
            return Err(AuthError::AlreadyRegistered);
        }
        let user_id = self
            .add_account(&email, credentials.password.expose_secret())
            .await;
        info!(user_id = %user_id, "Account registered");
        Ok(self.start_session(user_id, &email).await)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.simulate_latency().await;
        if self.session.write().await.take().is_some() {
            let _ = self.tx.send(AuthEvent::signed_out());
        }
        Ok(())
    }

    async fn current_session(&self) -> Option<Session> {
        self.session.read().await.clone()
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.tx.subscribe()
    }
}

#[async_trait]
impl ProfileStore for MemoryBackend {
    async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>, BackendError> {
        self.simulate_latency().await;
        Ok(self.profiles.read().await.get(user_id).cloned())
    }

    async fn insert_profile(&self, profile: &Profile) -> Result<Profile, BackendError> {
        self.simulate_latency().await;
        let mut profiles = self.profiles.write().await;
        if profiles.contains_key(&profile.id) {
            return Err(BackendError::Conflict {
                entity: "profile".into(),
                id: profile.id.clone(),
            });
        }
        profiles.insert(profile.id.clone(), profile.clone());
        Ok(profile.clone())
    }

    async fn update_profile(
        &self,
        user_id: &str,
        patch: &ProfilePatch,
    ) -> Result<Profile, BackendError> {
        self.simulate_latency().await;
        let mut profiles = self.profiles.write().await;
        let profile = profiles
            .get_mut(user_id)
            .ok_or_else(|| BackendError::NotFound {
                entity: "profile".into(),
                id: user_id.to_string(),
            })?;
        profile.apply(patch);
        Ok(profile.clone())
    }
}

#[async_trait]
impl OrganizationDirectory for MemoryBackend {
    async fn find_organizations(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<Organization>, BackendError> {
        self.directory_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;
        let needle = query.to_lowercase();
        let mut found: Vec<Organization> = self
            .organizations
            .read()
            .await
            .iter()
            .filter(|o| o.name.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.name.cmp(&b.name));
        found.truncate(limit);
        Ok(found)
    }
}

#[async_trait]
impl RequestStore for MemoryBackend {
    async fn list_requests(&self, user_id: &str) -> Result<Vec<Request>, BackendError> {
        self.simulate_latency().await;
        let mut list: Vec<Request> = self
            .requests
            .read()
            .await
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(list)
    }

    async fn append_request(&self, request: &NewRequest) -> Result<Request, BackendError> {
        self.simulate_latency().await;
        let stored = Request {
            id: format!("req-{}", Uuid::new_v4()),
            user_id: request.user_id.clone(),
            organization_id: request.organization_id.clone(),
            kind: request.kind,
            status: request.status,
            details: Some(request.details.clone()),
            created_at: Utc::now(),
        };
        self.requests.write().await.insert(0, stored.clone());
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn demo_account_signs_in() {
        let backend = MemoryBackend::seeded().await;
        let session = backend
            .sign_in(&Credentials::new(DEMO_EMAIL, DEMO_PASSWORD))
            .await
            .unwrap();
        assert_eq!(session.email, DEMO_EMAIL);
        assert_eq!(backend.current_session().await, Some(session));
    }

    #[tokio::test]
    async fn wrong_password_is_invalid_credentials() {
        let backend = MemoryBackend::seeded().await;
        let err = backend
            .sign_in(&Credentials::new(DEMO_EMAIL, "nope"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
        assert!(backend.current_session().await.is_none());
    }

    #[tokio::test]
    async fn unknown_email_is_invalid_credentials() {
        let backend = MemoryBackend::new();
        let err = backend
            .sign_in(&Credentials::new("nadie@empresa.com", "secret1"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn sign_up_rejects_duplicates_and_short_passwords() {
        let backend = MemoryBackend::seeded().await;
        let dup = backend
            .sign_up(&Credentials::new(DEMO_EMAIL, "another1"))
            .await
            .unwrap_err();
        assert!(matches!(dup, AuthError::AlreadyRegistered));

        let short = backend
            .sign_up(&Credentials::new("nuevo@empresa.com", "abc"))
            .await
            .unwrap_err();
        assert!(matches!(short, AuthError::Unknown(_)));
    }

    #[tokio::test]
    async fn sign_in_and_out_are_broadcast() {
        let backend = MemoryBackend::seeded().await;
        let mut rx = backend.subscribe();

        backend
            .sign_in(&Credentials::new(DEMO_EMAIL, DEMO_PASSWORD))
            .await
            .unwrap();
        assert!(rx.recv().await.unwrap().session.is_some());

        backend.sign_out().await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), AuthEvent::signed_out());
    }

    #[tokio::test]
    async fn profile_insert_conflicts_on_second_insert() {
        let backend = MemoryBackend::seeded().await;
        let session = backend
            .sign_in(&Credentials::new(DEMO_EMAIL, DEMO_PASSWORD))
            .await
            .unwrap();
        let existing = backend.get_profile(&session.user_id).await.unwrap().unwrap();
        let err = backend.insert_profile(&existing).await.unwrap_err();
        assert!(matches!(err, BackendError::Conflict { .. }));
    }

    #[tokio::test]
    async fn update_missing_profile_is_not_found() {
        let backend = MemoryBackend::new();
        let patch = ProfilePatch {
            area: Some("RH".into()),
            ..Default::default()
        };
        let err = backend.update_profile("ghost", &patch).await.unwrap_err();
        assert!(matches!(err, BackendError::NotFound { .. }));
    }

    #[tokio::test]
    async fn directory_matches_substring_case_insensitively() {
        let backend = MemoryBackend::seeded().await;
        let found = backend.find_organizations("ACE", 5).await.unwrap();
        let names: Vec<&str> = found.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["Constructora Acero"]);

        let limited = backend.find_organizations("a", 2).await.unwrap();
        assert_eq!(limited.len(), 2);
        assert_eq!(backend.directory_calls(), 2);
    }

    #[tokio::test]
    async fn requests_list_newest_first() {
        let backend = MemoryBackend::seeded().await;
        let session = backend
            .sign_in(&Credentials::new(DEMO_EMAIL, DEMO_PASSWORD))
            .await
            .unwrap();

        let appended = backend
            .append_request(&NewRequest {
                user_id: session.user_id.clone(),
                organization_id: "org-1".into(),
                kind: RequestKind::Inquiry,
                status: RequestStatus::Pending,
                details: "Pregunta sobre nómina".into(),
            })
            .await
            .unwrap();

        let list = backend.list_requests(&session.user_id).await.unwrap();
        assert_eq!(list.len(), 3);
        assert_eq!(list[0].id, appended.id);
        assert_eq!(list[1].id, "102");
        assert_eq!(list[2].id, "101");
    }

    #[tokio::test]
    async fn expire_session_notifies_subscribers() {
        let backend = MemoryBackend::seeded().await;
        backend
            .sign_in(&Credentials::new(DEMO_EMAIL, DEMO_PASSWORD))
            .await
            .unwrap();
        let mut rx = backend.subscribe();
        backend.expire_session().await;
        assert_eq!(rx.recv().await.unwrap(), AuthEvent::signed_out());
        assert!(backend.current_session().await.is_none());
    }
}
