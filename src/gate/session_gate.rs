//! SessionGate: the single source of truth for the portal mode.
//!
//! Holds the latest [`GateSnapshot`] in a `watch` channel so the mode can be
//! read synchronously and observed by the shell. Every state change carries
//! a sequence number: a resync publishes its result only if nothing newer
//! (another resync, a logout, an out-of-band sign-out) was issued while its
//! lookups were in flight. A superseded resync waits for the newer change
//! to settle and returns that result instead of its own stale one.

use std::sync::{Arc, Mutex, PoisonError, Weak};

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::guard::{self, GuardDecision, Route};
use super::mode::{GateSnapshot, Mode};
use crate::backend::retry::read_with_retry;
use crate::backend::{AuthEvent, Credentials, IdentityProvider, ProfileStore, Session};
use crate::error::{GateError, Result};
use crate::profile::{Profile, ProfileDraft, ProfilePatch};

/// Derives the portal mode from the identity provider and profile store.
pub struct SessionGate {
    identity: Arc<dyn IdentityProvider>,
    profiles: Arc<dyn ProfileStore>,
    /// Last issued sequence number. Publishing happens under this lock.
    issued: Mutex<u64>,
    /// Highest sequence number whose outcome is final.
    settled: watch::Sender<u64>,
    state: watch::Sender<GateSnapshot>,
}

impl SessionGate {
    pub fn new(identity: Arc<dyn IdentityProvider>, profiles: Arc<dyn ProfileStore>) -> Arc<Self> {
        let (state, _rx) = watch::channel(GateSnapshot::unauthenticated());
        let (settled, _rx) = watch::channel(0);
        Arc::new(Self {
            identity,
            profiles,
            issued: Mutex::new(0),
            settled,
            state,
        })
    }

    // ── State access ────────────────────────────────────────────────

    pub fn mode(&self) -> Mode {
        self.state.borrow().mode
    }

    pub fn snapshot(&self) -> GateSnapshot {
        self.state.borrow().clone()
    }

    /// The active user record, present only when authenticated.
    pub fn active_profile(&self) -> Option<Profile> {
        self.state.borrow().profile.clone()
    }

    /// Receiver notified on every published change.
    pub fn watch(&self) -> watch::Receiver<GateSnapshot> {
        self.state.subscribe()
    }

    /// Evaluate the route guard for `location` in the current mode.
    pub fn navigate(&self, location: &str) -> GuardDecision {
        let route = Route::parse(location);
        let decision = guard::evaluate(&route, self.mode());
        debug!(path = %location, mode = %self.mode(), decision = ?decision, "Route guard");
        decision
    }

    /// The route finally shown for `location` after following redirects.
    pub fn resolve(&self, location: &str) -> Route {
        guard::resolve(location, self.mode())
    }

    // ── Sequencing ──────────────────────────────────────────────────

    fn lock_issued(&self) -> std::sync::MutexGuard<'_, u64> {
        self.issued.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_seq(&self) -> u64 {
        let mut issued = self.lock_issued();
        *issued += 1;
        *issued
    }

    /// Publish `snapshot` if `seq` is still the latest issued number.
    fn publish(&self, seq: u64, snapshot: GateSnapshot) -> bool {
        let issued = self.lock_issued();
        if *issued != seq {
            debug!(seq, latest = *issued, "Discarding superseded resync result");
            return false;
        }
        let mode = snapshot.mode;
        let previous = self.state.send_replace(snapshot);
        if previous.mode != mode {
            info!(seq, from = %previous.mode, to = %mode, "Mode changed");
        }
        true
    }

    /// Supersede everything in flight and drop to `Unauthenticated`.
    fn force_unauthenticated(&self, reason: &str) {
        let mut issued = self.lock_issued();
        *issued += 1;
        let previous = self.state.send_replace(GateSnapshot::unauthenticated());
        if previous.mode != Mode::Unauthenticated {
            info!(seq = *issued, reason, from = %previous.mode, "Mode changed to unauthenticated");
        }
        mark_settled(&self.settled, *issued);
    }

    /// Wait until the latest issued change has settled, then read the state.
    async fn latest_snapshot(&self) -> GateSnapshot {
        let target = *self.lock_issued();
        let mut settled = self.settled.subscribe();
        if settled.wait_for(|seq| *seq >= target).await.is_err() {
            debug!(target, "Settle channel closed");
        }
        self.snapshot()
    }

    // ── Operations ──────────────────────────────────────────────────

    /// Re-derive the mode from the current session and profile.
    ///
    /// A failed profile lookup keeps the previous mode for the same identity;
    /// it never promotes to `Authenticated`. When a newer change is issued
    /// while this one is in flight, the returned snapshot is the newer one.
    pub async fn resync(&self) -> GateSnapshot {
        let seq = self.next_seq();
        {
            // Settles on drop, so a cancelled resync never leaves waiters behind.
            let _settle = SettleOnDrop {
                settled: &self.settled,
                seq,
            };
            self.derive(seq).await;
        }
        self.latest_snapshot().await
    }

    async fn derive(&self, seq: u64) {
        let Some(session) = self.identity.current_session().await else {
            self.publish(seq, GateSnapshot::unauthenticated());
            return;
        };

        let user_id = session.user_id.clone();
        let lookup = read_with_retry("get_profile", || self.profiles.get_profile(&user_id)).await;

        match lookup {
            Ok(profile) => {
                self.publish(seq, GateSnapshot::derive(Some(session), profile));
            }
            Err(e) => {
                let current = self.snapshot();
                if current.user_id().is_some_and(|id| id != user_id) {
                    // The held state belongs to someone else; keeping it would
                    // expose their profile.
                    warn!(seq, user_id = %user_id, error = %e, "Profile lookup failed for a new identity");
                    self.publish(seq, GateSnapshot::unauthenticated());
                } else {
                    warn!(
                        seq,
                        user_id = %user_id,
                        mode = %current.mode,
                        error = %e,
                        "Profile lookup failed, keeping current mode"
                    );
                }
            }
        }
    }

    /// React to a session change reported by the identity provider.
    pub async fn on_auth_changed(&self, event: AuthEvent) -> GateSnapshot {
        match event.session {
            None => {
                self.force_unauthenticated("session ended");
                self.snapshot()
            }
            Some(session) => {
                debug!(user_id = %session.user_id, "Session changed, resyncing");
                self.resync().await
            }
        }
    }

    /// Password sign-in followed by a resync.
    pub async fn login(&self, credentials: &Credentials) -> Result<GateSnapshot> {
        let session = self.identity.sign_in(credentials).await.map_err(|e| {
            warn!(error = %e, "Sign-in failed");
            GateError::from(e)
        })?;
        info!(user_id = %session.user_id, "Signed in");
        Ok(self.resync().await)
    }

    /// Register a new identity; it resolves to `NeedsOnboarding`.
    pub async fn register(&self, credentials: &Credentials) -> Result<GateSnapshot> {
        let session = self.identity.sign_up(credentials).await.map_err(|e| {
            warn!(error = %e, "Registration failed");
            GateError::from(e)
        })?;
        info!(user_id = %session.user_id, "Registered");
        Ok(self.resync().await)
    }

    /// Drop to `Unauthenticated` at once, then tell the provider.
    pub async fn logout(&self) {
        self.force_unauthenticated("logout");
        if let Err(e) = self.identity.sign_out().await {
            warn!(error = %e, "Provider sign-out failed");
        }
    }

    /// Create the profile for the current session and resync.
    pub async fn complete_onboarding(&self, draft: ProfileDraft) -> Result<GateSnapshot> {
        draft.validate()?;

        let session = self.require_session().await?;
        match self.mode() {
            Mode::NeedsOnboarding => {}
            Mode::Authenticated => {
                return Err(GateError::validation("profile already completed"));
            }
            Mode::Unauthenticated => return Err(GateError::Unauthenticated),
        }

        let profile = Profile::from_draft(&session, draft);
        self.profiles.insert_profile(&profile).await.map_err(|e| {
            warn!(user_id = %session.user_id, error = %e, "Profile insert failed");
            GateError::from(e)
        })?;
        info!(
            user_id = %session.user_id,
            organization_id = %profile.organization_id,
            "Onboarding completed"
        );
        Ok(self.resync().await)
    }

    /// Apply a partial profile update and refresh the active record.
    pub async fn update_profile(&self, patch: &ProfilePatch) -> Result<Profile> {
        let current = self.snapshot();
        let user_id = match (current.mode, current.profile) {
            (Mode::Authenticated, Some(profile)) => profile.id,
            _ => return Err(GateError::Unauthenticated),
        };
        patch.validate()?;

        let updated = self
            .profiles
            .update_profile(&user_id, patch)
            .await
            .map_err(|e| {
                warn!(user_id = %user_id, error = %e, "Profile update failed");
                GateError::from(e)
            })?;

        let mut issued = self.lock_issued();
        // Resyncs that read before this write must not land afterwards.
        *issued += 1;
        self.state.send_if_modified(|snapshot| {
            if snapshot.mode == Mode::Authenticated && snapshot.user_id() == Some(updated.id.as_str()) {
                snapshot.profile = Some(updated.clone());
                true
            } else {
                false
            }
        });
        mark_settled(&self.settled, *issued);
        drop(issued);

        info!(user_id = %user_id, "Profile updated");
        Ok(updated)
    }

    async fn require_session(&self) -> Result<Session> {
        self.identity
            .current_session()
            .await
            .ok_or(GateError::Unauthenticated)
    }

    // ── Subscription ────────────────────────────────────────────────

    /// Start forwarding identity provider changes to this gate.
    ///
    /// The returned guard stops forwarding when dropped. The task only holds
    /// a weak reference, so it also ends once the gate is gone.
    pub fn attach(self: &Arc<Self>) -> AuthSubscription {
        let mut rx = self.identity.subscribe();
        let gate: Weak<SessionGate> = Arc::downgrade(self);

        let handle = tokio::spawn(async move {
            loop {
                let event = match rx.recv().await {
                    Ok(event) => Some(event),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Auth events lagged, resyncing");
                        None
                    }
                    Err(RecvError::Closed) => break,
                };
                let Some(gate) = gate.upgrade() else {
                    break;
                };
                match event {
                    Some(event) => {
                        gate.on_auth_changed(event).await;
                    }
                    None => {
                        gate.resync().await;
                    }
                }
            }
            debug!("Auth subscription ended");
        });

        AuthSubscription {
            handle: Some(handle),
        }
    }
}

fn mark_settled(settled: &watch::Sender<u64>, seq: u64) {
    settled.send_if_modified(|current| {
        if seq > *current {
            *current = seq;
            true
        } else {
            false
        }
    });
}

struct SettleOnDrop<'a> {
    settled: &'a watch::Sender<u64>,
    seq: u64,
}

impl Drop for SettleOnDrop<'_> {
    fn drop(&mut self) {
        mark_settled(self.settled, self.seq);
    }
}

/// Guard for the auth change subscription.
pub struct AuthSubscription {
    handle: Option<JoinHandle<()>>,
}

impl AuthSubscription {
    /// Stop forwarding auth changes.
    pub fn release(mut self) {
        self.stop();
    }

    /// Whether the forwarding task has ended.
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(|h| h.is_finished())
    }

    fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for AuthSubscription {
    fn drop(&mut self) {
        self.stop();
    }
}
