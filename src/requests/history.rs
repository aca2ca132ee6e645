//! Request history for the active collaborator.
//!
//! Append-only: a successful submission is prepended to the local list
//! without reloading. Nothing is queued or retried; a failed write is
//! returned to the caller and leaves the list as it was.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{info, warn};

use super::model::{NewRequest, Request, RequestKind, RequestStatus};
use crate::backend::RequestStore;
use crate::backend::retry::read_with_retry;
use crate::error::{GateError, Result};
use crate::gate::SessionGate;
use crate::profile::Profile;

#[derive(Default)]
struct LocalHistory {
    owner: Option<String>,
    items: Vec<Request>,
}

/// Request list and submission form state.
pub struct RequestHistory {
    gate: Arc<SessionGate>,
    store: Arc<dyn RequestStore>,
    local: RwLock<LocalHistory>,
}

impl RequestHistory {
    pub fn new(gate: Arc<SessionGate>, store: Arc<dyn RequestStore>) -> Self {
        Self {
            gate,
            store,
            local: RwLock::new(LocalHistory::default()),
        }
    }

    fn active_profile(&self) -> Result<Profile> {
        self.gate.active_profile().ok_or(GateError::Unauthenticated)
    }

    /// Fetch the active user's requests, newest first.
    pub async fn load(&self) -> Result<Vec<Request>> {
        let profile = self.active_profile()?;
        let items = read_with_retry("list_requests", || self.store.list_requests(&profile.id))
            .await
            .map_err(|e| {
                warn!(user_id = %profile.id, error = %e, "Failed to load requests");
                GateError::from(e)
            })?;

        let mut local = self.local.write().await;
        local.owner = Some(profile.id);
        local.items = items.clone();
        Ok(items)
    }

    /// Submit a new request and prepend it to the local list.
    pub async fn submit(&self, kind: RequestKind, details: &str) -> Result<Request> {
        let details = details.trim();
        if details.is_empty() {
            return Err(GateError::validation("request details are required"));
        }
        let profile = self.active_profile()?;

        let new_request = NewRequest {
            user_id: profile.id.clone(),
            organization_id: profile.organization_id.clone(),
            kind,
            status: RequestStatus::Pending,
            details: details.to_string(),
        };
        let stored = self.store.append_request(&new_request).await.map_err(|e| {
            warn!(user_id = %profile.id, kind = %kind, error = %e, "Request submission failed");
            GateError::from(e)
        })?;
        info!(user_id = %profile.id, request_id = %stored.id, kind = %kind, "Request submitted");

        let mut local = self.local.write().await;
        if local.owner.as_deref() != Some(profile.id.as_str()) {
            local.owner = Some(profile.id);
            local.items.clear();
        }
        local.items.insert(0, stored.clone());
        Ok(stored)
    }

    /// Requests held locally for the active user.
    pub async fn items(&self) -> Vec<Request> {
        let local = self.local.read().await;
        match self.gate.active_profile() {
            Some(profile) if local.owner.as_deref() == Some(profile.id.as_str()) => {
                local.items.clone()
            }
            _ => Vec::new(),
        }
    }
}
