//! Derived UI mode.
//!
//! The mode is never tracked incrementally. It is recomputed from two facts,
//! whether a session exists and whether that session has a profile, so it
//! cannot drift from backend truth.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::backend::Session;
use crate::profile::Profile;

/// The three mutually exclusive states of the portal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    #[default]
    Unauthenticated,
    NeedsOnboarding,
    Authenticated,
}

impl Mode {
    pub const ALL: [Mode; 3] = [
        Self::Unauthenticated,
        Self::NeedsOnboarding,
        Self::Authenticated,
    ];

    /// The whole state machine.
    pub fn derive(has_session: bool, has_profile: bool) -> Self {
        match (has_session, has_profile) {
            (false, _) => Self::Unauthenticated,
            (true, false) => Self::NeedsOnboarding,
            (true, true) => Self::Authenticated,
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Unauthenticated => "unauthenticated",
            Self::NeedsOnboarding => "needs_onboarding",
            Self::Authenticated => "authenticated",
        };
        write!(f, "{s}")
    }
}

/// Everything the gate holds: the mode plus the records it was derived from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GateSnapshot {
    pub mode: Mode,
    pub session: Option<Session>,
    /// Active user record; present exactly when `mode` is `Authenticated`.
    pub profile: Option<Profile>,
}

impl GateSnapshot {
    pub fn unauthenticated() -> Self {
        Self::default()
    }

    /// Build a consistent snapshot from backend facts.
    ///
    /// A profile is only accepted for the session it is keyed by; a
    /// mismatched one counts as absent.
    pub fn derive(session: Option<Session>, profile: Option<Profile>) -> Self {
        let profile = match (&session, profile) {
            (Some(s), Some(p)) if p.id == s.user_id => Some(p),
            (Some(s), Some(p)) => {
                warn!(
                    session_user = %s.user_id,
                    profile_id = %p.id,
                    "Profile does not belong to the session, ignoring it"
                );
                None
            }
            _ => None,
        };
        let mode = Mode::derive(session.is_some(), profile.is_some());
        Self {
            mode,
            session,
            profile,
        }
    }

    /// Identity the snapshot belongs to, if any.
    pub fn user_id(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.user_id.as_str())
    }
}
