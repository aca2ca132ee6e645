//! Error types for the portal core.

use std::time::Duration;

/// Error returned by every gate and service operation.
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("No active session")]
    Unauthenticated,

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),
}

impl GateError {
    /// Shorthand for a client-side precondition violation.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Stable, machine-readable kind used by the shell and in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Auth(AuthError::InvalidCredentials) => "invalid_credentials",
            Self::Auth(AuthError::AlreadyRegistered) => "already_registered",
            Self::Auth(AuthError::Unknown(_)) => "auth_unknown",
            Self::Validation(_) => "validation",
            Self::Unauthenticated => "unauthenticated",
            Self::Backend(BackendError::NotFound { .. }) => "not_found",
            Self::Backend(BackendError::Conflict { .. }) => "conflict",
            Self::Backend(BackendError::Transient(_)) => "transient",
            Self::Backend(BackendError::Unexpected(_)) => "unexpected",
            Self::Backend(BackendError::SessionExpired) => "session_expired",
        }
    }
}

/// Identity Provider errors.
///
/// Invalid credentials are kept apart from everything else so the UI can
/// tell the user they are not registered instead of showing a generic failure.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid login credentials")]
    InvalidCredentials,

    #[error("User already registered")]
    AlreadyRegistered,

    #[error("Authentication failed: {0}")]
    Unknown(String),
}

/// Row storage and search errors.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Conflict: {entity} with id {id} already exists")]
    Conflict { entity: String, id: String },

    #[error("Backend unavailable: {0}")]
    Transient(String),

    #[error("Unexpected backend response: {0}")]
    Unexpected(String),

    /// The access token was rejected and could not be refreshed. The
    /// session has been ended.
    #[error("Session expired, sign in again")]
    SessionExpired,
}

impl BackendError {
    /// Whether a read that failed with this error may be attempted again.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Unexpected(e.to_string())
        } else {
            Self::Transient(e.to_string())
        }
    }
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} timed out after {timeout:?}")]
    Timeout { provider: String, timeout: Duration },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },
}

/// Result type alias for gate operations.
pub type Result<T> = std::result::Result<T, GateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_distinguish_invalid_credentials_from_unknown() {
        let invalid = GateError::from(AuthError::InvalidCredentials);
        let unknown = GateError::from(AuthError::Unknown("502".into()));
        assert_eq!(invalid.kind(), "invalid_credentials");
        assert_eq!(unknown.kind(), "auth_unknown");
    }

    #[test]
    fn only_transient_errors_are_retryable() {
        assert!(BackendError::Transient("timeout".into()).is_transient());
        assert!(!BackendError::Unexpected("bad json".into()).is_transient());
        assert!(!BackendError::SessionExpired.is_transient());
        assert!(
            !BackendError::Conflict {
                entity: "profile".into(),
                id: "u1".into()
            }
            .is_transient()
        );
    }

    #[test]
    fn expired_session_has_its_own_kind() {
        let err = GateError::from(BackendError::SessionExpired);
        assert_eq!(err.kind(), "session_expired");
    }

    #[test]
    fn display_includes_context() {
        let err = GateError::from(BackendError::NotFound {
            entity: "profile".into(),
            id: "user-1".into(),
        });
        assert_eq!(
            err.to_string(),
            "Backend error: Entity not found: profile with id user-1"
        );
    }
}
