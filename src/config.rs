//! Configuration types, built from environment variables.

use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;

use crate::backend::SupabaseConfig;
use crate::error::ConfigError;
use crate::llm::{DEFAULT_MODEL, LlmBackend, LlmConfig};

/// Portal shell configuration.
#[derive(Debug, Clone)]
pub struct PortalConfig {
    /// Hosted backend; `None` runs against the seeded in-memory backend.
    pub supabase: Option<SupabaseConfig>,
    /// Advisory provider; `None` leaves the check-in on its static fallback.
    pub llm: Option<LlmConfig>,
    /// Quiet period before a directory search fires.
    pub search_debounce: Duration,
    /// Maximum organizations returned per search.
    pub search_limit: usize,
    /// Upper bound on one advisory generation.
    pub advice_timeout: Duration,
    /// Artificial latency for the in-memory backend.
    pub mock_latency: Duration,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            supabase: None,
            llm: None,
            search_debounce: Duration::from_millis(300),
            search_limit: 5,
            advice_timeout: Duration::from_secs(10),
            mock_latency: Duration::ZERO,
        }
    }
}

impl PortalConfig {
    /// Build config from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let defaults = Self::default();

        let supabase = match (get("SUPABASE_URL"), get("SUPABASE_ANON_KEY")) {
            (Some(url), Some(key)) => Some(SupabaseConfig {
                url,
                anon_key: SecretString::from(key),
            }),
            (None, None) => None,
            (Some(_), None) => {
                return Err(ConfigError::MissingRequired {
                    key: "SUPABASE_ANON_KEY".to_string(),
                    hint: "SUPABASE_URL is set; both are needed for the hosted backend".to_string(),
                });
            }
            (None, Some(_)) => {
                return Err(ConfigError::MissingRequired {
                    key: "SUPABASE_URL".to_string(),
                    hint: "SUPABASE_ANON_KEY is set; both are needed for the hosted backend"
                        .to_string(),
                });
            }
        };

        let backend = match get("PORTAL_LLM_BACKEND") {
            Some(raw) => LlmBackend::from_str(&raw).map_err(|message| ConfigError::InvalidValue {
                key: "PORTAL_LLM_BACKEND".to_string(),
                message,
            })?,
            None => LlmBackend::default(),
        };
        let llm = get("PORTAL_LLM_API_KEY").map(|key| LlmConfig {
            backend,
            api_key: SecretString::from(key),
            model: get("PORTAL_LLM_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        });

        let search_debounce = parse_number::<u64>(&get, "PORTAL_SEARCH_DEBOUNCE_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.search_debounce);
        let search_limit = match parse_number::<usize>(&get, "PORTAL_SEARCH_LIMIT")? {
            Some(0) => {
                return Err(ConfigError::InvalidValue {
                    key: "PORTAL_SEARCH_LIMIT".to_string(),
                    message: "must be at least 1".to_string(),
                });
            }
            Some(limit) => limit,
            None => defaults.search_limit,
        };
        let advice_timeout = parse_number::<u64>(&get, "PORTAL_ADVICE_TIMEOUT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.advice_timeout);
        let mock_latency = parse_number::<u64>(&get, "PORTAL_MOCK_LATENCY_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.mock_latency);

        Ok(Self {
            supabase,
            llm,
            search_debounce,
            search_limit,
            advice_timeout,
            mock_latency,
        })
    }
}

fn parse_number<T>(get: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get(key)
        .map(|raw| {
            raw.parse::<T>().map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("'{raw}': {e}"),
            })
        })
        .transpose()
}
