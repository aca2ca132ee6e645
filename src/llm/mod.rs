//! LLM integration for the advisory text generator.
//!
//! Supports:
//! - **Gemini**: default backend, via rig-core
//! - **Anthropic**: Direct API access via rig-core
//! - **OpenAI**: Direct API access via rig-core
//!
//! `RigAdapter` bridges rig's `CompletionModel` trait to our `LlmProvider`.

pub mod provider;
mod rig_adapter;

pub use provider::{ChatMessage, CompletionRequest, CompletionResponse, LlmProvider};
pub use rig_adapter::RigAdapter;

use std::str::FromStr;
use std::sync::Arc;

use rig::client::CompletionClient;
use secrecy::ExposeSecret;

use crate::error::LlmError;

/// Default model when none is configured.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Supported LLM backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LlmBackend {
    #[default]
    Gemini,
    Anthropic,
    OpenAi,
}

impl LlmBackend {
    pub fn name(self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::Anthropic => "anthropic",
            Self::OpenAi => "openai",
        }
    }
}

impl FromStr for LlmBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" | "google" => Ok(Self::Gemini),
            "anthropic" | "claude" => Ok(Self::Anthropic),
            "openai" => Ok(Self::OpenAi),
            other => Err(format!(
                "unknown backend '{other}' (expected gemini, anthropic or openai)"
            )),
        }
    }
}

/// Configuration for creating an LLM provider.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub backend: LlmBackend,
    pub api_key: secrecy::SecretString,
    pub model: String,
}

/// Create an LLM provider from configuration.
pub fn create_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, LlmError> {
    use rig::providers::{anthropic, gemini, openai};

    let key = config.api_key.expose_secret();
    let model = config.model.as_str();
    let provider = match config.backend {
        LlmBackend::Gemini => {
            let client = gemini::Client::new(key).map_err(|e| client_error(config.backend, e))?;
            adapt(client.completion_model(model), config)
        }
        LlmBackend::Anthropic => {
            let client: rig::client::Client<anthropic::client::AnthropicExt> =
                anthropic::Client::new(key).map_err(|e| client_error(config.backend, e))?;
            adapt(client.completion_model(model), config)
        }
        LlmBackend::OpenAi => {
            let client: rig::client::Client<openai::client::OpenAIResponsesExt> =
                openai::Client::new(key).map_err(|e| client_error(config.backend, e))?;
            adapt(client.completion_model(model), config)
        }
    };
    tracing::info!(backend = config.backend.name(), model = %config.model, "Using LLM provider");
    Ok(provider)
}

fn adapt<M>(model: M, config: &LlmConfig) -> Arc<dyn LlmProvider>
where
    M: rig::completion::CompletionModel + Clone + Send + Sync + 'static,
{
    Arc::new(RigAdapter::new(model, &config.model, config.backend.name()))
}

fn client_error(backend: LlmBackend, e: impl std::fmt::Display) -> LlmError {
    LlmError::RequestFailed {
        provider: backend.name().to_string(),
        reason: format!("Failed to create client: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_parses_names() {
        assert_eq!("Gemini".parse::<LlmBackend>(), Ok(LlmBackend::Gemini));
        assert_eq!(" anthropic ".parse::<LlmBackend>(), Ok(LlmBackend::Anthropic));
        assert_eq!("openai".parse::<LlmBackend>(), Ok(LlmBackend::OpenAi));
        assert!("mistral".parse::<LlmBackend>().is_err());
        assert_eq!(LlmBackend::default(), LlmBackend::Gemini);
    }

    #[test]
    fn gemini_provider_constructs_without_network() {
        // rig-core clients accept any string as API key at construction time.
        let config = LlmConfig {
            backend: LlmBackend::Gemini,
            api_key: secrecy::SecretString::from("test-key"),
            model: DEFAULT_MODEL.to_string(),
        };
        let provider = create_provider(&config).unwrap();
        assert_eq!(provider.model_name(), DEFAULT_MODEL);
    }

    #[test]
    fn anthropic_provider_constructs_without_network() {
        let config = LlmConfig {
            backend: LlmBackend::Anthropic,
            api_key: secrecy::SecretString::from("test-key"),
            model: "claude-3-5-sonnet-latest".to_string(),
        };
        let provider = create_provider(&config).unwrap();
        assert_eq!(provider.model_name(), "claude-3-5-sonnet-latest");
    }

    #[test]
    fn every_backend_builds_through_one_path() {
        for backend in [LlmBackend::Gemini, LlmBackend::Anthropic, LlmBackend::OpenAi] {
            let config = LlmConfig {
                backend,
                api_key: secrecy::SecretString::from("test-key"),
                model: "some-model".to_string(),
            };
            let provider = create_provider(&config).unwrap();
            assert_eq!(provider.model_name(), "some-model");
            assert_eq!(backend.name().parse::<LlmBackend>(), Ok(backend));
        }
    }

    #[test]
    fn client_errors_name_the_backend() {
        let err = client_error(LlmBackend::Anthropic, "bad key");
        assert!(matches!(
            err,
            LlmError::RequestFailed { ref provider, ref reason }
                if provider == "anthropic" && reason.contains("bad key")
        ));
    }
}
