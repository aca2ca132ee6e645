//! Advisory text generation with static fallbacks.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::Mood;
use super::prompts::{COACH_SYSTEM_PROMPT, checkin_prompt};
use crate::llm::{ChatMessage, CompletionRequest, LlmProvider};

/// Shown when no provider is configured.
pub const FALLBACK_UNAVAILABLE: &str =
    "¡Gracias por compartir! (Servicio de IA no disponible temporalmente)";
/// Shown when the provider fails or times out.
pub const FALLBACK_ERROR: &str =
    "Tu bienestar es importante para nosotros. ¡Que tengas un buen día!";
/// Shown when the provider answers with no text.
pub const FALLBACK_EMPTY: &str = "¡Gracias por compartir! Recuerda tomar descansos activos.";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Produces a short supportive message for a check-in. Never fails.
#[async_trait]
pub trait AdvisoryTextGenerator: Send + Sync {
    async fn generate(&self, mood: Mood, display_name: &str) -> String;
}

pub struct MoodCoach {
    llm: Option<Arc<dyn LlmProvider>>,
    timeout: Duration,
}

impl MoodCoach {
    pub fn new(llm: Option<Arc<dyn LlmProvider>>) -> Self {
        Self {
            llm,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn is_available(&self) -> bool {
        self.llm.is_some()
    }
}

#[async_trait]
impl AdvisoryTextGenerator for MoodCoach {
    async fn generate(&self, mood: Mood, display_name: &str) -> String {
        let Some(llm) = &self.llm else {
            debug!(%mood, "No advisory provider configured");
            return FALLBACK_UNAVAILABLE.to_string();
        };

        let request = CompletionRequest::new(vec![
            ChatMessage::system(COACH_SYSTEM_PROMPT),
            ChatMessage::user(checkin_prompt(mood, display_name)),
        ])
        .with_temperature(0.7)
        .with_max_tokens(200);

        match tokio::time::timeout(self.timeout, llm.complete(request)).await {
            Ok(Ok(response)) => {
                let text = response.content.trim();
                if text.is_empty() {
                    warn!(model = llm.model_name(), %mood, "Advisory provider returned empty text");
                    FALLBACK_EMPTY.to_string()
                } else {
                    text.to_string()
                }
            }
            Ok(Err(e)) => {
                warn!(model = llm.model_name(), %mood, error = %e, "Advisory generation failed");
                FALLBACK_ERROR.to_string()
            }
            Err(_) => {
                warn!(
                    model = llm.model_name(),
                    %mood,
                    timeout_secs = self.timeout.as_secs(),
                    "Advisory generation timed out"
                );
                FALLBACK_ERROR.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::error::LlmError;
    use crate::llm::CompletionResponse;

    enum Reply {
        Text(&'static str),
        Fail,
        Hang,
    }

    /// Stub LLM that answers with a fixed reply and records prompts.
    struct StubLlm {
        reply: Reply,
        prompts: Mutex<Vec<String>>,
    }

    impl StubLlm {
        fn new(reply: Reply) -> Arc<Self> {
            Arc::new(Self {
                reply,
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LlmProvider for StubLlm {
        fn model_name(&self) -> &str {
            "stub"
        }

        async fn complete(
            &self,
            request: CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            self.prompts.lock().unwrap().push(request.prompt());
            match self.reply {
                Reply::Text(text) => Ok(CompletionResponse {
                    content: text.to_string(),
                }),
                Reply::Fail => Err(LlmError::RequestFailed {
                    provider: "stub".into(),
                    reason: "quota exceeded".into(),
                }),
                Reply::Hang => {
                    std::future::pending::<()>().await;
                    unreachable!()
                }
            }
        }
    }

    #[tokio::test]
    async fn missing_provider_uses_unavailable_fallback() {
        let coach = MoodCoach::new(None);
        assert!(!coach.is_available());
        assert_eq!(coach.generate(Mood::Happy, "Ana").await, FALLBACK_UNAVAILABLE);
    }

    #[tokio::test]
    async fn provider_text_is_returned_trimmed() {
        let stub = StubLlm::new(Reply::Text("  ¡Qué buena energía, Ana! Sigue así.\n"));
        let coach = MoodCoach::new(Some(stub.clone()));
        let text = coach.generate(Mood::Happy, "Ana").await;
        assert_eq!(text, "¡Qué buena energía, Ana! Sigue así.");

        let prompts = stub.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Ana"));
        assert!(prompts[0].contains("Feliz"));
    }

    #[tokio::test]
    async fn empty_text_uses_empty_fallback() {
        let coach = MoodCoach::new(Some(StubLlm::new(Reply::Text("   "))));
        assert_eq!(coach.generate(Mood::Neutral, "Ana").await, FALLBACK_EMPTY);
    }

    #[tokio::test]
    async fn provider_error_uses_error_fallback() {
        let coach = MoodCoach::new(Some(StubLlm::new(Reply::Fail)));
        assert_eq!(coach.generate(Mood::Stressed, "Ana").await, FALLBACK_ERROR);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_provider_times_out_to_error_fallback() {
        let coach = MoodCoach::new(Some(StubLlm::new(Reply::Hang)))
            .with_timeout(Duration::from_secs(2));
        assert_eq!(coach.generate(Mood::Stressed, "Ana").await, FALLBACK_ERROR);
    }
}
