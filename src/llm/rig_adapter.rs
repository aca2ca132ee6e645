//! Bridges rig's `CompletionModel` to [`LlmProvider`].

use async_trait::async_trait;
use rig::agent::AgentBuilder;
use rig::completion::{CompletionModel, Prompt};

use super::provider::{CompletionRequest, CompletionResponse, LlmProvider};
use crate::error::LlmError;

pub struct RigAdapter<M> {
    model: M,
    model_name: String,
    provider: &'static str,
}

impl<M> RigAdapter<M> {
    pub fn new(model: M, model_name: &str, provider: &'static str) -> Self {
        Self {
            model,
            model_name: model_name.to_string(),
            provider,
        }
    }
}

#[async_trait]
impl<M> LlmProvider for RigAdapter<M>
where
    M: CompletionModel + Clone + Send + Sync + 'static,
{
    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let mut builder = AgentBuilder::new(self.model.clone());
        if let Some(preamble) = request.preamble() {
            builder = builder.preamble(&preamble);
        }
        if let Some(temperature) = request.temperature {
            builder = builder.temperature(temperature);
        }
        if let Some(max_tokens) = request.max_tokens {
            builder = builder.max_tokens(max_tokens);
        }
        let agent = builder.build();

        let content = agent
            .prompt(request.prompt())
            .await
            .map_err(|e| LlmError::RequestFailed {
                provider: self.provider.to_string(),
                reason: e.to_string(),
            })?;

        tracing::debug!(
            provider = self.provider,
            model = %self.model_name,
            chars = content.len(),
            "Completion received"
        );
        Ok(CompletionResponse { content })
    }
}
