use std::time::Duration;

use async_trait::async_trait;

use crate::config::LlmConfig;
use crate::errors::{DeskPilotError, DeskPilotResult};
use crate::llm::provider::LlmProvider;
use crate::llm::types::{GenerateRequest, GenerateResponse, TagsResponse};

/// Client for a local Ollama-style server (`/api/generate`, `/api/tags`).
pub struct OllamaProvider {
    id: String,
    api_base: String,
    client: reqwest::Client,
}

impl OllamaProvider {
    pub fn new(api_base: impl Into<String>, timeout: Duration) -> DeskPilotResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            id: "ollama".to_string(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn from_config(config: &LlmConfig) -> DeskPilotResult<Self> {
        Self::new(
            config.api_base.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Names of the models installed on the server.
    pub async fn list_models(&self) -> DeskPilotResult<Vec<String>> {
        let url = format!("{}/api/tags", self.api_base);
        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let err_body = response.text().await.unwrap_or_default();
            return Err(DeskPilotError::LlmProvider(format!("{}: {}", status, err_body)));
        }

        let tags: TagsResponse = response.json().await?;
        let names: Vec<String> = tags.models.into_iter().map(|m| m.name).collect();
        tracing::info!(provider = %self.id, models = names.len(), "model list received");
        Ok(names)
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn name(&self) -> &str {
        &self.id
    }

    async fn generate(&self, request: GenerateRequest) -> DeskPilotResult<String> {
        let url = format!("{}/api/generate", self.api_base);

        tracing::debug!(
            provider = %self.id,
            model = %request.model,
            prompt_len = request.prompt.len(),
            images = request.images.len(),
            "sending generate request"
        );
        tracing::trace!(prompt = %request.prompt, "generate prompt (images omitted)");

        let response = self.client.post(&url).json(&request).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let err_body = response.text().await.unwrap_or_default();
            return Err(DeskPilotError::LlmProvider(format!("{}: {}", status, err_body)));
        }

        let body: GenerateResponse = response.json().await?;

        tracing::info!(
            provider = %self.id,
            content_len = body.response.len(),
            done = body.done,
            "generate response received"
        );

        Ok(body.response)
    }
}
