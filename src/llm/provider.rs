use async_trait::async_trait;

use crate::errors::DeskPilotResult;
use crate::llm::types::GenerateRequest;

/// Text-generation endpoint used by the planner.
/// Implementations return the raw reply text; parsing happens in the planner.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Identifier used in logs.
    fn name(&self) -> &str;

    async fn generate(&self, request: GenerateRequest) -> DeskPilotResult<String>;
}
