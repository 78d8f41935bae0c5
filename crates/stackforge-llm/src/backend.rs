//! The [`CompletionBackend`] trait — everything the agent asks of an LLM.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::error::LlmResult;
use crate::types::{ApiMessage, CompletionDelta, ToolSpec};

/// Ordered stream of completion deltas.
pub type DeltaStream = Pin<Box<dyn Stream<Item = LlmResult<CompletionDelta>> + Send>>;

/// Completion service boundary.
///
/// Two entry points mirror the two ways the system talks to the model:
/// a streaming conversation call (plan and execution phases) and a
/// one-shot plain-text call (follow-up suggestions).
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Stream a chat completion.
    ///
    /// `tools` selects the tool-augmented execution path; implementations
    /// may route tool-less requests to a faster model.
    async fn stream_chat(
        &self,
        system_prompt: &str,
        messages: Vec<ApiMessage>,
        tools: Option<Vec<ToolSpec>>,
    ) -> LlmResult<DeltaStream>;

    /// One-shot, non-streaming completion returning plain text.
    async fn complete_chat(&self, system_prompt: &str, user_text: &str) -> LlmResult<String>;
}
