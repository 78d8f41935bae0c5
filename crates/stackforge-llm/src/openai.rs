//! OpenAI-compatible backend over SSE.
//!
//! Speaks the `/chat/completions` wire protocol, so it also covers the many
//! providers exposing that shape. Streaming responses arrive as SSE `data:`
//! lines terminated by a literal `[DONE]`.

use async_stream::try_stream;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, error, instrument};

use stackforge_core::messages::Role;

use crate::backend::{CompletionBackend, DeltaStream};
use crate::error::{LlmError, LlmResult};
use crate::types::{ApiMessage, CompletionDelta, FinishReason, ToolCallDelta, ToolSpec};

/// Default API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Backend configuration.
#[derive(Clone, Debug)]
pub struct OpenAiConfig {
    /// Bearer token.
    pub api_key: String,
    /// API base URL (no trailing slash).
    pub base_url: String,
    /// Model for tool-augmented execution streams.
    pub model: String,
    /// Model for plan streams and one-shot completions.
    pub fast_model: String,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: "gpt-4.1".to_string(),
            fast_model: "gpt-4.1-mini".to_string(),
        }
    }
}

/// OpenAI-compatible completion backend.
pub struct OpenAiBackend {
    config: OpenAiConfig,
    client: reqwest::Client,
}

impl OpenAiBackend {
    /// Create a backend with its own HTTP client.
    #[must_use]
    pub fn new(config: OpenAiConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    /// Create a backend with a shared HTTP client.
    #[must_use]
    pub fn with_client(config: OpenAiConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    fn build_messages(system_prompt: &str, messages: Vec<ApiMessage>) -> Vec<ApiMessage> {
        let mut all = Vec::with_capacity(messages.len() + 1);
        all.push(ApiMessage::text(Role::System, system_prompt));
        all.extend(messages);
        all
    }

    async fn post_completions(&self, body: &Value) -> LlmResult<reqwest::Response> {
        let url = format!("{}/chat/completions", self.config.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            error!(status = status.as_u16(), "completion API error");
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response)
    }
}

#[async_trait::async_trait]
impl CompletionBackend for OpenAiBackend {
    #[instrument(skip_all, fields(has_tools = tools.is_some()))]
    async fn stream_chat(
        &self,
        system_prompt: &str,
        messages: Vec<ApiMessage>,
        tools: Option<Vec<ToolSpec>>,
    ) -> LlmResult<DeltaStream> {
        // Tool-less streams are plan-phase traffic and take the fast model.
        let model = if tools.is_some() {
            &self.config.model
        } else {
            &self.config.fast_model
        };
        let mut body = json!({
            "model": model,
            "messages": Self::build_messages(system_prompt, messages),
            "stream": true,
        });
        if let Some(tools) = &tools {
            body["tools"] = Value::Array(tools.iter().map(ToolSpec::to_wire).collect());
        }

        debug!(model = %model, "starting completion stream");
        let response = self.post_completions(&body).await?;
        let mut events = response.bytes_stream().eventsource();

        let stream = try_stream! {
            while let Some(event) = events.next().await {
                let event = event.map_err(|e| LlmError::Stream(e.to_string()))?;
                if event.data == "[DONE]" {
                    break;
                }
                let chunk: ChatCompletionChunk = serde_json::from_str(&event.data)?;
                for delta in chunk_to_deltas(chunk) {
                    yield delta;
                }
            }
        };
        Ok(Box::pin(stream) as DeltaStream)
    }

    #[instrument(skip_all)]
    async fn complete_chat(&self, system_prompt: &str, user_text: &str) -> LlmResult<String> {
        let body = json!({
            "model": self.config.fast_model,
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": user_text},
            ],
        });
        let response = self.post_completions(&body).await?;
        let parsed: ChatCompletionResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(LlmError::EmptyResponse)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Wire types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ChatCompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
    #[serde(default)]
    finish_reason: Option<FinishReason>,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCallChunk>>,
}

#[derive(Debug, Deserialize)]
struct ToolCallChunk {
    index: usize,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<FunctionChunk>,
}

#[derive(Debug, Default, Deserialize)]
struct FunctionChunk {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ResponseChoice>,
}

#[derive(Debug, Deserialize)]
struct ResponseChoice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Flatten one wire chunk into ordered deltas: tool fragments first, then
/// text, then the finish reason — so a terminal chunk that also carries
/// content never reorders ahead of it.
fn chunk_to_deltas(chunk: ChatCompletionChunk) -> Vec<CompletionDelta> {
    let Some(choice) = chunk.choices.into_iter().next() else {
        return Vec::new();
    };
    let mut deltas = Vec::new();
    if let Some(tool_calls) = choice.delta.tool_calls {
        for tc in tool_calls {
            let function = tc.function.unwrap_or_default();
            deltas.push(CompletionDelta {
                tool_call_delta: Some(ToolCallDelta {
                    index: tc.index,
                    id: tc.id,
                    name: function.name,
                    arguments: function.arguments,
                }),
                ..CompletionDelta::default()
            });
        }
    }
    if let Some(content) = choice.delta.content {
        deltas.push(CompletionDelta::text(content));
    }
    if let Some(reason) = choice.finish_reason {
        deltas.push(CompletionDelta::finish(reason));
    }
    deltas
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use futures::TryStreamExt;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn parse_chunk(data: &str) -> ChatCompletionChunk {
        serde_json::from_str(data).unwrap()
    }

    // ── chunk decoding ───────────────────────────────────────────────────

    #[test]
    fn text_chunk_decodes() {
        let chunk = parse_chunk(r#"{"choices":[{"delta":{"content":"Hel"},"index":0}]}"#);
        let deltas = chunk_to_deltas(chunk);
        assert_eq!(deltas.len(), 1);
        assert_eq!(deltas[0].text_delta.as_deref(), Some("Hel"));
    }

    #[test]
    fn tool_call_chunk_decodes_with_index() {
        let chunk = parse_chunk(
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_1","function":{"name":"run_command","arguments":"{\"com"}}]},"index":0}]}"#,
        );
        let deltas = chunk_to_deltas(chunk);
        let tc = deltas[0].tool_call_delta.as_ref().unwrap();
        assert_eq!(tc.index, 0);
        assert_eq!(tc.id.as_deref(), Some("call_1"));
        assert_eq!(tc.name.as_deref(), Some("run_command"));
        assert_eq!(tc.arguments.as_deref(), Some("{\"com"));
    }

    #[test]
    fn argument_continuation_has_no_name() {
        let chunk = parse_chunk(
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"mand\":"}}]},"index":0}]}"#,
        );
        let deltas = chunk_to_deltas(chunk);
        let tc = deltas[0].tool_call_delta.as_ref().unwrap();
        assert!(tc.name.is_none());
        assert_eq!(tc.arguments.as_deref(), Some("mand\":"));
    }

    #[test]
    fn finish_chunk_decodes() {
        let chunk = parse_chunk(r#"{"choices":[{"delta":{},"finish_reason":"tool_calls","index":0}]}"#);
        let deltas = chunk_to_deltas(chunk);
        assert_eq!(deltas[0].finish_reason, Some(FinishReason::ToolCalls));
    }

    #[test]
    fn content_ordered_before_finish() {
        let chunk =
            parse_chunk(r#"{"choices":[{"delta":{"content":"bye"},"finish_reason":"stop","index":0}]}"#);
        let deltas = chunk_to_deltas(chunk);
        assert_eq!(deltas.len(), 2);
        assert_eq!(deltas[0].text_delta.as_deref(), Some("bye"));
        assert_eq!(deltas[1].finish_reason, Some(FinishReason::Stop));
    }

    #[test]
    fn empty_choices_yields_nothing() {
        let chunk = parse_chunk(r#"{"choices":[]}"#);
        assert!(chunk_to_deltas(chunk).is_empty());
    }

    // ── HTTP behavior ────────────────────────────────────────────────────

    fn test_backend(server: &MockServer) -> OpenAiBackend {
        OpenAiBackend::new(OpenAiConfig {
            api_key: "test-key".into(),
            base_url: server.uri(),
            model: "main-model".into(),
            fast_model: "fast-model".into(),
        })
    }

    const SSE_BODY: &str = concat!(
        "data: {\"choices\":[{\"delta\":{\"content\":\"Hello\"},\"index\":0}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\" world\"},\"index\":0}]}\n\n",
        "data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\",\"index\":0}]}\n\n",
        "data: [DONE]\n\n",
    );

    #[tokio::test]
    async fn stream_chat_yields_ordered_deltas() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(SSE_BODY, "text/event-stream"),
            )
            .mount(&server)
            .await;

        let backend = test_backend(&server);
        let stream = backend
            .stream_chat("sys", vec![ApiMessage::text(Role::User, "hi")], None)
            .await
            .unwrap();
        let deltas: Vec<CompletionDelta> = stream.try_collect().await.unwrap();

        assert_eq!(deltas.len(), 3);
        assert_eq!(deltas[0].text_delta.as_deref(), Some("Hello"));
        assert_eq!(deltas[1].text_delta.as_deref(), Some(" world"));
        assert_eq!(deltas[2].finish_reason, Some(FinishReason::Stop));
    }

    #[tokio::test]
    async fn stream_chat_without_tools_uses_fast_model() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(serde_json::json!({"model": "fast-model"})))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw("data: [DONE]\n\n", "text/event-stream"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let backend = test_backend(&server);
        let stream = backend.stream_chat("sys", vec![], None).await.unwrap();
        let deltas: Vec<CompletionDelta> = stream.try_collect().await.unwrap();
        assert!(deltas.is_empty());
    }

    #[tokio::test]
    async fn stream_chat_with_tools_uses_main_model() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(serde_json::json!({"model": "main-model"})))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw("data: [DONE]\n\n", "text/event-stream"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let backend = test_backend(&server);
        let tools = vec![ToolSpec {
            name: "run_command".into(),
            description: "Run a command".into(),
            parameters: serde_json::json!({"type": "object"}),
        }];
        let _ = backend
            .stream_chat("sys", vec![], Some(tools))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn complete_chat_returns_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "- Add tests"}}]
            })))
            .mount(&server)
            .await;

        let backend = test_backend(&server);
        let text = backend.complete_chat("sys", "conversation").await.unwrap();
        assert_eq!(text, "- Add tests");
    }

    #[tokio::test]
    async fn api_error_surfaces_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let backend = test_backend(&server);
        let err = backend.complete_chat("sys", "x").await.unwrap_err();
        assert_matches!(err, LlmError::Api { status: 429, .. });
    }

    #[tokio::test]
    async fn empty_choices_is_empty_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"choices": []})),
            )
            .mount(&server)
            .await;

        let backend = test_backend(&server);
        let err = backend.complete_chat("sys", "x").await.unwrap_err();
        assert_matches!(err, LlmError::EmptyResponse);
    }
}
