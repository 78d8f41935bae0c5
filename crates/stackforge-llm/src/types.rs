//! Provider-side message and delta types (OpenAI chat-completions shape).

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use stackforge_core::messages::Role;

// ─────────────────────────────────────────────────────────────────────────────
// Conversation messages sent to the provider
// ─────────────────────────────────────────────────────────────────────────────

/// One content part of a multi-part user/assistant message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    /// Plain text.
    Text {
        /// The text itself.
        text: String,
    },
    /// An image reference (data URL or https URL).
    ImageUrl {
        /// Wrapper object holding the URL.
        image_url: ImageUrl,
    },
}

/// URL wrapper for image parts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImageUrl {
    /// The image URL.
    pub url: String,
}

/// Message content: either a bare string or a list of parts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ApiContent {
    /// Bare text content.
    Text(String),
    /// Multi-part content (text + images).
    Parts(Vec<ContentPart>),
}

/// A completed tool call, as recorded in an assistant message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    /// Provider-assigned call ID.
    pub id: String,
    /// Always `"function"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Name plus raw JSON arguments.
    pub function: FunctionCall,
}

/// Function name and serialized arguments of a tool call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Tool name.
    pub name: String,
    /// Raw JSON arguments string.
    pub arguments: String,
}

/// One message in the conversation sent to the provider.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ApiMessage {
    /// Conversation role.
    pub role: Role,
    /// Message content, absent on pure tool-call records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<ApiContent>,
    /// Tool calls the assistant requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallRecord>>,
    /// Which call a tool-role result answers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Tool name on tool-role results.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ApiMessage {
    /// Plain text message.
    pub fn text(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(ApiContent::Text(content.into())),
            tool_calls: None,
            tool_call_id: None,
            name: None,
        }
    }

    /// Text message with image attachments.
    pub fn with_images(role: Role, content: impl Into<String>, images: &[String]) -> Self {
        let mut parts = vec![ContentPart::Text {
            text: content.into(),
        }];
        parts.extend(images.iter().map(|url| ContentPart::ImageUrl {
            image_url: ImageUrl { url: url.clone() },
        }));
        Self {
            role,
            content: Some(ApiContent::Parts(parts)),
            tool_calls: None,
            tool_call_id: None,
            name: None,
        }
    }

    /// Assistant record of requested tool calls (no content).
    pub fn assistant_tool_calls(calls: Vec<ToolCallRecord>) -> Self {
        Self {
            role: Role::Assistant,
            content: None,
            tool_calls: Some(calls),
            tool_call_id: None,
            name: None,
        }
    }

    /// Tool-role result answering one call.
    pub fn tool_result(
        call_id: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            role: Role::Tool,
            content: Some(ApiContent::Text(content.into())),
            tool_calls: None,
            tool_call_id: Some(call_id.into()),
            name: Some(name.into()),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tool catalog
// ─────────────────────────────────────────────────────────────────────────────

/// A tool offered to the provider.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    /// Tool name.
    pub name: String,
    /// What the tool does.
    pub description: String,
    /// JSON-schema parameter object.
    pub parameters: Value,
}

impl ToolSpec {
    /// Wire shape the chat-completions API expects.
    pub fn to_wire(&self) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.parameters,
            },
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Streamed deltas
// ─────────────────────────────────────────────────────────────────────────────

/// Why the provider stopped emitting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Natural end of the response.
    Stop,
    /// The assistant requested tool calls.
    ToolCalls,
    /// Output token limit hit.
    Length,
    /// Content-filter stop.
    ContentFilter,
}

/// One incremental tool-call fragment, keyed by index.
///
/// The name arrives once (on the first fragment for an index); arguments
/// arrive as a sequence of string fragments to be concatenated.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ToolCallDelta {
    /// Which buffered call this fragment extends.
    pub index: usize,
    /// Provider-assigned call ID (first fragment only).
    pub id: Option<String>,
    /// Tool name (first fragment only).
    pub name: Option<String>,
    /// Argument JSON fragment.
    pub arguments: Option<String>,
}

/// One unit of streamed completion output.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CompletionDelta {
    /// Incremental text content.
    pub text_delta: Option<String>,
    /// Incremental tool-call fragment.
    pub tool_call_delta: Option<ToolCallDelta>,
    /// Present exactly once, on the stream's terminal delta.
    pub finish_reason: Option<FinishReason>,
}

impl CompletionDelta {
    /// Text-only delta.
    pub fn text(delta: impl Into<String>) -> Self {
        Self {
            text_delta: Some(delta.into()),
            ..Self::default()
        }
    }

    /// Terminal delta.
    pub fn finish(reason: FinishReason) -> Self {
        Self {
            finish_reason: Some(reason),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_message_serializes_bare_string() {
        let msg = ApiMessage::text(Role::User, "hello");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "user");
        assert_eq!(json["content"], "hello");
        assert!(json.get("tool_calls").is_none());
    }

    #[test]
    fn image_message_serializes_parts() {
        let msg = ApiMessage::with_images(Role::User, "look", &["data:image/png;base64,xx".into()]);
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["content"][0]["type"], "text");
        assert_eq!(json["content"][1]["type"], "image_url");
        assert_eq!(json["content"][1]["image_url"]["url"], "data:image/png;base64,xx");
    }

    #[test]
    fn tool_result_carries_call_id_and_name() {
        let msg = ApiMessage::tool_result("call_1", "run_command", "ok");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "tool");
        assert_eq!(json["tool_call_id"], "call_1");
        assert_eq!(json["name"], "run_command");
        assert_eq!(json["content"], "ok");
    }

    #[test]
    fn assistant_tool_call_record_has_no_content() {
        let msg = ApiMessage::assistant_tool_calls(vec![ToolCallRecord {
            id: "call_1".into(),
            kind: "function".into(),
            function: FunctionCall {
                name: "run_command".into(),
                arguments: "{\"command\":\"ls\"}".into(),
            },
        }]);
        let json = serde_json::to_value(&msg).unwrap();
        assert!(json.get("content").is_none());
        assert_eq!(json["tool_calls"][0]["function"]["name"], "run_command");
        assert_eq!(json["tool_calls"][0]["type"], "function");
    }

    #[test]
    fn tool_spec_wire_shape() {
        let spec = ToolSpec {
            name: "run_command".into(),
            description: "Run a command".into(),
            parameters: json!({"type": "object"}),
        };
        let wire = spec.to_wire();
        assert_eq!(wire["type"], "function");
        assert_eq!(wire["function"]["name"], "run_command");
        assert_eq!(wire["function"]["parameters"]["type"], "object");
    }

    #[test]
    fn finish_reason_parses_snake_case() {
        let r: FinishReason = serde_json::from_str("\"tool_calls\"").unwrap();
        assert_eq!(r, FinishReason::ToolCalls);
    }
}
