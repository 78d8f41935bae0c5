//! Chat message types.
//!
//! [`ChatMessage`] is the durable unit of conversation: it is what the
//! persistence boundary stores and what the transport accepts inbound.
//! [`PartialMessage`] is the streamed unit: one incremental fragment of a
//! turn in progress, never persisted directly.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Conversation role.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System prompt (never stored in chat history).
    System,
    /// End-user message.
    User,
    /// Model output.
    Assistant,
    /// Tool execution result fed back to the model.
    Tool,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        };
        f.write_str(s)
    }
}

/// One durable conversation message.
///
/// `id` is `None` until the persistence boundary assigns one.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Database row ID, if persisted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// Who produced the message.
    pub role: Role,
    /// Message text.
    pub content: String,
    /// Optional image attachments (data URLs).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
}

impl ChatMessage {
    /// Build an unpersisted message with no images.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: None,
            role,
            content: content.into(),
            images: None,
        }
    }
}

/// One streamed fragment of an in-flight turn.
///
/// `delta_content` is user-visible assistant output; `delta_thinking_content`
/// is plan-phase output shown as transient "thinking" text. `persist` marks
/// whether `delta_content` belongs in the durable assistant message the
/// orchestrator writes once the turn ends.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PartialMessage {
    /// Fragment role (always assistant in practice).
    pub role: Role,
    /// Incremental visible content.
    pub delta_content: String,
    /// Incremental thinking content.
    pub delta_thinking_content: String,
    /// Whether `delta_content` is accumulated into the durable message.
    pub persist: bool,
}

impl Default for Role {
    fn default() -> Self {
        Role::Assistant
    }
}

impl PartialMessage {
    /// Visible content fragment, accumulated into the durable message.
    pub fn content(delta: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            delta_content: delta.into(),
            delta_thinking_content: String::new(),
            persist: true,
        }
    }

    /// Thinking-only fragment (plan phase), never persisted.
    pub fn thinking(delta: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            delta_content: String::new(),
            delta_thinking_content: delta.into(),
            persist: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Assistant).unwrap(), "\"assistant\"");
        let r: Role = serde_json::from_str("\"tool\"").unwrap();
        assert_eq!(r, Role::Tool);
    }

    #[test]
    fn message_roundtrip_without_optionals() {
        let msg = ChatMessage::new(Role::User, "hello");
        let json = serde_json::to_value(&msg).unwrap();
        assert!(json.get("id").is_none());
        assert!(json.get("images").is_none());
        let back: ChatMessage = serde_json::from_value(json).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn inbound_frame_shape_parses() {
        // The transport's inbound frame is exactly this shape.
        let msg: ChatMessage =
            serde_json::from_str(r#"{"role": "user", "content": "add a page"}"#).unwrap();
        assert_eq!(msg.role, Role::User);
        assert!(msg.id.is_none());
    }

    #[test]
    fn content_fragment_persists() {
        let frag = PartialMessage::content("hi");
        assert!(frag.persist);
        assert!(frag.delta_thinking_content.is_empty());
    }

    #[test]
    fn thinking_fragment_does_not_persist() {
        let frag = PartialMessage::thinking("planning...");
        assert!(!frag.persist);
        assert!(frag.delta_content.is_empty());
    }
}
