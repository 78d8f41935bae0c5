//! Outbound wire events and the sandbox status enum.
//!
//! Every frame a client receives is a [`ServerEvent`], tagged by `for_type`
//! so a frontend can switch on one field:
//!
//! - `status` — project-wide sandbox lifecycle snapshot
//! - `chat_update` — a full durable message (inbound echo or final assistant)
//! - `chat_chunk` — one streamed fragment of an in-flight turn

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ids::{ChatId, ProjectId};
use crate::messages::{ChatMessage, PartialMessage, Role};

/// Sandbox lifecycle state, as observed by clients.
///
/// The terminal condition of an orchestrator is its one-way `killed` flag,
/// not a status value; a killed orchestrator broadcasts `Building` so that
/// reconnecting clients show a boot screen rather than a stale `Ready`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SandboxStatus {
    /// No orchestrator activity yet.
    Offline,
    /// Sandbox acquisition in progress.
    Building,
    /// Acquisition reported "not ready yet"; waiting out the backoff.
    BuildingWaiting,
    /// Sandbox is up and idle.
    Ready,
    /// A chat turn is executing.
    Working,
    /// In-turn sub-phase reserved for applying file changes.
    WorkingApplying,
}

/// Tunnel map: sandbox port to public URL.
pub type TunnelMap = BTreeMap<u16, String>;

/// One outbound frame, tagged by `for_type`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "for_type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Project-wide sandbox status snapshot.
    Status {
        /// Project the snapshot describes.
        project_id: ProjectId,
        /// Current lifecycle state.
        sandbox_status: SandboxStatus,
        /// Port → URL for every open tunnel.
        tunnels: TunnelMap,
        /// Cached file listing, once the sandbox is up.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        file_paths: Option<Vec<String>>,
        /// Cached change log, once the sandbox is up.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        change_log: Option<String>,
    },
    /// A full durable message for one chat.
    ChatUpdate {
        /// Chat the message belongs to.
        chat_id: ChatId,
        /// The message itself.
        message: ChatMessage,
        /// Suggested next prompts, present on final assistant updates.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        follow_ups: Option<Vec<String>>,
        /// Frontend navigation hint (a page the turn touched).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        navigate_to: Option<String>,
    },
    /// One streamed fragment of an in-flight turn.
    ChatChunk {
        /// Fragment role.
        role: Role,
        /// Incremental visible content.
        content: String,
        /// Incremental thinking content.
        thinking_content: String,
    },
}

impl ServerEvent {
    /// Build a `chat_chunk` frame from a streamed fragment.
    pub fn chunk(fragment: &PartialMessage) -> Self {
        ServerEvent::ChatChunk {
            role: fragment.role,
            content: fragment.delta_content.clone(),
            thinking_content: fragment.delta_thinking_content.clone(),
        }
    }

    /// Build a `chat_update` frame carrying just a message.
    pub fn update(chat_id: ChatId, message: ChatMessage) -> Self {
        ServerEvent::ChatUpdate {
            chat_id,
            message,
            follow_ups: None,
            navigate_to: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_screaming() {
        let json = serde_json::to_string(&SandboxStatus::BuildingWaiting).unwrap();
        assert_eq!(json, "\"BUILDING_WAITING\"");
    }

    #[test]
    fn status_frame_tagged_by_for_type() {
        let event = ServerEvent::Status {
            project_id: ProjectId(1),
            sandbox_status: SandboxStatus::Ready,
            tunnels: TunnelMap::from([(3000, "https://preview.test".to_string())]),
            file_paths: Some(vec!["/app/src/main.ts".into()]),
            change_log: None,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["for_type"], "status");
        assert_eq!(json["sandbox_status"], "READY");
        assert_eq!(json["tunnels"]["3000"], "https://preview.test");
        assert!(json.get("change_log").is_none());
    }

    #[test]
    fn chunk_frame_carries_both_deltas() {
        let frag = PartialMessage::thinking("### Analyzing...");
        let json = serde_json::to_value(ServerEvent::chunk(&frag)).unwrap();
        assert_eq!(json["for_type"], "chat_chunk");
        assert_eq!(json["role"], "assistant");
        assert_eq!(json["content"], "");
        assert_eq!(json["thinking_content"], "### Analyzing...");
    }

    #[test]
    fn update_frame_omits_empty_optionals() {
        let event = ServerEvent::update(ChatId(5), ChatMessage::new(Role::User, "hi"));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["for_type"], "chat_update");
        assert_eq!(json["chat_id"], 5);
        assert!(json.get("follow_ups").is_none());
        assert!(json.get("navigate_to").is_none());
    }

    #[test]
    fn update_roundtrip() {
        let event = ServerEvent::ChatUpdate {
            chat_id: ChatId(2),
            message: ChatMessage::new(Role::Assistant, "done"),
            follow_ups: Some(vec!["Add tests".into()]),
            navigate_to: Some("/settings".into()),
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: ServerEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
