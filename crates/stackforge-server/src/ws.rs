//! The chat WebSocket route.
//!
//! One socket per (chat, client). Outbound frames come from the
//! connection's channel, filled by the orchestrator's fan-out; inbound
//! text frames are parsed as chat messages and handed to the orchestrator
//! on a detached task so a slow turn never blocks the read loop.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use metrics::{counter, gauge};
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use stackforge_core::ids::{ChatId, ProjectId, UserId};
use stackforge_core::messages::ChatMessage;
use stackforge_runtime::{AgentContext, ClientConnection};

use crate::server::AppState;

/// Query parameters of the chat socket route.
#[derive(Debug, Deserialize)]
pub struct ChatSocketParams {
    /// Project the chat belongs to.
    pub project_id: i64,
    /// Connecting user.
    pub user_id: i64,
    /// Project display name for the agent context.
    #[serde(default)]
    pub project_name: Option<String>,
    /// Project-level custom instructions.
    #[serde(default)]
    pub custom_instructions: Option<String>,
}

/// GET /api/ws/chat/{chat_id}
pub async fn chat_socket(
    State(state): State<AppState>,
    Path(chat_id): Path<i64>,
    Query(params): Query<ChatSocketParams>,
    upgrade: WebSocketUpgrade,
) -> Response {
    upgrade.on_upgrade(move |socket| handle_socket(state, ChatId(chat_id), params, socket))
}

#[instrument(skip_all, fields(project_id = params.project_id, chat_id = %chat_id))]
async fn handle_socket(
    state: AppState,
    chat_id: ChatId,
    params: ChatSocketParams,
    socket: WebSocket,
) {
    let project_id = ProjectId(params.project_id);
    let context = AgentContext {
        project_name: params.project_name.unwrap_or_default(),
        custom_instructions: params.custom_instructions.unwrap_or_default(),
        stack_prompt: state.stack_prompt.clone(),
    };
    let orchestrator = state.registry.get_or_create(project_id, context);
    let (connection, mut outbound) = ClientConnection::channel(UserId(params.user_id));
    let connection_id = connection.id();
    orchestrator.register_connection(chat_id, connection);
    gauge!("ws_connections_active").increment(1.0);

    let (mut sink, mut stream) = socket.split();
    let writer = tokio::spawn(async move {
        while let Some(frame) = outbound.recv().await {
            if sink.send(Message::Text(frame.as_str().into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(message)) = stream.next().await {
        match message {
            Message::Text(text) => match serde_json::from_str::<ChatMessage>(text.as_str()) {
                Ok(chat_message) => {
                    let orchestrator = Arc::clone(&orchestrator);
                    let _ = tokio::spawn(async move {
                        orchestrator.on_chat_message(chat_id, chat_message).await;
                    });
                }
                Err(e) => {
                    counter!("ws_malformed_frames_total").increment(1);
                    warn!(error = %e, "ignoring malformed inbound frame");
                }
            },
            Message::Close(_) => break,
            _ => {}
        }
    }

    orchestrator.remove_connection(chat_id, connection_id);
    writer.abort();
    gauge!("ws_connections_active").decrement(1.0);
    if orchestrator.is_killed() {
        state.registry.remove_if_dead(project_id);
    }
    debug!("client disconnected");
}
