//! The streaming agent: one instance per open chat session.
//!
//! A turn has two phases. The **plan** phase makes a tool-less completion
//! call over the stripped conversation and streams it as thinking content.
//! The **execution** phase offers the tool catalog and loops: stream text,
//! buffer tool-call fragments by index, execute the buffered calls when the
//! provider says they are complete, feed results back, repeat until a
//! `stop` finish reason.

use std::pin::Pin;
use std::sync::Arc;

use async_stream::try_stream;
use futures::{Stream, StreamExt};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, instrument, warn};

use stackforge_core::messages::{ChatMessage, PartialMessage, Role};
use stackforge_core::text::{
    parse_file_changes, parse_follow_ups, remove_file_changes, tail_chars,
};
use stackforge_llm::backend::CompletionBackend;
use stackforge_llm::types::{ApiMessage, FinishReason};
use stackforge_sandbox::SandboxHandle;

use crate::agent::prompts::{self, AgentContext};
use crate::agent::tool_buffer::ToolCallBuffer;
use crate::agent::tools::{self, ToolInvocation};
use crate::errors::RuntimeError;

/// Ordered stream of turn fragments.
pub type FragmentStream =
    Pin<Box<dyn Stream<Item = Result<PartialMessage, RuntimeError>> + Send>>;

/// Conversation text fed to the follow-up model is capped to this suffix.
const FOLLOW_UP_CONTEXT_CHARS: usize = 10_000;

/// The per-chat streaming agent.
///
/// Holds the project context, the completion backend, and (once the
/// orchestrator installs it) the shared sandbox handle. The agent itself
/// is stateless between turns apart from the navigation hint of the last
/// completed turn.
pub struct ChatAgent {
    context: AgentContext,
    backend: Arc<dyn CompletionBackend>,
    sandbox: RwLock<Option<Arc<dyn SandboxHandle>>>,
    preview_url: RwLock<Option<String>>,
    navigation: Mutex<Option<String>>,
}

impl ChatAgent {
    /// Create an agent without a sandbox (installed once the project's
    /// environment comes up).
    pub fn new(context: AgentContext, backend: Arc<dyn CompletionBackend>) -> Self {
        Self {
            context,
            backend,
            sandbox: RwLock::new(None),
            preview_url: RwLock::new(None),
            navigation: Mutex::new(None),
        }
    }

    /// Install the shared sandbox handle and its preview-tunnel URL.
    pub fn install_sandbox(&self, handle: Arc<dyn SandboxHandle>, preview_url: Option<String>) {
        *self.sandbox.write() = Some(handle);
        *self.preview_url.write() = preview_url;
    }

    /// Whether a sandbox handle is installed.
    pub fn has_sandbox(&self) -> bool {
        self.sandbox.read().is_some()
    }

    fn sandbox_handle(&self) -> Option<Arc<dyn SandboxHandle>> {
        self.sandbox.read().clone()
    }

    /// Navigation hint from the last completed turn, consumed on read.
    pub fn take_navigation_target(&self) -> Option<String> {
        self.navigation.lock().take()
    }

    fn project_text(&self) -> String {
        let mut text = self.context.project_text(self.has_sandbox());
        if let Some(url) = self.preview_url.read().clone() {
            text.push_str("\nPreview URL: ");
            text.push_str(&url);
        }
        text
    }

    /// Run one turn, producing an ordered fragment stream.
    ///
    /// The first fragment is always an empty content delta so consumers
    /// learn the turn has begun before any content exists.
    #[instrument(skip_all, fields(message_count = messages.len()))]
    pub fn step(
        self: &Arc<Self>,
        messages: Vec<ChatMessage>,
        file_paths: Option<Vec<String>>,
        change_log: Option<String>,
    ) -> FragmentStream {
        let agent = Arc::clone(self);
        Box::pin(try_stream! {
            yield PartialMessage::content("");

            let files_text = match &file_paths {
                Some(paths) => {
                    let mut text = paths.join("\n");
                    if let Some(log) = &change_log {
                        text.push_str("\n\nRecent changes:\n");
                        text.push_str(log);
                    }
                    text
                }
                None => "Sandbox is still booting...".to_string(),
            };
            let project_text = agent.project_text();
            let stack_text = agent.context.stack_prompt.clone();

            // Plan phase: streamed as thinking only, never final content.
            let plan_system =
                prompts::plan_system_prompt(&project_text, &stack_text, &files_text);
            let conversation = messages
                .iter()
                .map(|m| format!("<msg>{}</msg>", remove_file_changes(&m.content)))
                .collect::<Vec<_>>()
                .join("\n\n");
            let plan_user =
                format!("{conversation}\n\nProvide the plan in the requested format only.");
            let mut plan_stream = agent
                .backend
                .stream_chat(&plan_system, vec![ApiMessage::text(Role::User, plan_user)], None)
                .await?;
            let mut plan_text = String::new();
            while let Some(delta) = plan_stream.next().await {
                let delta = delta?;
                if let Some(text) = delta.text_delta {
                    plan_text.push_str(&text);
                    yield PartialMessage::thinking(text);
                }
            }
            drop(plan_stream);
            debug!(plan_len = plan_text.len(), "plan phase complete");

            // Execution phase: tool loop until a stop finish reason.
            let exec_system =
                prompts::exec_system_prompt(&project_text, &stack_text, &files_text, &plan_text);
            let mut api_messages: Vec<ApiMessage> =
                messages.iter().map(to_api_message).collect();
            let catalog = tools::catalog();
            let mut total_content = String::new();

            'turn: loop {
                let mut stream = agent
                    .backend
                    .stream_chat(&exec_system, api_messages.clone(), Some(catalog.clone()))
                    .await?;
                let mut buffer = ToolCallBuffer::default();
                let mut finish = None;
                while let Some(delta) = stream.next().await {
                    let delta = delta?;
                    if let Some(tc) = &delta.tool_call_delta {
                        buffer.apply(tc);
                    }
                    if let Some(text) = delta.text_delta {
                        total_content.push_str(&text);
                        yield PartialMessage::content(text);
                    }
                    if let Some(reason) = delta.finish_reason {
                        finish = Some(reason);
                        break;
                    }
                }
                drop(stream);

                match finish {
                    Some(FinishReason::ToolCalls) => {
                        let calls = buffer.take();
                        api_messages.push(ApiMessage::assistant_tool_calls(
                            calls.iter().map(super::tool_buffer::BufferedCall::to_record).collect(),
                        ));
                        // Sequential, in buffer order.
                        for call in calls {
                            let result = match ToolInvocation::parse(&call.name, &call.arguments) {
                                Ok(invocation) => {
                                    invocation.execute(agent.sandbox_handle()).await
                                }
                                Err(e) => {
                                    warn!(tool = %call.name, error = %e, "tool call rejected");
                                    format!("tool call failed: {e}")
                                }
                            };
                            api_messages.push(ApiMessage::tool_result(call.id, call.name, result));
                        }
                        total_content.push('\n');
                        yield PartialMessage::content("\n");
                    }
                    _ => break 'turn,
                }
            }

            *agent.navigation.lock() = navigation_target(&total_content);
        })
    }

    /// Suggest follow-up prompts for the conversation including the final
    /// assistant message. Failures yield an empty list, never an error.
    #[instrument(skip_all)]
    pub async fn suggest_follow_ups(&self, messages: &[ChatMessage]) -> Vec<String> {
        let conversation = messages
            .iter()
            .map(|m| {
                format!(
                    "<{role}>{content}</{role}>",
                    role = m.role,
                    content = remove_file_changes(&m.content)
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n");
        let system =
            prompts::follow_up_system_prompt(&self.project_text(), &self.context.stack_prompt);
        match self
            .backend
            .complete_chat(&system, tail_chars(&conversation, FOLLOW_UP_CONTEXT_CHARS))
            .await
        {
            Ok(text) => parse_follow_ups(&text),
            Err(e) => {
                warn!(error = %e, "follow-up suggestion failed");
                Vec::new()
            }
        }
    }
}

fn to_api_message(message: &ChatMessage) -> ApiMessage {
    match message.images.as_deref() {
        Some(images) if !images.is_empty() => {
            ApiMessage::with_images(message.role, message.content.clone(), images)
        }
        _ => ApiMessage::text(message.role, message.content.clone()),
    }
}

/// Derive a frontend route from the turn's first page-level file change.
fn navigation_target(content: &str) -> Option<String> {
    for change in parse_file_changes(content) {
        let components: Vec<String> = std::path::Path::new(&change.path)
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        if let Some(pos) = components.iter().position(|c| c == "pages") {
            let mut route = components[pos + 1..].to_vec();
            if let Some(last) = route.last_mut() {
                if let Some(stem) = std::path::Path::new(last.as_str()).file_stem() {
                    *last = stem.to_string_lossy().into_owned();
                }
                if last == "index" {
                    let _ = route.pop();
                }
            }
            return Some(format!("/{}", route.join("/")));
        }
    }
    None
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
