//! Shared test doubles for agent and orchestrator tests.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;

use stackforge_core::events::TunnelMap;
use stackforge_core::ids::ProjectId;
use stackforge_llm::backend::{CompletionBackend, DeltaStream};
use stackforge_llm::error::{LlmError, LlmResult};
use stackforge_llm::types::{ApiMessage, CompletionDelta, ToolSpec};
use stackforge_sandbox::error::{SandboxError, SandboxResult};
use stackforge_sandbox::handle::{Provisioner, SandboxHandle};

/// One recorded `stream_chat` request.
#[derive(Clone, Debug)]
pub struct RecordedRequest {
    pub system: String,
    pub messages: Vec<ApiMessage>,
    pub has_tools: bool,
}

/// Backend that replays scripted delta sequences in call order.
#[derive(Default)]
pub struct ScriptedBackend {
    scripts: Mutex<VecDeque<Vec<CompletionDelta>>>,
    completion: Mutex<Option<String>>,
    stream_delay: Mutex<Option<Duration>>,
    pub requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the deltas for the next `stream_chat` call.
    pub fn push_script(&self, deltas: Vec<CompletionDelta>) {
        self.scripts.lock().push_back(deltas);
    }

    /// Response text for `complete_chat` (unset ⇒ error).
    pub fn set_completion(&self, text: impl Into<String>) {
        *self.completion.lock() = Some(text.into());
    }

    /// Delay applied inside every stream (for in-flight-turn tests).
    pub fn set_stream_delay(&self, delay: Duration) {
        *self.stream_delay.lock() = Some(delay);
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl CompletionBackend for ScriptedBackend {
    async fn stream_chat(
        &self,
        system_prompt: &str,
        messages: Vec<ApiMessage>,
        tools: Option<Vec<ToolSpec>>,
    ) -> LlmResult<DeltaStream> {
        self.requests.lock().push(RecordedRequest {
            system: system_prompt.to_string(),
            messages,
            has_tools: tools.is_some(),
        });
        let delay = *self.stream_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let deltas = self.scripts.lock().pop_front().unwrap_or_default();
        Ok(futures::stream::iter(deltas.into_iter().map(Ok)).boxed())
    }

    async fn complete_chat(&self, _system_prompt: &str, _user_text: &str) -> LlmResult<String> {
        self.completion.lock().clone().ok_or(LlmError::EmptyResponse)
    }
}

/// Sandbox that records commands and answers from canned state.
pub struct RecordingSandbox {
    pub commands: Mutex<Vec<String>>,
    pub files: Mutex<Vec<String>>,
    pub change_log: Mutex<Option<String>>,
    pub tunnels: TunnelMap,
    pub up: AtomicBool,
}

impl Default for RecordingSandbox {
    fn default() -> Self {
        Self {
            commands: Mutex::new(Vec::new()),
            files: Mutex::new(vec!["/app/src/index.ts".to_string()]),
            change_log: Mutex::new(None),
            tunnels: TunnelMap::from([(3000, "http://localhost:3000".to_string())]),
            up: AtomicBool::new(true),
        }
    }
}

impl RecordingSandbox {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_up(&self, up: bool) {
        self.up.store(up, Ordering::SeqCst);
    }
}

#[async_trait]
impl SandboxHandle for RecordingSandbox {
    async fn wait_until_up(&self) -> SandboxResult<()> {
        Ok(())
    }

    async fn is_up(&self) -> bool {
        self.up.load(Ordering::SeqCst)
    }

    async fn run_command(&self, command: &str, _workdir: Option<&str>) -> SandboxResult<String> {
        self.commands.lock().push(command.to_string());
        Ok(format!("ran: {command}"))
    }

    async fn read_file(&self, _path: &str, _missing_ok: bool) -> SandboxResult<Option<String>> {
        Ok(self.change_log.lock().clone())
    }

    async fn list_files(&self) -> SandboxResult<Vec<String>> {
        Ok(self.files.lock().clone())
    }

    async fn list_tunnels(&self) -> SandboxResult<TunnelMap> {
        Ok(self.tunnels.clone())
    }
}

/// Provisioner that reports `NotReady` a fixed number of times first, and
/// counts teardowns.
pub struct FlakyProvisioner {
    sandbox: Arc<RecordingSandbox>,
    not_ready_remaining: AtomicUsize,
    pub acquire_calls: AtomicUsize,
    pub terminate_calls: AtomicUsize,
}

impl FlakyProvisioner {
    pub fn new(sandbox: Arc<RecordingSandbox>, not_ready_times: usize) -> Arc<Self> {
        Arc::new(Self {
            sandbox,
            not_ready_remaining: AtomicUsize::new(not_ready_times),
            acquire_calls: AtomicUsize::new(0),
            terminate_calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Provisioner for FlakyProvisioner {
    async fn acquire(&self, _project_id: ProjectId) -> SandboxResult<Arc<dyn SandboxHandle>> {
        let _ = self.acquire_calls.fetch_add(1, Ordering::SeqCst);
        if self
            .not_ready_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(SandboxError::NotReady);
        }
        Ok(Arc::clone(&self.sandbox) as Arc<dyn SandboxHandle>)
    }

    async fn terminate_resources(&self, _project_id: ProjectId) -> SandboxResult<()> {
        let _ = self.terminate_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
