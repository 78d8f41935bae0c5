//! Per-project session orchestrator.
//!
//! At most one orchestrator is live per project. It owns:
//!
//! - the sandbox lifecycle state machine (provision with backoff, snapshot
//!   on ready, liveness poll, kill),
//! - the chat-session map and event fan-out to every connected client,
//! - the project-wide turn lock: one turn in flight at a time, messages
//!   arriving mid-turn are dropped.
//!
//! Locking discipline: `parking_lot` locks guard plain state and are never
//! held across an await; the turn lock is the only async mutex.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use futures::StreamExt;
use metrics::counter;
use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use stackforge_core::events::{SandboxStatus, ServerEvent, TunnelMap};
use stackforge_core::ids::{ChatId, ProjectId};
use stackforge_core::messages::{ChatMessage, Role};
use stackforge_llm::backend::CompletionBackend;
use stackforge_sandbox::error::SandboxError;
use stackforge_sandbox::handle::{Provisioner, SandboxHandle};

use crate::agent::{AgentContext, ChatAgent};
use crate::errors::RuntimeError;
use crate::orchestrator::config::OrchestratorConfig;
use crate::orchestrator::connection::ClientConnection;
use crate::store::MessageStore;

/// One chat with at least one connected client.
struct ChatSession {
    agent: Arc<ChatAgent>,
    connections: Vec<Arc<ClientConnection>>,
}

/// Sandbox facts cached when the sandbox comes up.
#[derive(Default)]
struct SandboxSnapshot {
    tunnels: TunnelMap,
    file_paths: Option<Vec<String>>,
    change_log: Option<String>,
}

/// Coordinator for one project's sandbox and chat sessions.
pub struct Orchestrator {
    project_id: ProjectId,
    config: OrchestratorConfig,
    context: AgentContext,
    store: Arc<dyn MessageStore>,
    backend: Arc<dyn CompletionBackend>,
    provisioner: Arc<dyn Provisioner>,
    /// Sessions keyed by chat; an entry exists iff it has connections.
    sessions: RwLock<HashMap<ChatId, ChatSession>>,
    status: Mutex<SandboxStatus>,
    sandbox: RwLock<Option<Arc<dyn SandboxHandle>>>,
    snapshot: Mutex<SandboxSnapshot>,
    last_activity: Mutex<Instant>,
    /// One-way terminal flag. Killed orchestrators are replaced, never
    /// revived.
    killed: AtomicBool,
    /// Project-wide turn serialization.
    turn_lock: tokio::sync::Mutex<()>,
}

impl Orchestrator {
    /// Create an orchestrator in the `Offline` state. Call [`spawn`] to
    /// start the lifecycle loop.
    ///
    /// [`spawn`]: Orchestrator::spawn
    pub fn new(
        project_id: ProjectId,
        context: AgentContext,
        store: Arc<dyn MessageStore>,
        backend: Arc<dyn CompletionBackend>,
        provisioner: Arc<dyn Provisioner>,
        config: OrchestratorConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            project_id,
            config,
            context,
            store,
            backend,
            provisioner,
            sessions: RwLock::new(HashMap::new()),
            status: Mutex::new(SandboxStatus::Offline),
            sandbox: RwLock::new(None),
            snapshot: Mutex::new(SandboxSnapshot::default()),
            last_activity: Mutex::new(Instant::now()),
            killed: AtomicBool::new(false),
            turn_lock: tokio::sync::Mutex::new(()),
        })
    }

    /// Project this orchestrator serves.
    pub fn project_id(&self) -> ProjectId {
        self.project_id
    }

    /// Current lifecycle state.
    pub fn status(&self) -> SandboxStatus {
        *self.status.lock()
    }

    /// Whether the one-way kill flag is set.
    pub fn is_killed(&self) -> bool {
        self.killed.load(Ordering::SeqCst)
    }

    /// Time since the last connection or message.
    pub fn idle_for(&self) -> Duration {
        self.last_activity.lock().elapsed()
    }

    fn touch(&self) {
        *self.last_activity.lock() = Instant::now();
    }

    // ── sessions and fan-out ──

    /// Attach a client to a chat, creating the session on first attach.
    /// The newcomer immediately receives the current status snapshot.
    #[instrument(skip_all, fields(project_id = %self.project_id, %chat_id))]
    pub fn register_connection(&self, chat_id: ChatId, connection: Arc<ClientConnection>) {
        self.touch();
        {
            let mut sessions = self.sessions.write();
            let session = sessions.entry(chat_id).or_insert_with(|| ChatSession {
                agent: self.new_agent(),
                connections: Vec::new(),
            });
            session.connections.push(Arc::clone(&connection));
        }
        counter!("ws_connections_total").increment(1);
        if let Some(frame) = encode(&self.status_event()) {
            let _ = connection.send(&frame);
        }
        debug!("connection registered");
    }

    /// Detach a client; the session entry goes with its last connection.
    #[instrument(skip_all, fields(project_id = %self.project_id, %chat_id))]
    pub fn remove_connection(&self, chat_id: ChatId, connection_id: Uuid) {
        let mut sessions = self.sessions.write();
        if let Some(session) = sessions.get_mut(&chat_id) {
            session.connections.retain(|c| c.id() != connection_id);
            if session.connections.is_empty() {
                let _ = sessions.remove(&chat_id);
            }
        }
    }

    /// Total connected clients across all chats.
    pub fn connection_count(&self) -> usize {
        self.sessions
            .read()
            .values()
            .map(|s| s.connections.len())
            .sum()
    }

    /// Whether any client is connected.
    pub fn has_connections(&self) -> bool {
        self.connection_count() > 0
    }

    /// Number of chats with at least one connection.
    pub fn session_count(&self) -> usize {
        self.sessions.read().len()
    }

    fn new_agent(&self) -> Arc<ChatAgent> {
        let agent = Arc::new(ChatAgent::new(
            self.context.clone(),
            Arc::clone(&self.backend),
        ));
        if let Some(handle) = self.sandbox.read().clone() {
            agent.install_sandbox(handle, self.preview_url());
        }
        agent
    }

    fn agent_for(&self, chat_id: ChatId) -> Arc<ChatAgent> {
        if let Some(session) = self.sessions.read().get(&chat_id) {
            return Arc::clone(&session.agent);
        }
        self.new_agent()
    }

    fn preview_url(&self) -> Option<String> {
        self.snapshot
            .lock()
            .tunnels
            .get(&self.config.preview_port)
            .cloned()
    }

    fn status_event(&self) -> ServerEvent {
        let snapshot = self.snapshot.lock();
        ServerEvent::Status {
            project_id: self.project_id,
            sandbox_status: self.status(),
            tunnels: snapshot.tunnels.clone(),
            file_paths: snapshot.file_paths.clone(),
            change_log: snapshot.change_log.clone(),
        }
    }

    fn set_status_and_broadcast(&self, status: SandboxStatus) {
        *self.status.lock() = status;
        self.broadcast_all(&self.status_event());
    }

    /// Fan a frame out to every connection of every chat, dropping
    /// connections whose client is gone.
    fn broadcast_all(&self, event: &ServerEvent) {
        let Some(frame) = encode(event) else { return };
        let mut sessions = self.sessions.write();
        for session in sessions.values_mut() {
            session.connections.retain(|c| {
                if !c.send(&frame) {
                    counter!("ws_broadcast_drops_total").increment(1);
                }
                !c.is_closed()
            });
        }
        sessions.retain(|_, s| !s.connections.is_empty());
    }

    /// Fan a frame out to one chat's connections.
    fn broadcast_to_chat(&self, chat_id: ChatId, event: &ServerEvent) {
        let Some(frame) = encode(event) else { return };
        let mut sessions = self.sessions.write();
        if let Some(session) = sessions.get_mut(&chat_id) {
            session.connections.retain(|c| {
                if !c.send(&frame) {
                    counter!("ws_broadcast_drops_total").increment(1);
                }
                !c.is_closed()
            });
            if session.connections.is_empty() {
                let _ = sessions.remove(&chat_id);
            }
        }
    }

    // ── sandbox lifecycle ──

    /// Run the lifecycle loop until killed.
    pub fn spawn(self: &Arc<Self>) -> JoinHandle<()> {
        let orchestrator = Arc::clone(self);
        tokio::spawn(async move { orchestrator.run().await })
    }

    /// Lifecycle driver: manage the sandbox, retrying after errors, until
    /// the kill flag ends it.
    #[instrument(skip_all, fields(project_id = %self.project_id))]
    pub async fn run(&self) {
        loop {
            match self.manage_sandbox().await {
                Ok(()) => break,
                Err(e) => {
                    warn!(error = %e, "sandbox management failed; retrying");
                    tokio::time::sleep(self.config.error_retry).await;
                    if self.is_killed() {
                        break;
                    }
                }
            }
        }
        debug!("lifecycle loop ended");
    }

    /// One provision-to-death cycle. Returns `Ok` when ended by the kill
    /// flag, `Err` on unexpected failures the outer loop retries.
    async fn manage_sandbox(&self) -> Result<(), RuntimeError> {
        self.set_status_and_broadcast(SandboxStatus::Building);
        let sandbox = loop {
            if self.is_killed() {
                return Ok(());
            }
            match self.provisioner.acquire(self.project_id).await {
                Ok(handle) => break handle,
                Err(SandboxError::NotReady) => {
                    self.set_status_and_broadcast(SandboxStatus::BuildingWaiting);
                    tokio::time::sleep(self.config.boot_retry).await;
                }
                Err(e) => return Err(e.into()),
            }
        };
        sandbox.wait_until_up().await?;
        if self.is_killed() {
            return Ok(());
        }

        self.install_sandbox(Arc::clone(&sandbox)).await?;
        self.store.touch_project(self.project_id).await?;
        self.set_status_and_broadcast(SandboxStatus::Ready);
        info!("sandbox ready");

        loop {
            tokio::time::sleep(self.config.liveness_interval).await;
            if self.is_killed() {
                return Ok(());
            }
            if !sandbox.is_up().await {
                warn!("sandbox went down");
                self.kill().await;
                return Ok(());
            }
        }
    }

    /// Cache the ready-time snapshot and hand the sandbox to every agent.
    async fn install_sandbox(&self, handle: Arc<dyn SandboxHandle>) -> Result<(), RuntimeError> {
        let tunnels = handle.list_tunnels().await?;
        let file_paths = handle.list_files().await?;
        let change_log = handle
            .read_file(&self.config.change_log_path, true)
            .await?;
        {
            let mut snapshot = self.snapshot.lock();
            snapshot.tunnels = tunnels;
            snapshot.file_paths = Some(file_paths);
            snapshot.change_log = change_log;
        }
        *self.sandbox.write() = Some(Arc::clone(&handle));
        let preview = self.preview_url();
        let sessions = self.sessions.read();
        for session in sessions.values() {
            session
                .agent
                .install_sandbox(Arc::clone(&handle), preview.clone());
        }
        Ok(())
    }

    /// Set the kill flag, close every connection, and tear down the
    /// sandbox. Idempotent: only the first call tears down.
    #[instrument(skip_all, fields(project_id = %self.project_id))]
    pub async fn kill(&self) {
        if self.killed.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("orchestrator killed");
        *self.sandbox.write() = None;
        *self.snapshot.lock() = SandboxSnapshot::default();
        // Reconnecting clients should see a boot screen, not a stale Ready.
        self.set_status_and_broadcast(SandboxStatus::Building);
        // Dropping the senders closes each client's outbound channel,
        // ending its writer task.
        self.sessions.write().clear();
        if let Err(e) = self.provisioner.terminate_resources(self.project_id).await {
            warn!(error = %e, "failed to terminate sandbox resources");
        }
    }

    // ── turns ──

    /// Handle one inbound chat message.
    ///
    /// Non-blocking on the turn lock: a message arriving while a turn is
    /// in flight anywhere in the project is dropped. Turn failures are
    /// logged; clients only observe the status frame returning from
    /// `Working`.
    #[instrument(skip_all, fields(project_id = %self.project_id, %chat_id))]
    pub async fn on_chat_message(self: &Arc<Self>, chat_id: ChatId, message: ChatMessage) {
        if self.is_killed() {
            debug!("orchestrator killed; dropping message");
            return;
        }
        let Ok(_guard) = self.turn_lock.try_lock() else {
            debug!("turn already in flight; dropping message");
            return;
        };
        self.touch();
        counter!("chat_messages_total").increment(1);
        // Hold the chat's agent for the whole turn so a mid-turn disconnect
        // cannot swap it out from under us.
        let agent = self.agent_for(chat_id);
        let resume = self.status();
        self.set_status_and_broadcast(SandboxStatus::Working);

        if let Err(e) = self.run_turn(chat_id, message, &agent).await {
            warn!(error = %e, "turn failed");
            counter!("chat_turn_failures_total").increment(1);
        }

        if !self.is_killed() {
            let next = if self.sandbox.read().is_some() {
                if let Err(e) = self.refresh_snapshot().await {
                    warn!(error = %e, "failed to refresh sandbox snapshot");
                }
                SandboxStatus::Ready
            } else {
                resume
            };
            self.set_status_and_broadcast(next);
        }
    }

    /// Re-read the file listing and change log so post-turn status frames
    /// reflect what the turn changed.
    async fn refresh_snapshot(&self) -> Result<(), RuntimeError> {
        let Some(handle) = self.sandbox.read().clone() else {
            return Ok(());
        };
        let file_paths = handle.list_files().await?;
        let change_log = handle
            .read_file(&self.config.change_log_path, true)
            .await?;
        let mut snapshot = self.snapshot.lock();
        snapshot.file_paths = Some(file_paths);
        snapshot.change_log = change_log;
        Ok(())
    }

    async fn run_turn(
        &self,
        chat_id: ChatId,
        message: ChatMessage,
        agent: &Arc<ChatAgent>,
    ) -> Result<(), RuntimeError> {
        let inbound = self.store.append_message(chat_id, message).await?;
        self.broadcast_to_chat(chat_id, &ServerEvent::update(chat_id, inbound));

        let history = self.store.list_messages(chat_id).await?;
        let (file_paths, change_log) = {
            let snapshot = self.snapshot.lock();
            (snapshot.file_paths.clone(), snapshot.change_log.clone())
        };

        let mut stream = agent.step(history.clone(), file_paths, change_log);
        let mut content = String::new();
        while let Some(fragment) = stream.next().await {
            let fragment = fragment?;
            if fragment.persist {
                content.push_str(&fragment.delta_content);
            }
            self.broadcast_to_chat(chat_id, &ServerEvent::chunk(&fragment));
        }
        drop(stream);

        let assistant = self
            .store
            .append_message(chat_id, ChatMessage::new(Role::Assistant, content))
            .await?;
        let mut transcript = history;
        transcript.push(assistant.clone());
        let follow_ups = agent.suggest_follow_ups(&transcript).await;
        self.broadcast_to_chat(
            chat_id,
            &ServerEvent::ChatUpdate {
                chat_id,
                message: assistant,
                follow_ups: Some(follow_ups),
                navigate_to: agent.take_navigation_target(),
            },
        );
        self.store.touch_project(self.project_id).await?;
        Ok(())
    }
}

fn encode(event: &ServerEvent) -> Option<Arc<String>> {
    match serde_json::to_string(event) {
        Ok(json) => Some(Arc::new(json)),
        Err(e) => {
            warn!(error = %e, "failed to serialize event");
            None
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
