//! Sandbox boundary traits.

use std::sync::Arc;

use async_trait::async_trait;
use stackforge_core::events::TunnelMap;
use stackforge_core::ids::ProjectId;

use crate::error::SandboxResult;

/// A live, per-project execution environment.
///
/// Exactly one orchestrator owns a handle; every chat agent in that project
/// shares it read/write. Implementations must tolerate interleaved calls
/// from multiple turns (the orchestrator's turn lock keeps mutating turns
/// serialized, but callers must not assume exclusivity).
#[async_trait]
pub trait SandboxHandle: Send + Sync {
    /// Block until the environment answers, after acquisition succeeds.
    async fn wait_until_up(&self) -> SandboxResult<()>;

    /// Liveness probe. `false` means the environment is gone for good.
    async fn is_up(&self) -> bool;

    /// Run a shell command, returning combined stdout/stderr text.
    async fn run_command(&self, command: &str, workdir: Option<&str>) -> SandboxResult<String>;

    /// Read a file. With `missing_ok`, a missing file is `Ok(None)`.
    async fn read_file(&self, path: &str, missing_ok: bool) -> SandboxResult<Option<String>>;

    /// Ordered listing of project file paths.
    async fn list_files(&self) -> SandboxResult<Vec<String>>;

    /// Port → public URL for every open tunnel.
    async fn list_tunnels(&self) -> SandboxResult<TunnelMap>;
}

/// Acquires and tears down sandbox environments.
#[async_trait]
pub trait Provisioner: Send + Sync {
    /// Acquire the project's sandbox. Fails with
    /// [`crate::SandboxError::NotReady`] while provisioning is in progress.
    async fn acquire(&self, project_id: ProjectId) -> SandboxResult<Arc<dyn SandboxHandle>>;

    /// Tear down everything provisioned for the project. Idempotent.
    async fn terminate_resources(&self, project_id: ProjectId) -> SandboxResult<()>;
}
