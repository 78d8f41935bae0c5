//! Runtime errors.

use thiserror::Error;

use stackforge_llm::LlmError;
use stackforge_sandbox::SandboxError;

use crate::store::StoreError;

/// Errors produced while driving a turn or the sandbox lifecycle.
///
/// Turn-level instances of this error are logged by the orchestrator and
/// never surfaced to the transport; clients only observe the status frame
/// returning to `READY`.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Completion backend failure.
    #[error(transparent)]
    Llm(#[from] LlmError),

    /// Sandbox failure outside the tool-call error path.
    #[error(transparent)]
    Sandbox(#[from] SandboxError),

    /// Persistence boundary failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}
