//! Sandbox errors.

use thiserror::Error;

/// Result alias for sandbox operations.
pub type SandboxResult<T> = Result<T, SandboxError>;

/// Errors surfaced by sandbox handles and provisioners.
#[derive(Debug, Error)]
pub enum SandboxError {
    /// The environment is still being provisioned. The orchestrator treats
    /// this as transient and retries on a fixed backoff.
    #[error("sandbox not ready yet")]
    NotReady,

    /// Filesystem or process I/O failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A requested file does not exist (and the caller did not opt out).
    #[error("file not found: {0}")]
    FileNotFound(String),

    /// Command could not be spawned or produced undecodable output.
    #[error("command failed: {0}")]
    Command(String),
}
