//! # stackforge-sandbox
//!
//! The Sandbox Handle boundary: a per-project execution environment the
//! agent can run commands and read files in.
//!
//! - **Traits**: [`SandboxHandle`] (run/read/list/liveness/tunnels) and
//!   [`Provisioner`] (acquire/terminate), with a distinct
//!   [`SandboxError::NotReady`] condition the orchestrator backs off on.
//! - **Local implementation**: [`local::LocalSandbox`] runs commands in a
//!   project directory via `tokio::process`; used by the server binary and
//!   by integration-style tests.
//!
//! ## Crate Position
//!
//! Boundary crate. Depends on stackforge-core. Depended on by
//! stackforge-runtime and stackforge-server.

#![deny(unsafe_code)]

pub mod error;
pub mod handle;
pub mod local;

pub use error::{SandboxError, SandboxResult};
pub use handle::{Provisioner, SandboxHandle};
pub use local::{LocalProvisioner, LocalSandbox};
