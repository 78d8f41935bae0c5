//! Per-project orchestration: sandbox lifecycle, chat sessions, event
//! fan-out, and the process-wide registry.

pub mod config;
pub mod connection;
pub mod orchestrator;
pub mod registry;

pub use config::OrchestratorConfig;
pub use connection::ClientConnection;
pub use orchestrator::Orchestrator;
pub use registry::OrchestratorRegistry;
