//! # stackforge-runtime
//!
//! The session-orchestration core:
//!
//! - **Agent**: [`agent::ChatAgent`] — the two-phase streaming turn
//!   (plan, then tool-augmented execution) producing ordered
//!   [`stackforge_core::messages::PartialMessage`] fragments.
//! - **Orchestrator**: [`orchestrator::Orchestrator`] — one per project;
//!   owns the sandbox lifecycle state machine, the socket/session registry,
//!   fan-out, and the project-wide turn lock.
//! - **Registry**: [`orchestrator::OrchestratorRegistry`] — process-wide
//!   map from project to live orchestrator, with idle sweeping.
//! - **Store**: [`store::MessageStore`] — the persistence boundary, with an
//!   in-memory implementation.
//!
//! ## Crate Position
//!
//! Aggregation layer. Depends on stackforge-core, stackforge-llm,
//! stackforge-sandbox. Depended on by stackforge-server.

#![deny(unsafe_code)]

pub mod agent;
pub mod errors;
pub mod orchestrator;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use agent::{AgentContext, ChatAgent, FragmentStream};
pub use errors::RuntimeError;
pub use orchestrator::{
    ClientConnection, Orchestrator, OrchestratorConfig, OrchestratorRegistry,
};
pub use store::{MemoryStore, MessageStore, StoreError};
