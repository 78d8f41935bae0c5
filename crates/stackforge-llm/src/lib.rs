//! # stackforge-llm
//!
//! The Completion Stream boundary: everything the agent needs from an LLM
//! service, behind the [`CompletionBackend`] trait.
//!
//! - **Deltas**: [`types::CompletionDelta`] — text fragments, incremental
//!   tool-call fragments keyed by index, and a finish reason.
//! - **Messages**: [`types::ApiMessage`] — the provider-side conversation
//!   shape (text, image parts, tool-call records, tool results).
//! - **Backend**: [`openai::OpenAiBackend`] — an OpenAI-compatible
//!   implementation over `reqwest` + `eventsource-stream` SSE.
//!
//! ## Crate Position
//!
//! Boundary crate. Depends on stackforge-core. Depended on by
//! stackforge-runtime and stackforge-server.

#![deny(unsafe_code)]

pub mod backend;
pub mod error;
pub mod openai;
pub mod types;

pub use backend::{CompletionBackend, DeltaStream};
pub use error::{LlmError, LlmResult};
pub use types::{ApiMessage, CompletionDelta, FinishReason, ToolCallDelta, ToolSpec};
