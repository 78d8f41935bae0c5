//! # stackforge-server
//!
//! The transport layer: an Axum HTTP server exposing one WebSocket route
//! per chat plus a health endpoint. Inbound text frames are chat messages
//! handed to the project's orchestrator; outbound frames are the
//! orchestrator's serialized events, drained from a per-connection channel.
//!
//! ## Crate Position
//!
//! Outermost crate. Depends on stackforge-runtime (and, through it, on the
//! rest of the workspace). Ships the `stackforge` binary.

#![deny(unsafe_code)]

pub mod config;
pub mod server;
pub mod ws;

pub use config::ServerConfig;
pub use server::{AppState, router};
