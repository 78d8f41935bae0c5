//! # stackforge-core
//!
//! Foundation types shared by every stackforge crate:
//!
//! - **Branded IDs**: [`ids::ProjectId`], [`ids::ChatId`], [`ids::UserId`] as newtypes
//! - **Messages**: [`messages::ChatMessage`] and the streamed [`messages::PartialMessage`]
//! - **Wire events**: [`events::ServerEvent`] — the three tagged frames sent to clients
//! - **Sandbox status**: [`events::SandboxStatus`] lifecycle enum
//! - **Text utilities**: [`text`] — file-change block parsing/stripping, follow-up parsing
//!
//! ## Crate Position
//!
//! Foundation crate. Depended on by all other stackforge crates.

#![deny(unsafe_code)]

pub mod events;
pub mod ids;
pub mod messages;
pub mod text;
