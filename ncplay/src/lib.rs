//! # ncplay
//!
//! Drives an external mpv process over its JSON IPC endpoint and keeps a
//! persisted play queue next to it.
//!
//! - [`ipc`]: newline-delimited JSON framing, request/reply correlation, events
//! - [`playback`]: backend launch, transport control, auto-advance
//! - [`queue`]: queue contents, navigation modes, state file
//! - [`session`]: ties the three together for the CLI

pub mod config;
pub mod error;
pub mod ipc;
pub mod playback;
pub mod queue;
pub mod session;
pub mod source;

pub use error::{Error, Result};
