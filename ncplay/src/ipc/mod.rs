//! Transport to the backend player process
//!
//! Line-delimited JSON over a local socket (named pipe on Windows), with
//! request ids for reply correlation and a broadcast channel for events.

pub mod client;
pub mod endpoint;
pub mod protocol;

pub use client::{IpcClient, DEFAULT_REQUEST_TIMEOUT};
pub use protocol::BackendEvent;
