//! Error types for ncplay
//!
//! Every failure keeps its distinguishing kind up to the CLI layer, which
//! picks the exit code and message. Nothing in the core retries on its own.

use thiserror::Error;

/// Main error type for the ncplay player controller
#[derive(Error, Debug)]
pub enum Error {
    /// Control endpoint absent (or a stale socket nobody listens on)
    #[error("Backend not running: no control endpoint at {0}")]
    BackendNotRunning(String),

    /// Backend executable could not be found when spawning
    #[error("Backend not installed: '{0}' was not found, install mpv and make sure it is on PATH")]
    BackendNotInstalled(String),

    /// Endpoint exists but the connection or spawn failed for another reason
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Connection went away while a request was outstanding
    #[error("Connection to backend closed")]
    ConnectionClosed,

    /// No reply within the request deadline
    #[error("Request timed out: '{command}' (request_id {request_id}) got no reply within {timeout_ms} ms")]
    RequestTimeout {
        command: String,
        request_id: u64,
        timeout_ms: u64,
    },

    /// Reply carried a non-success error string
    #[error("Backend error: {0}")]
    BackendReportedError(String),

    /// Queue index out of range
    #[error("Invalid index {index} (queue length {len})")]
    InvalidIndex { index: usize, len: usize },

    /// Invalid request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Backend sent something that could not be interpreted for this request
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// State file could not be written
    #[error("Failed to persist player state: {0}")]
    Persistence(String),

    /// Track catalogue failure
    #[error("Track source error: {0}")]
    Source(String),

    /// Configuration file loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encode/decode errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Process exit code for this error kind
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::BackendNotRunning(_) | Error::ConnectionFailed(_) | Error::ConnectionClosed => 3,
            Error::BackendNotInstalled(_) => 4,
            Error::RequestTimeout { .. } => 5,
            _ => 1,
        }
    }

    /// Stable machine-readable identifier used in JSON output
    pub fn code(&self) -> &'static str {
        match self {
            Error::BackendNotRunning(_) => "BACKEND_NOT_RUNNING",
            Error::BackendNotInstalled(_) => "BACKEND_NOT_INSTALLED",
            Error::ConnectionFailed(_) => "CONNECTION_FAILED",
            Error::ConnectionClosed => "CONNECTION_CLOSED",
            Error::RequestTimeout { .. } => "REQUEST_TIMEOUT",
            Error::BackendReportedError(_) => "BACKEND_ERROR",
            Error::InvalidIndex { .. } => "INVALID_INDEX",
            Error::InvalidInput(_) => "INVALID_INPUT",
            Error::Protocol(_) => "PROTOCOL_ERROR",
            Error::Persistence(_) => "PERSISTENCE_ERROR",
            Error::Source(_) => "SOURCE_ERROR",
            Error::Config(_) => "CONFIG_ERROR",
            Error::Io(_) => "IO_ERROR",
            Error::Json(_) => "JSON_ERROR",
        }
    }
}

impl From<ncplay_common::Error> for Error {
    fn from(err: ncplay_common::Error) -> Self {
        match err {
            ncplay_common::Error::Io(e) => Error::Io(e),
            ncplay_common::Error::Json(e) => Error::Json(e),
            ncplay_common::Error::Config(msg) => Error::Config(msg),
            ncplay_common::Error::InvalidInput(msg) => Error::InvalidInput(msg),
        }
    }
}

/// Convenience Result type using ncplay Error
pub type Result<T> = std::result::Result<T, Error>;
