//! Backend process launch
//!
//! The backend is an external mpv process started in idle mode with its
//! control server enabled. It is detached from this process so that it keeps
//! playing after the CLI exits; later invocations find it through the
//! endpoint.

use crate::error::{Error, Result};
use crate::ipc::DEFAULT_REQUEST_TIMEOUT;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};

/// Default backend executable, looked up on PATH
pub const DEFAULT_BACKEND_BINARY: &str = "mpv";

/// Default window title given to the backend
pub const DEFAULT_WINDOW_TITLE: &str = "ncplay";

/// Time the backend gets to create its endpoint after a spawn
pub const DEFAULT_STARTUP_GRACE: Duration = Duration::from_millis(500);

/// How to find, start and talk to the backend
#[derive(Debug, Clone, PartialEq)]
pub struct BackendConfig {
    /// Executable name or path
    pub binary: PathBuf,
    /// Control endpoint (socket path or pipe name)
    pub endpoint: PathBuf,
    pub title: String,
    /// Per-request deadline
    pub request_timeout: Duration,
    /// Wait after spawning before the first connection attempt
    pub startup_grace: Duration,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from(DEFAULT_BACKEND_BINARY),
            endpoint: ncplay_common::config::default_endpoint(),
            title: DEFAULT_WINDOW_TITLE.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            startup_grace: DEFAULT_STARTUP_GRACE,
        }
    }
}

impl BackendConfig {
    /// Arguments for an idle, audio-only, quiet backend serving `endpoint`
    pub fn launch_args(&self) -> Vec<String> {
        vec![
            "--idle".to_string(),
            format!("--input-ipc-server={}", self.endpoint.display()),
            "--no-video".to_string(),
            "--really-quiet".to_string(),
            format!("--title={}", self.title),
        ]
    }
}

/// Start a detached backend process.
///
/// Returns once the process exists; it does not wait for the endpoint.
/// A missing executable is `BackendNotInstalled`, any other spawn failure
/// is `ConnectionFailed`.
pub fn spawn_backend(config: &BackendConfig) -> Result<()> {
    let args = config.launch_args();
    debug!(binary = %config.binary.display(), ?args, "Spawning backend");

    let mut command = Command::new(&config.binary);
    command
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(false);

    #[cfg(unix)]
    command.process_group(0);

    #[cfg(windows)]
    {
        const DETACHED_PROCESS: u32 = 0x0000_0008;
        const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
        command.creation_flags(DETACHED_PROCESS | CREATE_NEW_PROCESS_GROUP);
    }

    let child = command.spawn().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::BackendNotInstalled(config.binary.display().to_string())
        } else {
            Error::ConnectionFailed(format!("failed to start {}: {}", config.binary.display(), e))
        }
    })?;

    info!(
        pid = child.id(),
        endpoint = %config.endpoint.display(),
        "Started backend"
    );

    // Dropping the handle leaves the process running
    drop(child);
    Ok(())
}
