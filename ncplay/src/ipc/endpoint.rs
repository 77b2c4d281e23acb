//! Platform connection to the control endpoint
//!
//! Unix domain socket on POSIX systems, named pipe on Windows. Both map
//! "nobody is listening here" to `BackendNotRunning` so callers can decide to
//! spawn the backend.

use crate::error::{Error, Result};
use std::io::ErrorKind;
use std::path::Path;
use tokio::io::{AsyncRead, AsyncWrite};

/// Byte stream the IPC client can drive
pub trait IpcStream: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

impl<T> IpcStream for T where T: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

/// Whether something exists at the endpoint path
pub fn endpoint_exists(path: &Path) -> bool {
    path.exists()
}

/// Remove a socket file left behind by a backend that is gone
#[cfg(unix)]
pub fn remove_stale(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::Io(e)),
    }
}

/// Named pipes vanish with their server
#[cfg(windows)]
pub fn remove_stale(_path: &Path) -> Result<()> {
    Ok(())
}

fn map_connect_error(path: &Path, err: std::io::Error) -> Error {
    match err.kind() {
        ErrorKind::NotFound | ErrorKind::ConnectionRefused => {
            Error::BackendNotRunning(path.display().to_string())
        }
        _ => Error::ConnectionFailed(format!("{}: {}", path.display(), err)),
    }
}

#[cfg(unix)]
pub async fn connect(path: &Path) -> Result<Box<dyn IpcStream>> {
    if !endpoint_exists(path) {
        return Err(Error::BackendNotRunning(path.display().to_string()));
    }

    let stream = tokio::net::UnixStream::connect(path)
        .await
        .map_err(|e| map_connect_error(path, e))?;
    Ok(Box::new(stream))
}

#[cfg(windows)]
pub async fn connect(path: &Path) -> Result<Box<dyn IpcStream>> {
    use tokio::net::windows::named_pipe::ClientOptions;

    let pipe = ClientOptions::new()
        .open(path)
        .map_err(|e| map_connect_error(path, e))?;
    Ok(Box::new(pipe))
}
