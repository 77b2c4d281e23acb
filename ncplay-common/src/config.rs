//! Configuration file loading and bootstrap path resolution

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

/// Directory name used under the platform config/runtime directories
pub const APP_DIR: &str = "ncplay";

/// Environment variable overriding the control endpoint path
pub const ENV_SOCKET: &str = "NCPLAY_SOCKET";

/// Environment variable overriding the state file path
pub const ENV_STATE_FILE: &str = "NCPLAY_STATE_FILE";

/// Environment variable overriding the backend executable
pub const ENV_BACKEND: &str = "NCPLAY_MPV";

/// Path resolution following the bootstrap priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file value
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_path(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    config_value: Option<&Path>,
    default: impl FnOnce() -> PathBuf,
) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    // Priority 2: Environment variable (empty counts as unset)
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Some(path) = config_value {
        return path.to_path_buf();
    }

    // Priority 4: OS-dependent compiled default
    default()
}

/// Per-user configuration directory (`~/.config/ncplay` on Linux)
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from(".").join(format!(".{}", APP_DIR)))
}

/// Default location of the optional TOML configuration file
pub fn default_config_file() -> PathBuf {
    config_dir().join("config.toml")
}

/// Default location of the persisted player state document
pub fn default_state_file() -> PathBuf {
    config_dir().join("player-state.json")
}

/// Default control endpoint for the backend process
///
/// A domain socket in the user's runtime directory (falling back to the temp
/// directory) on Unix; a named pipe on Windows.
pub fn default_endpoint() -> PathBuf {
    if cfg!(windows) {
        PathBuf::from(format!(r"\\.\pipe\{}-mpv", APP_DIR))
    } else {
        dirs::runtime_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join(format!("{}-mpv.sock", APP_DIR))
    }
}

/// Load and parse a TOML file.
///
/// A missing file is not an error and yields `Ok(None)`; callers fall back to
/// defaults. A file that exists but cannot be read or parsed is reported.
pub fn load_toml<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(Error::Io(e)),
    };

    toml::from_str(&content)
        .map(Some)
        .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))
}
