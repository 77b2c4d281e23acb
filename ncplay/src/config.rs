//! Configuration for the ncplay CLI
//!
//! Settings come from, in priority order:
//! 1. Command-line arguments
//! 2. Environment variables (`NCPLAY_SOCKET`, `NCPLAY_STATE_FILE`, `NCPLAY_MPV`)
//! 3. TOML configuration file (`~/.config/ncplay/config.toml` by default)
//! 4. Built-in defaults
//!
//! A missing TOML file means "all defaults". A TOML file that exists but does
//! not parse is an error; silently ignoring it would hide typos.

use crate::error::{Error, Result};
use crate::playback::backend::{BackendConfig, DEFAULT_BACKEND_BINARY, DEFAULT_WINDOW_TITLE};
use ncplay_common::config::{self as paths, ENV_BACKEND, ENV_SOCKET, ENV_STATE_FILE};
use ncplay_common::Quality;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Contents of the TOML configuration file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TomlConfig {
    /// Backend control endpoint (socket path or pipe name)
    pub socket_path: Option<PathBuf>,

    /// Persisted player state document
    pub state_file: Option<PathBuf>,

    /// Backend executable
    pub backend_binary: Option<PathBuf>,

    /// Per-request deadline in milliseconds
    pub request_timeout_ms: Option<u64>,

    /// Wait after spawning the backend, in milliseconds
    pub startup_grace_ms: Option<u64>,

    pub window_title: Option<String>,

    /// Streaming quality tier (standard, higher, exhigh, lossless, hires)
    pub quality: Option<String>,

    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}

/// Values given on the command line; `None` defers to lower tiers
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub config_file: Option<PathBuf>,
    pub socket_path: Option<PathBuf>,
    pub state_file: Option<PathBuf>,
    pub request_timeout_ms: Option<u64>,
    pub quality: Option<String>,
    pub log_level: Option<String>,
}

/// Fully resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub backend: BackendConfig,
    pub state_file: PathBuf,
    pub quality: Quality,
    pub log_level: String,
}

impl Config {
    /// Read the TOML file (if any) and merge it with `overrides` and the
    /// environment
    pub fn load(overrides: &ConfigOverrides) -> Result<Self> {
        let path = overrides
            .config_file
            .clone()
            .unwrap_or_else(paths::default_config_file);

        let toml = match paths::load_toml::<TomlConfig>(&path)? {
            Some(toml) => {
                debug!("Loaded configuration from {}", path.display());
                toml
            }
            None if overrides.config_file.is_some() => {
                return Err(Error::Config(format!("config file {} not found", path.display())));
            }
            None => TomlConfig::default(),
        };

        Self::from_toml(toml, overrides)
    }

    /// Merge an already-parsed TOML document with `overrides` and the
    /// environment
    pub fn from_toml(toml: TomlConfig, overrides: &ConfigOverrides) -> Result<Self> {
        let endpoint = paths::resolve_path(
            overrides.socket_path.as_deref(),
            ENV_SOCKET,
            toml.socket_path.as_deref(),
            paths::default_endpoint,
        );

        let state_file = paths::resolve_path(
            overrides.state_file.as_deref(),
            ENV_STATE_FILE,
            toml.state_file.as_deref(),
            paths::default_state_file,
        );

        let binary = paths::resolve_path(None, ENV_BACKEND, toml.backend_binary.as_deref(), || {
            PathBuf::from(DEFAULT_BACKEND_BINARY)
        });

        let defaults = BackendConfig::default();
        let request_timeout = overrides
            .request_timeout_ms
            .or(toml.request_timeout_ms)
            .map(Duration::from_millis)
            .unwrap_or(defaults.request_timeout);
        if request_timeout.is_zero() {
            return Err(Error::Config("request timeout must be greater than zero".to_string()));
        }

        let startup_grace = toml
            .startup_grace_ms
            .map(Duration::from_millis)
            .unwrap_or(defaults.startup_grace);

        let quality = match overrides.quality.as_deref().or(toml.quality.as_deref()) {
            Some(name) => name.parse::<Quality>()?,
            None => Quality::default(),
        };

        let log_level = overrides
            .log_level
            .clone()
            .unwrap_or_else(|| toml.logging.level.clone());

        Ok(Self {
            backend: BackendConfig {
                binary,
                endpoint,
                title: toml.window_title.unwrap_or_else(|| DEFAULT_WINDOW_TITLE.to_string()),
                request_timeout,
                startup_grace,
            },
            state_file,
            quality,
            log_level,
        })
    }

    pub fn endpoint(&self) -> &Path {
        &self.backend.endpoint
    }
}
