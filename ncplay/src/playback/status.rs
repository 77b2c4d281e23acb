//! Playback status snapshot and seek addressing

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// How a seek offset is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeekMode {
    /// Offset is a position from the start of the track
    #[default]
    Absolute,
    /// Offset is added to the current position
    Relative,
}

impl SeekMode {
    /// Name understood by the backend's `seek` command
    pub fn as_str(&self) -> &'static str {
        match self {
            SeekMode::Absolute => "absolute",
            SeekMode::Relative => "relative",
        }
    }
}

impl fmt::Display for SeekMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SeekMode {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "absolute" => Ok(SeekMode::Absolute),
            "relative" => Ok(SeekMode::Relative),
            other => Err(crate::Error::InvalidInput(format!("unknown seek mode '{}'", other))),
        }
    }
}

/// Point-in-time view of the backend.
///
/// Every field degrades to its default when the matching property cannot be
/// read, so a snapshot is always produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackStatus {
    /// A file is loaded (backend not idle)
    pub loaded: bool,
    pub paused: bool,
    /// Seconds from the start of the track
    pub position: f64,
    /// Track length in seconds, 0 when unknown
    pub duration: f64,
    pub volume: u8,
    /// Current file loops forever
    pub loop_file: bool,
    /// Title of the last track this process loaded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl PlaybackStatus {
    /// Snapshot for a backend with nothing loaded (or not running at all)
    pub fn idle(volume: u8) -> Self {
        Self {
            loaded: false,
            paused: true,
            position: 0.0,
            duration: 0.0,
            volume,
            loop_file: false,
            title: None,
        }
    }

    /// Loaded and not paused
    pub fn is_playing(&self) -> bool {
        self.loaded && !self.paused
    }

    /// Fraction of the track played, in `[0, 1]`
    pub fn progress(&self) -> f64 {
        if self.duration > 0.0 && self.position.is_finite() {
            (self.position / self.duration).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

/// Interpret the backend's `loop-file` property.
///
/// The backend reports `"inf"`, `"no"`, a loop count, or a boolean.
pub fn parse_loop_flag(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => !matches!(s.as_str(), "no" | "false" | "0" | ""),
        Value::Number(n) => n.as_f64().is_some_and(|n| n > 0.0),
        _ => false,
    }
}
