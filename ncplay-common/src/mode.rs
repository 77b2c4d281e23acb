//! Queue navigation modes

use crate::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::str::FromStr;
use tracing::warn;

/// How the queue picks the next/previous track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayMode {
    /// Play through once, stop at the end
    #[default]
    Sequence,
    /// Wrap around at both ends
    Repeat,
    /// Repeat the current track
    Single,
    /// Random pick on every step
    Shuffle,
}

impl PlayMode {
    pub const ALL: [PlayMode; 4] = [
        PlayMode::Sequence,
        PlayMode::Repeat,
        PlayMode::Single,
        PlayMode::Shuffle,
    ];
}

impl std::fmt::Display for PlayMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlayMode::Sequence => write!(f, "sequence"),
            PlayMode::Repeat => write!(f, "repeat"),
            PlayMode::Single => write!(f, "single"),
            PlayMode::Shuffle => write!(f, "shuffle"),
        }
    }
}

impl FromStr for PlayMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sequence" => Ok(PlayMode::Sequence),
            "repeat" => Ok(PlayMode::Repeat),
            "single" => Ok(PlayMode::Single),
            "shuffle" => Ok(PlayMode::Shuffle),
            other => Err(Error::InvalidInput(format!(
                "invalid mode '{}', expected one of sequence/repeat/single/shuffle",
                other
            ))),
        }
    }
}

/// Deserialize a mode, falling back to the default on unknown or mistyped values.
///
/// Used for persisted state where one bad field must not discard the document.
pub fn deserialize_lenient<'de, D>(deserializer: D) -> std::result::Result<PlayMode, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = serde_json::Value::deserialize(deserializer)?;
    let mode = match raw.as_str().map(str::parse::<PlayMode>) {
        Some(Ok(mode)) => mode,
        _ => {
            warn!("Invalid play mode {} in saved state, using '{}'", raw, PlayMode::default());
            PlayMode::default()
        }
    };
    Ok(mode)
}
