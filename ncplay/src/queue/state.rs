//! Persisted player state
//!
//! One JSON document per user:
//! `{"queue": [...], "currentIndex": -1, "mode": "sequence", "volume": 80}`.
//!
//! Loading fails open: a missing file, unreadable file or malformed document
//! all yield the default state. Individual bad fields are repaired instead of
//! discarding the whole document.

use crate::error::{Error, Result};
use ncplay_common::{PlayMode, Track};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Volume used until the user picks one
pub const DEFAULT_VOLUME: u8 = 80;

/// Upper bound of the volume scale
pub const MAX_VOLUME: u8 = 100;

/// Clamp an arbitrary volume request into `[0, MAX_VOLUME]`
pub fn clamp_volume(level: i64) -> u8 {
    level.clamp(0, MAX_VOLUME as i64) as u8
}

/// The durable queue aggregate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlayerState {
    /// Tracks in play order; duplicates allowed
    pub queue: Vec<Track>,

    /// Position of the current track; `None` is stored as `-1`
    #[serde(with = "index_or_minus_one")]
    pub current_index: Option<usize>,

    #[serde(deserialize_with = "ncplay_common::mode::deserialize_lenient")]
    pub mode: PlayMode,

    #[serde(deserialize_with = "lenient_volume")]
    pub volume: u8,
}

impl Default for PlayerState {
    fn default() -> Self {
        Self {
            queue: Vec::new(),
            current_index: None,
            mode: PlayMode::default(),
            volume: DEFAULT_VOLUME,
        }
    }
}

impl PlayerState {
    /// Repair an index that does not point into the queue
    fn normalize(mut self) -> Self {
        if let Some(index) = self.current_index {
            if index >= self.queue.len() {
                warn!(
                    "Saved current index {} is outside a queue of {} track(s), resetting",
                    index,
                    self.queue.len()
                );
                self.current_index = None;
            }
        }
        self
    }
}

mod index_or_minus_one {
    use super::*;

    pub fn serialize<S: Serializer>(index: &Option<usize>, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match index {
            Some(i) => serializer.serialize_i64(*i as i64),
            None => serializer.serialize_i64(-1),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<usize>, D::Error> {
        let raw = serde_json::Value::deserialize(deserializer)?;
        Ok(raw.as_i64().and_then(|i| usize::try_from(i).ok()))
    }
}

fn lenient_volume<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<u8, D::Error> {
    let raw = serde_json::Value::deserialize(deserializer)?;
    Ok(match raw.as_f64() {
        Some(v) if v.is_finite() => clamp_volume(v.round() as i64),
        _ => DEFAULT_VOLUME,
    })
}

/// File-backed storage for `PlayerState`
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the state document. Never fails; falls back to the default state.
    pub fn load(&self) -> PlayerState {
        let content = match std::fs::read(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No saved state at {}, starting empty", self.path.display());
                return PlayerState::default();
            }
            Err(e) => {
                warn!("Failed to read {}: {}, starting empty", self.path.display(), e);
                return PlayerState::default();
            }
        };

        match serde_json::from_slice::<PlayerState>(&content) {
            Ok(state) => state.normalize(),
            Err(e) => {
                warn!("Ignoring malformed state file {}: {}", self.path.display(), e);
                PlayerState::default()
            }
        }
    }

    /// Write the whole document, replacing the previous one in a single rename
    pub fn save(&self, state: &PlayerState) -> Result<()> {
        let persist_err = |path: &Path| {
            let path = path.display().to_string();
            move |e: std::io::Error| Error::Persistence(format!("{}: {}", path, e))
        };

        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(persist_err(dir))?;
        }

        let json = serde_json::to_vec_pretty(state)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(persist_err(tmp.as_path()))?;
        if let Err(e) = std::fs::rename(&tmp, &self.path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(persist_err(self.path.as_path())(e));
        }
        Ok(())
    }

    /// Delete the state document; absent is fine
    pub fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Persistence(format!("{}: {}", self.path.display(), e))),
        }
    }
}
