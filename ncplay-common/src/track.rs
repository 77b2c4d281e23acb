//! Track metadata and queue projections
//!
//! Tracks are supplied by an external catalogue and are never modified once
//! obtained; the queue only stores and reorders them.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Track artist
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Artist {
    #[serde(default)]
    pub id: String,
    pub name: String,
}

/// Album reference carried by a track
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Album {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Cover art location, when the catalogue provides one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pic_url: Option<String>,
}

/// A playable track
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    /// Opaque catalogue identifier
    pub id: String,

    /// Display name
    pub name: String,

    /// Artists in credit order
    #[serde(default)]
    pub artists: Vec<Artist>,

    #[serde(default)]
    pub album: Album,

    /// Duration in milliseconds
    #[serde(default)]
    pub duration: u64,

    /// Playable resource locator
    #[serde(default)]
    pub uri: String,
}

impl Track {
    /// Artist names joined for display ("A, B")
    pub fn artist_names(&self) -> String {
        self.artists
            .iter()
            .map(|a| a.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// A track paired with its zero-based position in the queue at read time
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueItem {
    pub index: usize,
    pub track: Track,
}

/// Streaming quality tier requested from the catalogue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Standard,
    Higher,
    #[default]
    Exhigh,
    Lossless,
    Hires,
}

impl Quality {
    /// Bitrate in bits per second requested for this tier
    pub fn bitrate(self) -> u32 {
        match self {
            Quality::Standard => 128_000,
            Quality::Higher => 192_000,
            Quality::Exhigh => 320_000,
            Quality::Lossless | Quality::Hires => 999_000,
        }
    }
}

impl std::fmt::Display for Quality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Quality::Standard => write!(f, "standard"),
            Quality::Higher => write!(f, "higher"),
            Quality::Exhigh => write!(f, "exhigh"),
            Quality::Lossless => write!(f, "lossless"),
            Quality::Hires => write!(f, "hires"),
        }
    }
}

impl FromStr for Quality {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "standard" => Ok(Quality::Standard),
            "higher" => Ok(Quality::Higher),
            "exhigh" => Ok(Quality::Exhigh),
            "lossless" => Ok(Quality::Lossless),
            "hires" => Ok(Quality::Hires),
            other => Err(Error::InvalidInput(format!(
                "unknown quality '{}' (expected standard/higher/exhigh/lossless/hires)",
                other
            ))),
        }
    }
}
