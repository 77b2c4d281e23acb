//! Track catalogue seam
//!
//! The catalogue (HTTP API client, credentials, request encryption) lives
//! outside this crate. Playback only needs two things from it: a streamable
//! URL for a track, and the track's metadata.

use crate::error::{Error, Result};
use async_trait::async_trait;
use ncplay_common::{Album, Quality, Track};
use std::path::Path;

/// Streamable location for one track
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayableUrl {
    pub url: String,
    /// Duration in milliseconds, 0 when unknown
    pub duration_ms: u64,
}

/// Catalogue lookups consumed by the queue and playback layers
#[async_trait]
pub trait TrackSource: Send + Sync {
    /// Resolve a streamable URL for `track_id` at the requested quality
    async fn resolve_playable_url(&self, track_id: &str, quality: Quality) -> Result<PlayableUrl>;

    /// Fetch display metadata for `track_id`
    async fn fetch_track_metadata(&self, track_id: &str) -> Result<Track>;
}

/// Source for tracks identified directly by a URL or local file path.
///
/// The id is the playable location; quality tiers do not apply.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectSource;

impl DirectSource {
    /// Build a track for a URL or path without contacting anything
    pub fn track_for(location: &str) -> Track {
        Track {
            id: location.to_string(),
            name: display_name(location),
            artists: Vec::new(),
            album: Album::default(),
            duration: 0,
            uri: location.to_string(),
        }
    }
}

#[async_trait]
impl TrackSource for DirectSource {
    async fn resolve_playable_url(&self, track_id: &str, _quality: Quality) -> Result<PlayableUrl> {
        if track_id.trim().is_empty() {
            return Err(Error::Source("empty track location".to_string()));
        }
        Ok(PlayableUrl {
            url: track_id.to_string(),
            duration_ms: 0,
        })
    }

    async fn fetch_track_metadata(&self, track_id: &str) -> Result<Track> {
        if track_id.trim().is_empty() {
            return Err(Error::Source("empty track location".to_string()));
        }
        Ok(Self::track_for(track_id))
    }
}

/// Last path or URL segment without query string or extension
fn display_name(location: &str) -> String {
    let without_query = location.split(['?', '#']).next().unwrap_or(location);
    let segment = without_query
        .trim_end_matches('/')
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(without_query);

    let stem = Path::new(segment)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    if stem.is_empty() {
        location.to_string()
    } else {
        stem
    }
}
