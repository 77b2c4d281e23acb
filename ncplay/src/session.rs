//! Player session
//!
//! Couples the playback controller, the persisted queue and the track source.
//! The controller knows nothing about queues and the queue knows nothing about
//! the backend; the session is where "play the current track" turns into a
//! URL resolution followed by a load.

use crate::error::{Error, Result};
use crate::playback::advance::{self, AutoAdvance};
use crate::playback::{PlaybackController, PlaybackStatus};
use crate::queue::QueueManager;
use crate::source::TrackSource;
use ncplay_common::human_time::format_clock;
use ncplay_common::{PlayMode, Quality, Track};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

/// Compact track description used in status output
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackSummary {
    pub id: String,
    pub name: String,
    pub artist: String,
}

impl From<&Track> for TrackSummary {
    fn from(track: &Track) -> Self {
        Self {
            id: track.id.clone(),
            name: track.name.clone(),
            artist: track.artist_names(),
        }
    }
}

/// Backend snapshot combined with queue position
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    #[serde(flatten)]
    pub playback: PlaybackStatus,
    pub playing: bool,
    pub track: Option<TrackSummary>,
    pub mode: PlayMode,
    pub queue_length: usize,
    /// Position in the queue, -1 when none
    pub current_index: i64,
    pub position_formatted: String,
    pub duration_formatted: String,
}

/// A track that was just handed to the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Started {
    pub index: usize,
    pub track: Track,
}

pub struct Session<S> {
    controller: Arc<PlaybackController>,
    queue: Arc<Mutex<QueueManager>>,
    source: Arc<S>,
    quality: Quality,
    /// Persisted volume is pushed to the backend before the first load only
    volume_applied: AtomicBool,
}

impl<S: TrackSource + 'static> Session<S> {
    pub fn new(controller: Arc<PlaybackController>, queue: QueueManager, source: Arc<S>, quality: Quality) -> Self {
        Self {
            controller,
            queue: Arc::new(Mutex::new(queue)),
            source,
            quality,
            volume_applied: AtomicBool::new(false),
        }
    }

    pub fn controller(&self) -> &Arc<PlaybackController> {
        &self.controller
    }

    pub fn queue(&self) -> &Arc<Mutex<QueueManager>> {
        &self.queue
    }

    pub fn quality(&self) -> Quality {
        self.quality
    }

    /// Replace the queue with `tracks` and start playing at `start_index`
    pub async fn play_tracks(&self, tracks: Vec<Track>, start_index: usize) -> Result<Started> {
        if tracks.is_empty() {
            return Err(Error::InvalidInput("nothing to play".to_string()));
        }
        self.fresh_queue().await.set_queue(tracks, start_index)?;
        self.play_current().await
    }

    /// Load the queue's current track
    pub async fn play_current(&self) -> Result<Started> {
        let (index, track) = {
            let queue = self.fresh_queue().await;
            match (queue.current_index(), queue.current()) {
                (Some(index), Some(track)) => (index, track.clone()),
                _ => return Err(Error::InvalidInput("no current track in queue".to_string())),
            }
        };
        self.load(&track).await?;
        Ok(Started { index, track })
    }

    /// Jump to `index` and play it
    pub async fn play_index(&self, index: usize) -> Result<Started> {
        self.fresh_queue().await.set_current_index(index)?;
        self.play_current().await
    }

    /// Step forward per the play mode. `None` at the end of the queue.
    pub async fn next(&self) -> Result<Option<Started>> {
        let chosen = self.fresh_queue().await.next()?;
        self.play_chosen(chosen).await
    }

    /// Step back per the play mode. `None` when the queue is empty.
    pub async fn previous(&self) -> Result<Option<Started>> {
        let chosen = self.fresh_queue().await.previous()?;
        self.play_chosen(chosen).await
    }

    /// Lock the queue and pick up changes another process saved since
    async fn fresh_queue(&self) -> MutexGuard<'_, QueueManager> {
        let mut queue = self.queue.lock().await;
        queue.reload();
        queue
    }

    async fn play_chosen(&self, chosen: Option<Track>) -> Result<Option<Started>> {
        match chosen {
            Some(_) => self.play_current().await.map(Some),
            None => Ok(None),
        }
    }

    async fn load(&self, track: &Track) -> Result<()> {
        if !self.volume_applied.swap(true, Ordering::Relaxed) {
            let volume = self.queue.lock().await.volume();
            if let Err(e) = self.controller.set_volume(volume as i64).await {
                warn!("Could not apply saved volume {}: {}", volume, e);
            }
        }
        debug!(track_id = %track.id, "Loading track");
        advance::load(&self.controller, self.source.as_ref(), track, self.quality).await
    }

    /// Set backend volume and remember it for the next session
    pub async fn set_volume(&self, level: i64) -> Result<u8> {
        let applied = self.controller.set_volume(level).await?;
        self.fresh_queue().await.set_volume(applied as i64)?;
        self.volume_applied.store(true, Ordering::Relaxed);
        Ok(applied)
    }

    pub async fn set_mode(&self, mode: PlayMode) -> Result<()> {
        self.fresh_queue().await.set_mode(mode)
    }

    /// Backend snapshot plus queue position. Never spawns the backend.
    pub async fn status(&self) -> SessionStatus {
        let mut playback = self.controller.get_status().await;
        let queue = self.fresh_queue().await;

        if !playback.loaded {
            playback.volume = queue.volume();
        }

        SessionStatus {
            playing: playback.is_playing(),
            track: queue.current().map(TrackSummary::from),
            mode: queue.mode(),
            queue_length: queue.len(),
            current_index: queue.current_index().map_or(-1, |i| i as i64),
            position_formatted: format_clock(playback.position),
            duration_formatted: format_clock(playback.duration),
            playback,
        }
    }

    /// Advance through the queue whenever the backend finishes a track
    pub async fn spawn_auto_advance(&self) -> Result<AutoAdvance> {
        let events = self.controller.subscribe_events().await?;
        Ok(AutoAdvance::spawn(
            Arc::clone(&self.controller),
            events,
            Arc::clone(&self.queue),
            Arc::clone(&self.source),
            self.quality,
        ))
    }

    /// Quit the backend; the queue stays on disk
    pub async fn shutdown(&self) -> Result<()> {
        self.controller.shutdown().await
    }
}
