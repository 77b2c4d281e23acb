//! Auto-advance on end of media
//!
//! Listens to backend events and, when a track plays to its end, asks the
//! queue for the next track and loads it. Only natural ends advance: a
//! `stop`, an error or a replacement load also produce `end-file`, but with a
//! different reason.

use crate::error::Result;
use crate::ipc::BackendEvent;
use crate::playback::controller::PlaybackController;
use crate::queue::QueueManager;
use crate::source::TrackSource;
use ncplay_common::{Quality, Track};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Buffered reports per subscriber
const REPORT_CHANNEL_CAPACITY: usize = 16;

/// Outcome of one end-of-media event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum AdvanceReport {
    /// Next track was loaded
    Started {
        index: usize,
        #[serde(rename = "trackId")]
        track_id: String,
    },
    /// Queue had nothing further to play
    QueueFinished,
    /// Next track could not be resolved or loaded
    Failed {
        #[serde(rename = "trackId")]
        track_id: Option<String>,
        message: String,
    },
}

/// Handle to a running auto-advance task
pub struct AutoAdvance {
    handle: JoinHandle<()>,
    /// Only the task holds the sender, so receivers close when it ends
    reports: broadcast::Receiver<AdvanceReport>,
}

impl AutoAdvance {
    /// Start listening on `events`.
    ///
    /// The task ends when the event stream closes (backend gone) or when
    /// aborted. Failures are logged and reported; they never stop the task.
    pub fn spawn<S: TrackSource + 'static>(
        controller: Arc<PlaybackController>,
        events: broadcast::Receiver<BackendEvent>,
        queue: Arc<Mutex<QueueManager>>,
        source: Arc<S>,
        quality: Quality,
    ) -> Self {
        let (task_reports, reports) = broadcast::channel(REPORT_CHANNEL_CAPACITY);

        let handle = tokio::spawn(async move {
            run(controller, events, queue, source, quality, task_reports).await;
        });

        Self { handle, reports }
    }

    /// Reports produced after this call; closed once the task ends
    pub fn subscribe(&self) -> broadcast::Receiver<AdvanceReport> {
        self.reports.resubscribe()
    }

    pub fn abort(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the task to end
    pub async fn join(self) {
        if let Err(e) = self.handle.await {
            if !e.is_cancelled() {
                warn!("Auto-advance task failed: {}", e);
            }
        }
    }
}

async fn run<S: TrackSource>(
    controller: Arc<PlaybackController>,
    mut events: broadcast::Receiver<BackendEvent>,
    queue: Arc<Mutex<QueueManager>>,
    source: Arc<S>,
    quality: Quality,
    reports: broadcast::Sender<AdvanceReport>,
) {
    debug!("Auto-advance listening for end of media");

    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!("Auto-advance missed {} backend event(s)", skipped);
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => {
                debug!("Backend event stream closed, auto-advance stopping");
                break;
            }
        };

        if !event.is_end_of_media() {
            debug!(event = %event.name, reason = ?event.reason(), "Ignoring backend event");
            continue;
        }

        let report = advance(&controller, &queue, source.as_ref(), quality).await;
        match &report {
            AdvanceReport::Started { index, track_id } => {
                info!(index, track_id = %track_id, "Advanced to next track")
            }
            AdvanceReport::QueueFinished => info!("Reached end of queue"),
            AdvanceReport::Failed { track_id, message } => {
                warn!(track_id = ?track_id, "Auto-advance failed: {}", message)
            }
        }
        // No subscribers is fine
        let _ = reports.send(report);
    }
}

async fn advance<S: TrackSource + ?Sized>(
    controller: &PlaybackController,
    queue: &Mutex<QueueManager>,
    source: &S,
    quality: Quality,
) -> AdvanceReport {
    // Queue lock is released before any backend round trip
    let next = {
        let mut queue = queue.lock().await;
        queue.reload();
        match queue.next() {
            Ok(Some(track)) => queue.current_index().map(|index| (index, track)),
            Ok(None) => None,
            Err(e) => {
                return AdvanceReport::Failed {
                    track_id: None,
                    message: e.to_string(),
                }
            }
        }
    };

    let Some((index, track)) = next else {
        return AdvanceReport::QueueFinished;
    };

    match load(controller, source, &track, quality).await {
        Ok(()) => AdvanceReport::Started {
            index,
            track_id: track.id,
        },
        Err(e) => AdvanceReport::Failed {
            track_id: Some(track.id),
            message: e.to_string(),
        },
    }
}

/// Resolve `track` through the source and hand it to the backend
pub(crate) async fn load<S: TrackSource + ?Sized>(
    controller: &PlaybackController,
    source: &S,
    track: &Track,
    quality: Quality,
) -> Result<()> {
    let playable = source.resolve_playable_url(&track.id, quality).await?;
    controller.play_track_url(&playable.url, Some(&display_title(track))).await
}

/// "Artist - Name", or just the name when there are no artists
pub(crate) fn display_title(track: &Track) -> String {
    let artists = track.artist_names();
    if artists.is_empty() {
        track.name.clone()
    } else {
        format!("{} - {}", artists, track.name)
    }
}
