//! Playback controller
//!
//! High-level transport operations expressed as backend commands and
//! property reads/writes. The controller owns at most one live connection;
//! operations that need the backend start it when it is not running, while
//! read-only queries (`get_status`, `stop`) never do.

use crate::error::{Error, Result};
use crate::ipc::{endpoint, BackendEvent, IpcClient};
use crate::playback::backend::{spawn_backend, BackendConfig};
use crate::playback::status::{parse_loop_flag, PlaybackStatus, SeekMode};
use crate::queue::state::{clamp_volume, DEFAULT_VOLUME};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Interval between connection attempts while a fresh backend starts up
const STARTUP_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Loop value understood by the backend as "forever"
const LOOP_FOREVER: &str = "inf";

/// Controls one backend instance through its control endpoint
pub struct PlaybackController {
    config: BackendConfig,
    client: tokio::sync::Mutex<Option<IpcClient>>,
    /// Title of the last track loaded through this controller
    now_playing: Mutex<Option<String>>,
    /// Last volume set or read, reported while nothing is loaded
    last_volume: AtomicU8,
}

impl std::fmt::Debug for PlaybackController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackController")
            .field("config", &self.config)
            .field("now_playing", &self.now_playing())
            .finish()
    }
}

impl PlaybackController {
    pub fn new(config: BackendConfig) -> Self {
        Self {
            config,
            client: tokio::sync::Mutex::new(None),
            now_playing: Mutex::new(None),
            last_volume: AtomicU8::new(DEFAULT_VOLUME),
        }
    }

    /// Controller bound to an existing connection
    pub fn with_client(config: BackendConfig, client: IpcClient) -> Self {
        Self {
            client: tokio::sync::Mutex::new(Some(client)),
            ..Self::new(config)
        }
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    fn title_slot(&self) -> MutexGuard<'_, Option<String>> {
        self.now_playing.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Title of the track most recently loaded through this controller
    pub fn now_playing(&self) -> Option<String> {
        self.title_slot().clone()
    }

    // ----- Connection management -------------------------------------------

    /// Start the backend unless its endpoint already exists
    pub async fn ensure_backend_running(&self) -> Result<()> {
        if endpoint::endpoint_exists(&self.config.endpoint) {
            return Ok(());
        }
        spawn_backend(&self.config)?;
        tokio::time::sleep(self.config.startup_grace).await;
        Ok(())
    }

    /// Connect to an already-running backend; never spawns.
    ///
    /// Reuses the live connection when there is one.
    pub async fn attach(&self) -> Result<IpcClient> {
        let mut slot = self.client.lock().await;
        if let Some(client) = slot.as_ref() {
            if !client.is_closed() {
                return Ok(client.clone());
            }
            debug!("Previous backend connection closed, reconnecting");
        }

        let client = IpcClient::connect(&self.config.endpoint, self.config.request_timeout).await?;
        *slot = Some(client.clone());
        Ok(client)
    }

    /// Connect, starting the backend first when nothing is listening.
    ///
    /// A stale endpoint left by a dead backend is removed before the spawn.
    pub async fn connect(&self) -> Result<IpcClient> {
        match self.attach().await {
            Err(Error::BackendNotRunning(_)) => {}
            other => return other,
        }

        endpoint::remove_stale(&self.config.endpoint)?;
        self.ensure_backend_running().await?;

        let deadline = tokio::time::Instant::now() + self.config.request_timeout;
        loop {
            match self.attach().await {
                Err(Error::BackendNotRunning(_)) if tokio::time::Instant::now() < deadline => {
                    tokio::time::sleep(STARTUP_POLL_INTERVAL).await;
                }
                other => return other,
            }
        }
    }

    /// Drop the connection without touching the backend
    pub async fn disconnect(&self) {
        if let Some(client) = self.client.lock().await.take() {
            client.disconnect().await;
        }
    }

    /// Events from the backend, connecting (and spawning) if needed
    pub async fn subscribe_events(&self) -> Result<broadcast::Receiver<BackendEvent>> {
        Ok(self.connect().await?.subscribe_events())
    }

    // ----- Raw access -------------------------------------------------------

    /// Send an arbitrary command
    pub async fn command(&self, name: &str, args: Vec<Value>) -> Result<Value> {
        self.connect().await?.send_command(name, args).await
    }

    pub async fn get_property(&self, name: &str) -> Result<Value> {
        self.command("get_property", vec![json!(name)]).await
    }

    pub async fn set_property(&self, name: &str, value: Value) -> Result<()> {
        self.command("set_property", vec![json!(name), value]).await?;
        Ok(())
    }

    // ----- Transport --------------------------------------------------------

    /// Replace whatever is playing with `url`
    pub async fn play_track_url(&self, url: &str, title: Option<&str>) -> Result<()> {
        if url.trim().is_empty() {
            return Err(Error::InvalidInput("empty playback URL".to_string()));
        }
        self.command("loadfile", vec![json!(url), json!("replace")]).await?;
        info!(url, "Loaded track");
        *self.title_slot() = title.map(str::to_string);
        Ok(())
    }

    pub async fn pause(&self) -> Result<()> {
        self.set_property("pause", json!(true)).await
    }

    pub async fn resume(&self) -> Result<()> {
        self.set_property("pause", json!(false)).await
    }

    /// Flip the pause state; returns the new value (true = paused)
    pub async fn toggle_pause(&self) -> Result<bool> {
        let paused = self.get_property("pause").await?;
        let paused = paused
            .as_bool()
            .ok_or_else(|| Error::Protocol(format!("pause property is not a boolean: {}", paused)))?;
        self.set_property("pause", json!(!paused)).await?;
        Ok(!paused)
    }

    pub async fn seek(&self, offset_seconds: f64, mode: SeekMode) -> Result<()> {
        if !offset_seconds.is_finite() {
            return Err(Error::InvalidInput(format!("invalid seek offset {}", offset_seconds)));
        }
        self.command("seek", vec![json!(offset_seconds), json!(mode.as_str())])
            .await?;
        Ok(())
    }

    /// Set the output volume, clamped to 0..=100. Returns the applied level.
    pub async fn set_volume(&self, level: i64) -> Result<u8> {
        let volume = clamp_volume(level);
        self.set_property("volume", json!(volume)).await?;
        self.last_volume.store(volume, Ordering::Relaxed);
        Ok(volume)
    }

    pub async fn get_volume(&self) -> Result<u8> {
        let raw = self.get_property("volume").await?;
        let volume = raw
            .as_f64()
            .map(|v| clamp_volume(v.round() as i64))
            .ok_or_else(|| Error::Protocol(format!("volume property is not a number: {}", raw)))?;
        self.last_volume.store(volume, Ordering::Relaxed);
        Ok(volume)
    }

    /// Loop the current file forever, or stop looping
    pub async fn set_loop(&self, enabled: bool) -> Result<()> {
        let value = if enabled { json!(LOOP_FOREVER) } else { json!("no") };
        self.set_property("loop-file", value).await
    }

    pub async fn get_loop(&self) -> Result<bool> {
        Ok(parse_loop_flag(&self.get_property("loop-file").await?))
    }

    /// Stop playback and unload the file. A backend that is not running is
    /// already stopped.
    pub async fn stop(&self) -> Result<()> {
        let client = match self.attach().await {
            Ok(client) => client,
            Err(Error::BackendNotRunning(_)) => {
                debug!("Stop requested with no backend running");
                self.title_slot().take();
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        client.send_command("stop", vec![]).await?;
        self.title_slot().take();
        Ok(())
    }

    /// Tell the backend to exit and clean up its endpoint.
    ///
    /// Idempotent: nothing running is success.
    pub async fn shutdown(&self) -> Result<()> {
        match self.attach().await {
            Ok(client) => {
                match client.send_command("quit", vec![]).await {
                    // The backend may hang up before replying
                    Ok(_) | Err(Error::ConnectionClosed) => {}
                    Err(e) => warn!("Backend did not acknowledge quit: {}", e),
                }
                self.disconnect().await;
            }
            Err(Error::BackendNotRunning(_)) => debug!("Shutdown requested with no backend running"),
            Err(e) => return Err(e),
        }

        self.title_slot().take();
        endpoint::remove_stale(&self.config.endpoint)?;
        info!("Backend shut down");
        Ok(())
    }

    // ----- Status -----------------------------------------------------------

    /// Snapshot of the backend. Never spawns it.
    ///
    /// A backend that is not running, or any property that cannot be read,
    /// degrades to the idle defaults instead of failing.
    pub async fn get_status(&self) -> PlaybackStatus {
        let fallback_volume = self.last_volume.load(Ordering::Relaxed);
        let client = match self.attach().await {
            Ok(client) => client,
            Err(e) => {
                debug!("Status without a backend connection: {}", e);
                return PlaybackStatus::idle(fallback_volume);
            }
        };

        let idle = read_property(&client, "idle-active").await.and_then(|v| v.as_bool());
        if idle.unwrap_or(true) {
            return PlaybackStatus::idle(fallback_volume);
        }

        let (paused, position, duration, volume, loop_file) = tokio::join!(
            read_property(&client, "pause"),
            read_property(&client, "time-pos"),
            read_property(&client, "duration"),
            read_property(&client, "volume"),
            read_property(&client, "loop-file"),
        );

        let volume = volume
            .and_then(|v| v.as_f64())
            .map(|v| clamp_volume(v.round() as i64))
            .unwrap_or(fallback_volume);
        self.last_volume.store(volume, Ordering::Relaxed);

        PlaybackStatus {
            loaded: true,
            paused: paused.and_then(|v| v.as_bool()).unwrap_or(true),
            position: position.and_then(|v| v.as_f64()).unwrap_or(0.0),
            duration: duration.and_then(|v| v.as_f64()).unwrap_or(0.0),
            volume,
            loop_file: loop_file.map(|v| parse_loop_flag(&v)).unwrap_or(false),
            title: self.now_playing(),
        }
    }
}

/// Property read that swallows failures; `None` means "use the default"
async fn read_property(client: &IpcClient, name: &str) -> Option<Value> {
    match client.send_command("get_property", vec![json!(name)]).await {
        Ok(Value::Null) => None,
        Ok(value) => Some(value),
        Err(e) => {
            debug!(property = name, "Property unavailable: {}", e);
            None
        }
    }
}
