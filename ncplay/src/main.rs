//! ncplay - command-line player controller
//!
//! Every invocation is short-lived: it connects to (or starts) the backend,
//! performs one operation, prints a JSON result and exits. The backend keeps
//! playing in between. `follow` is the exception; it stays attached and
//! advances through the queue until interrupted.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use ncplay::config::{Config, ConfigOverrides};
use ncplay::playback::{AdvanceReport, PlaybackController, SeekMode};
use ncplay::queue::{QueueManager, StateStore};
use ncplay::session::Session;
use ncplay::source::DirectSource;
use ncplay_common::{PlayMode, Track};
use serde_json::{json, Value};
use tokio::signal;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for ncplay
#[derive(Parser, Debug)]
#[command(name = "ncplay")]
#[command(about = "Control an mpv backend and a persistent play queue")]
#[command(version)]
struct Args {
    /// Configuration file
    #[arg(long, global = true, env = "NCPLAY_CONFIG")]
    config: Option<PathBuf>,

    /// Backend control endpoint (socket path or pipe name)
    #[arg(long, global = true)]
    socket: Option<PathBuf>,

    /// Player state file
    #[arg(long, global = true)]
    state_file: Option<PathBuf>,

    /// Per-request timeout in milliseconds
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    /// Streaming quality (standard, higher, exhigh, lossless, hires)
    #[arg(short, long, global = true)]
    quality: Option<String>,

    /// Log level for stderr output (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Replace the queue with the given URLs or files and play; with none,
    /// play the queue's current track
    Play {
        urls: Vec<String>,
        /// Display title (single URL only)
        #[arg(long)]
        title: Option<String>,
        /// Position to start from
        #[arg(long, default_value_t = 0)]
        start: usize,
    },
    /// Pause playback
    Pause,
    /// Resume playback
    Resume,
    /// Toggle pause
    Toggle,
    /// Stop and unload the current track
    Stop,
    /// Quit the backend
    Quit,
    /// Play the next track
    Next,
    /// Play the previous track
    Prev,
    /// Seek to a position in seconds
    Seek {
        #[arg(allow_hyphen_values = true)]
        seconds: f64,
        /// Offset from the current position instead of the start
        #[arg(long)]
        relative: bool,
    },
    /// Show or set the volume (0-100)
    Volume {
        #[arg(allow_hyphen_values = true)]
        level: Option<i64>,
    },
    /// Show or set the play mode (sequence, repeat, single, shuffle)
    Mode { mode: Option<String> },
    /// Show or set looping of the current track
    Loop { setting: Option<LoopSetting> },
    /// Show playback status
    Status,
    /// Inspect or edit the queue
    #[command(subcommand)]
    Queue(QueueCommand),
    /// Stay attached and advance through the queue until interrupted
    Follow,
}

#[derive(Subcommand, Debug)]
enum QueueCommand {
    /// List queued tracks
    List,
    /// Append URLs or files
    Add {
        #[arg(required = true)]
        urls: Vec<String>,
    },
    /// Remove the track at an index
    Remove { index: usize },
    /// Remove every track
    Clear,
    /// Play the track at an index
    Jump { index: usize },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum LoopSetting {
    On,
    Off,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let pretty = args.pretty;

    let outcome = match load_config(&args) {
        Ok(config) => {
            init_tracing(&config.log_level);
            info!(
                version = env!("CARGO_PKG_VERSION"),
                git = env!("GIT_HASH"),
                built = env!("BUILD_TIMESTAMP"),
                profile = env!("BUILD_PROFILE"),
                "ncplay starting"
            );
            run(args.command, config).await
        }
        Err(e) => Err(e),
    };

    match outcome {
        Ok(data) => {
            print_json(&json!({ "success": true, "data": data, "error": null }), pretty);
            ExitCode::SUCCESS
        }
        Err(e) => {
            let (code, exit) = match e.downcast_ref::<ncplay::Error>() {
                Some(err) => (err.code(), err.exit_code()),
                None => ("ERROR", 1),
            };
            print_json(
                &json!({
                    "success": false,
                    "data": null,
                    "error": { "code": code, "message": format!("{:#}", e) },
                }),
                pretty,
            );
            ExitCode::from(exit as u8)
        }
    }
}

fn load_config(args: &Args) -> Result<Config> {
    let overrides = ConfigOverrides {
        config_file: args.config.clone(),
        socket_path: args.socket.clone(),
        state_file: args.state_file.clone(),
        request_timeout_ms: args.timeout_ms,
        quality: args.quality.clone(),
        log_level: args.log_level.clone(),
    };
    Ok(Config::load(&overrides)?)
}

/// Logs go to stderr so stdout stays machine-readable. `RUST_LOG` wins over
/// the configured level.
fn init_tracing(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("ncplay={level},ncplay_common={level}").into());

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn print_json(value: &Value, pretty: bool) {
    let text = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    match text {
        Ok(text) => println!("{}", text),
        Err(e) => eprintln!("failed to encode output: {}", e),
    }
}

async fn run(command: Commands, config: Config) -> Result<Value> {
    debug!(endpoint = %config.endpoint().display(), state = %config.state_file.display(), "Resolved configuration");

    let controller = Arc::new(PlaybackController::new(config.backend.clone()));
    let queue = QueueManager::open(StateStore::new(&config.state_file));
    let session = Session::new(Arc::clone(&controller), queue, Arc::new(DirectSource), config.quality);

    let data = match command {
        Commands::Play { urls, title, start } => {
            let started = if urls.is_empty() {
                session.play_current().await?
            } else {
                let single = urls.len() == 1;
                let tracks: Vec<Track> = urls
                    .iter()
                    .map(|url| {
                        let mut track = DirectSource::track_for(url);
                        if let (true, Some(title)) = (single, title.as_ref()) {
                            track.name = title.clone();
                        }
                        track
                    })
                    .collect();
                session.play_tracks(tracks, start).await?
            };
            serde_json::to_value(started)?
        }
        Commands::Pause => {
            controller.pause().await?;
            json!({ "paused": true })
        }
        Commands::Resume => {
            controller.resume().await?;
            json!({ "paused": false })
        }
        Commands::Toggle => json!({ "paused": controller.toggle_pause().await? }),
        Commands::Stop => {
            controller.stop().await?;
            json!({ "stopped": true })
        }
        Commands::Quit => {
            session.shutdown().await?;
            json!({ "quit": true })
        }
        Commands::Next => match session.next().await? {
            Some(started) => serde_json::to_value(started)?,
            None => json!({ "message": "end of queue" }),
        },
        Commands::Prev => match session.previous().await? {
            Some(started) => serde_json::to_value(started)?,
            None => json!({ "message": "queue is empty" }),
        },
        Commands::Seek { seconds, relative } => {
            let mode = if relative { SeekMode::Relative } else { SeekMode::Absolute };
            controller.seek(seconds, mode).await?;
            json!({ "seconds": seconds, "mode": mode })
        }
        Commands::Volume { level: Some(level) } => json!({ "volume": session.set_volume(level).await? }),
        Commands::Volume { level: None } => json!({ "volume": session.status().await.playback.volume }),
        Commands::Mode { mode: Some(mode) } => {
            let mode = mode.parse::<PlayMode>().map_err(ncplay::Error::from)?;
            session.set_mode(mode).await?;
            json!({ "mode": mode })
        }
        Commands::Mode { mode: None } => json!({ "mode": session.queue().lock().await.mode() }),
        Commands::Loop { setting: Some(setting) } => {
            let enabled = matches!(setting, LoopSetting::On);
            controller.set_loop(enabled).await?;
            json!({ "loop": enabled })
        }
        Commands::Loop { setting: None } => json!({ "loop": session.status().await.playback.loop_file }),
        Commands::Status => serde_json::to_value(session.status().await)?,
        Commands::Queue(command) => run_queue(command, &session).await?,
        Commands::Follow => follow(&session).await?,
    };

    controller.disconnect().await;
    Ok(data)
}

async fn run_queue(command: QueueCommand, session: &Session<DirectSource>) -> Result<Value> {
    let data = match command {
        QueueCommand::List => {
            let queue = session.queue().lock().await;
            json!({
                "tracks": queue.list(),
                "currentIndex": queue.current_index().map_or(-1, |i| i as i64),
                "mode": queue.mode(),
            })
        }
        QueueCommand::Add { urls } => {
            let mut queue = session.queue().lock().await;
            queue.add_all(urls.iter().map(|url| DirectSource::track_for(url)))?;
            json!({ "added": urls.len(), "length": queue.len() })
        }
        QueueCommand::Remove { index } => {
            let removed = session.queue().lock().await.remove(index)?;
            json!({ "removed": removed })
        }
        QueueCommand::Clear => {
            session.queue().lock().await.clear()?;
            json!({ "cleared": true })
        }
        QueueCommand::Jump { index } => serde_json::to_value(session.play_index(index).await?)?,
    };
    Ok(data)
}

async fn follow(session: &Session<DirectSource>) -> Result<Value> {
    let advance = session.spawn_auto_advance().await?;
    let mut reports = advance.subscribe();
    let mut advanced = 0usize;

    info!("Following backend events, press Ctrl+C to stop");

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                advance.abort();
                break;
            }
            report = reports.recv() => match report {
                Ok(report) => {
                    if let AdvanceReport::Started { .. } = report {
                        advanced += 1;
                    }
                    print_json(&json!({ "event": report }), false);
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            },
        }
    }

    advance.join().await;
    Ok(json!({ "advanced": advanced }))
}

/// Ctrl+C, or SIGTERM on Unix
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received terminate signal, shutting down"),
    }
}
