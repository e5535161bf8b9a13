/// Cadence - queue playback driver for the simulated media engine
mod config;
mod playlist;

use cadence_engine_sim::SimulatedEngineFactory;
use cadence_playback::{
    format_duration, PlaybackController, PlaybackEvent, PlaybackState, RepeatMode, TrackQueue,
};
use clap::{Parser, Subcommand, ValueEnum};
use crate::config::CliConfig;
use crate::playlist::Playlist;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "cadence")]
#[command(about = "Play track queues through the Cadence playback controller", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a playlist on the simulated engine
    Play {
        /// Playlist JSON file
        playlist: PathBuf,

        /// Configuration file path
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Repeat mode
        #[arg(short, long, value_enum)]
        repeat: Option<RepeatArg>,

        /// Start with shuffle enabled
        #[arg(short, long)]
        shuffle: bool,

        /// Index to start playing from
        #[arg(long, default_value_t = 0)]
        start: usize,

        /// Give up after this many seconds
        #[arg(long, env = "CADENCE_TIMEOUT_SECS")]
        timeout_secs: Option<u64>,
    },
    /// Print the play order of a playlist
    Inspect {
        /// Playlist JSON file
        playlist: PathBuf,

        /// Show the shuffled order
        #[arg(short, long)]
        shuffle: bool,

        /// Seed for the shuffled order
        #[arg(long)]
        seed: Option<u64>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum RepeatArg {
    Off,
    One,
    All,
}

impl From<RepeatArg> for RepeatMode {
    fn from(arg: RepeatArg) -> Self {
        match arg {
            RepeatArg::Off => RepeatMode::Off,
            RepeatArg::One => RepeatMode::One,
            RepeatArg::All => RepeatMode::All,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "cadence_cli=info,cadence_playback=info,cadence_engine_sim=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Play {
            playlist,
            config,
            repeat,
            shuffle,
            start,
            timeout_secs,
        } => {
            let mut config = CliConfig::load(config.as_deref())?;
            if let Some(repeat) = repeat {
                config.playback.repeat = repeat.into();
            }
            if shuffle {
                config.playback.shuffle = true;
            }
            config.validate()?;

            play(&playlist, config, start, timeout_secs.map(Duration::from_secs)).await?;
        }
        Commands::Inspect {
            playlist,
            shuffle,
            seed,
        } => {
            inspect(&playlist, shuffle, seed)?;
        }
    }

    Ok(())
}

/// Why the monitor loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Finish {
    QueueEnded,
    TimedOut,
    Interrupted,
    ControllerGone,
    NothingPlayable,
}

async fn play(
    path: &Path,
    config: CliConfig,
    start: usize,
    timeout: Option<Duration>,
) -> anyhow::Result<()> {
    let playlist = Playlist::from_file(path)?;
    tracing::info!(
        "Loaded playlist '{}' with {} tracks",
        playlist.name,
        playlist.tracks.len()
    );

    let factory = Arc::new(SimulatedEngineFactory::new(
        playlist.catalog(),
        config.engine.clone(),
    ));
    let controller = PlaybackController::spawn(factory, config.playback.clone())?;
    let states = controller.subscribe_state();
    let events = controller.subscribe_events();

    controller
        .initialize(|| tracing::debug!("Player ready"))
        .await?;
    controller.set_tracks(playlist.tracks()).await?;
    controller.play(start).await?;

    let finish = monitor(&controller, states, events, &playlist, timeout).await;
    tracing::info!("Stopping playback: {:?}", finish);

    controller.release_player().await?;
    Ok(())
}

/// Print playback until the queue ends
///
/// The controller halts auto-advance on a failed track, so the driver
/// skips it itself.
async fn monitor(
    controller: &PlaybackController,
    mut states: watch::Receiver<PlaybackState>,
    mut events: broadcast::Receiver<PlaybackEvent>,
    playlist: &Playlist,
    timeout: Option<Duration>,
) -> Finish {
    let mut last_line = String::new();
    let mut consecutive_errors = 0;

    let deadline = tokio::time::sleep(timeout.unwrap_or(Duration::MAX));
    let interrupt = tokio::signal::ctrl_c();
    tokio::pin!(deadline, interrupt);

    loop {
        tokio::select! {
            changed = states.changed() => {
                if changed.is_err() {
                    return Finish::ControllerGone;
                }
                let state = states.borrow_and_update().clone();
                let line = status_line(&state);
                // Only print when the visible status changes
                if line != last_line {
                    println!("{}", line);
                    last_line = line;
                }
            }
            event = events.recv() => match event {
                Ok(PlaybackEvent::QueueEnded) => {
                    println!("queue ended");
                    return Finish::QueueEnded;
                }
                Ok(PlaybackEvent::TrackChanged { track_id, .. }) => {
                    let title = playlist
                        .tracks
                        .iter()
                        .find(|entry| entry.id == track_id)
                        .map(|entry| entry.title.as_str())
                        .unwrap_or("");
                    println!(
                        "now playing: {} {} [{}]",
                        track_id,
                        title,
                        format_duration(playlist.duration_of(&track_id))
                    );
                }
                Ok(PlaybackEvent::Error { message }) => {
                    tracing::warn!("Playback error: {}", message);
                    consecutive_errors += 1;
                    if consecutive_errors >= playlist.tracks.len() {
                        return Finish::NothingPlayable;
                    }
                    println!("skipping unplayable track");
                    if let Err(e) = controller.skip_to_next().await {
                        tracing::warn!("Skip failed: {}", e);
                        return Finish::ControllerGone;
                    }
                }
                Ok(PlaybackEvent::TrackFinished { track_id }) => {
                    consecutive_errors = 0;
                    tracing::debug!("Finished {}", track_id);
                }
                Ok(event) => {
                    tracing::debug!("Event: {:?}", event);
                }
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!("Missed {} playback events", missed);
                }
                Err(RecvError::Closed) => return Finish::ControllerGone,
            },
            _ = &mut deadline, if timeout.is_some() => return Finish::TimedOut,
            _ = &mut interrupt => return Finish::Interrupted,
        }
    }
}

fn status_line(state: &PlaybackState) -> String {
    let flag = if state.has_error {
        "error"
    } else if state.is_loading {
        "loading"
    } else if state.is_playing {
        "playing"
    } else {
        "paused"
    };

    format!(
        "{:>7} {} / {} repeat={:?} shuffle={}",
        flag,
        state.time_label(),
        state.duration_label(),
        state.repeat_mode,
        if state.is_shuffle_mode_on { "on" } else { "off" }
    )
}

fn inspect(path: &Path, shuffle: bool, seed: Option<u64>) -> anyhow::Result<()> {
    let playlist = Playlist::from_file(path)?;

    let rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let mut queue = TrackQueue::with_rng(rng);
    queue.set_shuffle(shuffle);
    queue.set_tracks(playlist.tracks())?;

    println!("{} ({} tracks)", playlist.name, queue.len());
    let mut total = Duration::ZERO;
    for (position, track) in queue.play_order().enumerate() {
        let duration = playlist.duration_of(&track.id);
        total += duration;
        println!(
            "{:>3}. {:<24} {:<20} {:>6}",
            position + 1,
            track.metadata.title,
            track.metadata.artist,
            format_duration(duration)
        );
    }
    println!("total {}", format_duration(total));

    Ok(())
}
