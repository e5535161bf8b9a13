//! Core types for playback synchronization

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{PlaybackError, Result};
use crate::format::format_duration;

/// A playable item in the queue
///
/// Immutable once the queue is set. The `id` must be unique within a queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    /// Unique track identifier within the queue
    pub id: String,

    /// Playable location handed to the native engine
    pub uri: String,

    /// Display metadata
    pub metadata: TrackMetadata,
}

/// Display metadata for a track
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackMetadata {
    /// Track title
    pub title: String,

    /// Artist name
    pub artist: String,

    /// Album title
    pub album_title: String,

    /// Artwork reference (URI or path)
    pub artwork_uri: String,
}

impl Track {
    pub fn new(id: impl Into<String>, uri: impl Into<String>, metadata: TrackMetadata) -> Self {
        Self {
            id: id.into(),
            uri: uri.into(),
            metadata,
        }
    }
}

/// Repeat mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    /// Stop when the queue ends
    #[default]
    Off,

    /// Loop the current track only
    One,

    /// Loop the entire queue
    All,
}

impl RepeatMode {
    /// Next mode in the toggle cycle: Off -> One -> All -> Off
    pub fn toggled(self) -> Self {
        match self {
            RepeatMode::Off => RepeatMode::One,
            RepeatMode::One => RepeatMode::All,
            RepeatMode::All => RepeatMode::Off,
        }
    }
}

/// Playback progress within the current track
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    /// Fraction of the track played, always within `[0, 1]`
    pub position: f32,

    /// Elapsed time in the current track
    pub time: Duration,

    /// Emission tick, bumped on every snapshot so identical progress
    /// values still reach "distinct values only" observers
    pub timestamp: u64,
}

impl Progress {
    /// Build progress for `time` out of `duration`
    ///
    /// An unknown (zero) duration yields position 0.
    pub fn at(time: Duration, duration: Duration) -> Self {
        let position = if duration.is_zero() {
            0.0
        } else {
            (time.as_secs_f64() / duration.as_secs_f64()) as f32
        };

        Self {
            position: clamp_position(position),
            time,
            timestamp: 0,
        }
    }
}

/// Clamp a progress fraction into `[0, 1]`, mapping NaN to 0
pub(crate) fn clamp_position(position: f32) -> f32 {
    if position.is_nan() {
        0.0
    } else {
        position.clamp(0.0, 1.0)
    }
}

/// Observable playback snapshot
///
/// This is the only object the UI observes. It is never mutated in place:
/// every update produces a complete new value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaybackState {
    /// Current item is still loading
    pub is_loading: bool,

    /// Native engine reports audio output running
    pub is_playing: bool,

    /// Current item failed to load or decode
    pub has_error: bool,

    /// Progress within the current track
    pub progress: Progress,

    /// Duration of the current track (zero while unknown)
    pub duration: Duration,

    /// Active repeat mode
    pub repeat_mode: RepeatMode,

    /// Shuffle enabled
    pub is_shuffle_mode_on: bool,
}

impl PlaybackState {
    /// Fresh snapshot for a newly loading queue, keeping player-wide modes
    pub fn loading(repeat_mode: RepeatMode, is_shuffle_mode_on: bool) -> Self {
        Self {
            is_loading: true,
            repeat_mode,
            is_shuffle_mode_on,
            ..Self::default()
        }
    }

    /// Elapsed time formatted for display
    pub fn time_label(&self) -> String {
        format_duration(self.progress.time)
    }

    /// Track duration formatted for display
    pub fn duration_label(&self) -> String {
        format_duration(self.duration)
    }
}

/// Configuration for the playback controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Delay between progress refreshes while playing (default: 50ms)
    pub progress_interval_ms: u64,

    /// Seek backward step (default: 5s)
    pub seek_back_increment_ms: u64,

    /// Seek forward step (default: 15s)
    pub seek_forward_increment_ms: u64,

    /// Initial repeat mode (default: Off)
    pub repeat: RepeatMode,

    /// Initial shuffle state (default: false)
    pub shuffle: bool,

    /// Buffered events per subscriber (default: 64)
    pub event_buffer_size: usize,
}

/// Bounds for the progress refresh delay
const MIN_PROGRESS_INTERVAL_MS: u64 = 10;
const MAX_PROGRESS_INTERVAL_MS: u64 = 1_000;

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            progress_interval_ms: 50,
            seek_back_increment_ms: 5_000,
            seek_forward_increment_ms: 15_000,
            repeat: RepeatMode::Off,
            shuffle: false,
            event_buffer_size: 64,
        }
    }
}

impl PlaybackConfig {
    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }

    pub fn seek_back_increment(&self) -> Duration {
        Duration::from_millis(self.seek_back_increment_ms)
    }

    pub fn seek_forward_increment(&self) -> Duration {
        Duration::from_millis(self.seek_forward_increment_ms)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !(MIN_PROGRESS_INTERVAL_MS..=MAX_PROGRESS_INTERVAL_MS)
            .contains(&self.progress_interval_ms)
        {
            return Err(PlaybackError::InvalidArgument(format!(
                "progress_interval_ms must be within {}..={}, got {}",
                MIN_PROGRESS_INTERVAL_MS, MAX_PROGRESS_INTERVAL_MS, self.progress_interval_ms
            )));
        }

        if self.seek_back_increment_ms == 0 || self.seek_forward_increment_ms == 0 {
            return Err(PlaybackError::InvalidArgument(
                "seek increments must be greater than zero".to_string(),
            ));
        }

        if self.event_buffer_size == 0 {
            return Err(PlaybackError::InvalidArgument(
                "event_buffer_size must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}
