//! Track queue with shuffle and repeat semantics
//!
//! The queue keeps tracks in insertion order and navigates through a
//! *logical* position: identity order when shuffle is off, or a shuffle
//! permutation when it is on.
//!
//! ```text
//! tracks (physical):   [A, B, C, D]
//! shuffle order:       [2, 0, 3, 1]
//! play order (logical): C, A, D, B
//! ```

use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fmt;

use crate::error::{PlaybackError, Result};
use crate::shuffle::shuffled_order;
use crate::types::{RepeatMode, Track};

/// Navigation direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Next,
    Previous,
}

/// Outcome of moving through the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// Load and play the track at this logical position
    Play(usize),

    /// Rewind the current track instead of changing track
    SeekToStart,

    /// Fell off the end with repeat off: stop playback
    Stop,
}

/// Ordered track list plus shuffle permutation and repeat mode
pub struct TrackQueue {
    /// Tracks in intended play order
    tracks: Vec<Track>,

    /// Logical position -> physical index, present only while shuffle is on
    shuffle_order: Option<Vec<usize>>,

    /// Current logical position
    current_index: usize,

    repeat_mode: RepeatMode,
    shuffle_enabled: bool,
    rng: StdRng,
}

impl TrackQueue {
    /// Create an empty queue with repeat off and shuffle off
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Create an empty queue with a specific random source (for reproducible shuffles)
    pub fn with_rng(rng: StdRng) -> Self {
        Self {
            tracks: Vec::new(),
            shuffle_order: None,
            current_index: 0,
            repeat_mode: RepeatMode::Off,
            shuffle_enabled: false,
            rng,
        }
    }

    /// Replace the track list
    ///
    /// Resets the current position to the first track. Repeat and shuffle
    /// settings are player-wide and survive the replacement; with shuffle on
    /// a fresh permutation is drawn that still starts with the first track.
    pub fn set_tracks(&mut self, tracks: Vec<Track>) -> Result<()> {
        if tracks.is_empty() {
            return Err(PlaybackError::InvalidArgument(
                "track list must not be empty".to_string(),
            ));
        }

        self.tracks = tracks;
        self.current_index = 0;
        self.shuffle_order = None;

        if self.shuffle_enabled {
            self.shuffle_order = Some(self.order_starting_with(0));
        }

        Ok(())
    }

    /// Drop all tracks (modes are kept)
    pub fn clear(&mut self) {
        self.tracks.clear();
        self.shuffle_order = None;
        self.current_index = 0;
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Tracks in insertion order
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Tracks in play order (through the shuffle permutation if enabled)
    pub fn play_order(&self) -> impl Iterator<Item = &Track> + '_ {
        (0..self.tracks.len()).map(move |logical| &self.tracks[self.resolve_index(logical)])
    }

    /// Current logical position
    pub fn current_index(&self) -> usize {
        self.current_index
    }

    /// Map a logical position to a physical index into `tracks`
    pub fn resolve_index(&self, logical_index: usize) -> usize {
        match &self.shuffle_order {
            Some(order) => order.get(logical_index).copied().unwrap_or(logical_index),
            None => logical_index,
        }
    }

    /// Track at the current logical position
    pub fn current_track(&self) -> Option<&Track> {
        self.tracks.get(self.resolve_index(self.current_index))
    }

    /// Move to a logical position
    pub fn select(&mut self, logical_index: usize) -> Result<&Track> {
        if self.tracks.is_empty() {
            return Err(PlaybackError::IllegalState("queue is empty".to_string()));
        }

        if logical_index >= self.tracks.len() {
            return Err(PlaybackError::IndexOutOfBounds {
                index: logical_index,
                len: self.tracks.len(),
            });
        }

        self.current_index = logical_index;
        Ok(&self.tracks[self.resolve_index(logical_index)])
    }

    /// Compute where a skip in `direction` lands
    ///
    /// Does not move the queue; the caller applies the result.
    pub fn advance(&self, direction: Direction) -> Advance {
        if self.tracks.is_empty() {
            return Advance::Stop;
        }

        let last = self.tracks.len() - 1;

        match direction {
            Direction::Next => {
                if self.repeat_mode == RepeatMode::One {
                    Advance::Play(self.current_index)
                } else if self.current_index < last {
                    Advance::Play(self.current_index + 1)
                } else if self.repeat_mode == RepeatMode::All {
                    // Existing permutation is reused across the wrap
                    Advance::Play(0)
                } else {
                    Advance::Stop
                }
            }
            Direction::Previous => {
                if self.current_index > 0 {
                    Advance::Play(self.current_index - 1)
                } else if self.repeat_mode == RepeatMode::All {
                    Advance::Play(last)
                } else {
                    Advance::SeekToStart
                }
            }
        }
    }

    pub fn repeat_mode(&self) -> RepeatMode {
        self.repeat_mode
    }

    pub fn set_repeat_mode(&mut self, mode: RepeatMode) {
        self.repeat_mode = mode;
    }

    /// Cycle Off -> One -> All -> Off, returning the new mode
    pub fn toggle_repeat_mode(&mut self) -> RepeatMode {
        self.repeat_mode = self.repeat_mode.toggled();
        self.repeat_mode
    }

    pub fn is_shuffle_enabled(&self) -> bool {
        self.shuffle_enabled
    }

    /// Current permutation (logical position -> physical index), if shuffled
    pub fn shuffle_order(&self) -> Option<&[usize]> {
        self.shuffle_order.as_deref()
    }

    /// Set shuffle on or off without toggling
    pub fn set_shuffle(&mut self, enabled: bool) {
        if self.shuffle_enabled != enabled {
            self.toggle_shuffle();
        }
    }

    /// Flip shuffle, returning the new state
    ///
    /// The current track stays current. Turning shuffle on draws a new
    /// permutation with the current track first, so every other track
    /// follows before the queue wraps. Turning it off maps the position
    /// back to the track's physical index.
    pub fn toggle_shuffle(&mut self) -> bool {
        let current = self.resolve_index(self.current_index);
        self.shuffle_enabled = !self.shuffle_enabled;

        if self.shuffle_enabled {
            if !self.tracks.is_empty() {
                self.shuffle_order = Some(self.order_starting_with(current));
                self.current_index = 0;
            }
        } else {
            self.shuffle_order = None;
            self.current_index = current;
        }

        self.shuffle_enabled
    }

    fn order_starting_with(&mut self, first: usize) -> Vec<usize> {
        let mut order = shuffled_order(self.tracks.len(), &mut self.rng);
        if let Some(position) = order.iter().position(|&index| index == first) {
            order.swap(0, position);
        }
        order
    }
}

impl Default for TrackQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TrackQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackQueue")
            .field("len", &self.tracks.len())
            .field("current_index", &self.current_index)
            .field("shuffle_order", &self.shuffle_order)
            .field("repeat_mode", &self.repeat_mode)
            .field("shuffle_enabled", &self.shuffle_enabled)
            .finish_non_exhaustive()
    }
}
