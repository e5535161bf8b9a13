//! Playback Events
//!
//! Discrete lifecycle notifications, complementary to the continuous
//! [`PlaybackState`](crate::PlaybackState) snapshot. Emitted at:
//! - Initialization and release
//! - Queue replacement and track changes
//! - Natural end of a track and of the queue
//! - Load failures

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Events emitted by the playback controller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackEvent {
    /// Native player created and observers registered
    Initialized,

    /// Queue replaced
    TracksChanged {
        /// New queue length
        count: usize,
    },

    /// Current track changed (manual selection, skip or auto-advance)
    TrackChanged {
        /// ID of the new (current) track
        track_id: String,
        /// ID of the previous track (if any)
        previous_track_id: Option<String>,
    },

    /// Track reached its end naturally
    TrackFinished {
        /// ID of the finished track
        track_id: String,
    },

    /// Last track finished with repeat off
    QueueEnded,

    /// Error occurred during playback
    Error {
        /// Error message
        message: String,
    },

    /// Native player released
    Released,
}

/// Fan-out channel for [`PlaybackEvent`]s
///
/// Slow subscribers lag and lose the oldest events; the emitter never blocks.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<PlaybackEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Emit an event to all current subscribers
    pub fn emit(&self, event: PlaybackEvent) {
        if self.sender.send(event).is_err() {
            tracing::trace!("No event subscribers");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlaybackEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
