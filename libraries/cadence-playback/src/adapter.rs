//! Native player capability contract
//!
//! The controller drives a platform media engine only through
//! [`NativePlayerAdapter`]. Transport calls are fire-and-forget: they return
//! once the request is issued, and the engine reports the outcome later
//! through the registered observers.
//!
//! Observers may be invoked from any thread. The controller never mutates
//! state inside a callback; it only forwards a message to its own task.

use crate::error::AdapterError;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Load status of the current item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemStatus {
    /// Item is opening / buffering
    Loading,
    /// Item can play
    Ready,
    /// Item failed to open or decode
    Failed,
}

/// Registration token returned by the `observe_*` methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverHandle(u64);

impl ObserverHandle {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(self) -> u64 {
        self.0
    }
}

/// Called on every item status change
pub type StatusCallback = Box<dyn Fn(ItemStatus) + Send + Sync>;

/// Called when the engine's audio output starts or stops
pub type PlayingCallback = Box<dyn Fn(bool) + Send + Sync>;

/// Called once when playback crosses a boundary time
pub type BoundaryCallback = Box<dyn Fn() + Send + Sync>;

/// Platform media engine as seen by the controller
#[async_trait]
pub trait NativePlayerAdapter: Send + Sync {
    // ========================================================================
    // Transport
    // ========================================================================

    /// Replace the current item with `uri`
    ///
    /// # Errors
    /// Returns an error if the request cannot even be issued (malformed
    /// URI). Decode failures are reported later as [`ItemStatus::Failed`].
    fn load(&self, uri: &str) -> Result<(), AdapterError>;

    /// Start or resume audio output
    fn play(&self);

    /// Pause audio output, keeping the position
    fn pause(&self);

    /// Move the playhead of the current item
    fn seek_to(&self, time: Duration);

    /// Whether audio output is running right now
    fn is_playing(&self) -> bool;

    // ========================================================================
    // Timing
    // ========================================================================

    /// Playhead of the current item
    fn current_position(&self) -> Duration;

    /// Duration of the current item if already known
    fn current_item_duration(&self) -> Option<Duration>;

    /// Wait until the current item's duration is known
    ///
    /// Resolves to `None` if the item fails or is replaced first.
    async fn load_item_duration(&self) -> Option<Duration>;

    // ========================================================================
    // Observation
    // ========================================================================

    /// Observe item status changes
    fn observe_status(&self, callback: StatusCallback) -> ObserverHandle;

    /// Observe audio output starting and stopping
    fn observe_playing_changed(&self, callback: PlayingCallback) -> ObserverHandle;

    /// Fire `callback` when the playhead of the current item reaches `at`
    fn observe_boundary(&self, at: Duration, callback: BoundaryCallback) -> ObserverHandle;

    /// Deregister any observer; unknown handles are ignored
    fn remove_observer(&self, handle: ObserverHandle);
}

/// Builds native adapters on `initialize`
///
/// A released controller asks for a brand-new adapter when initialized again.
#[async_trait]
pub trait AdapterFactory: Send + Sync {
    /// Create a fresh adapter
    ///
    /// # Errors
    /// Returns [`AdapterError::CreationFailed`] if the engine is unavailable
    async fn create(&self) -> Result<Arc<dyn NativePlayerAdapter>, AdapterError>;
}
