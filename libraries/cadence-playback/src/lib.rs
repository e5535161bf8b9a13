//! Cadence - Playback State Synchronization
//!
//! Wraps a platform media engine and exposes one consistent, observable
//! model of "what is currently playing", whichever engine backs it.
//!
//! This crate provides:
//! - Track queue with shuffle and repeat (Off, One, All)
//! - Observable playback snapshots (`watch`) and lifecycle events (`broadcast`)
//! - Self-re-arming progress refresh that never leaks timers
//! - End-of-track detection through boundary observers
//! - A single-owner controller task that serializes UI commands and native callbacks
//!
//! # Architecture
//!
//! `cadence-playback` knows nothing about any concrete engine:
//! - Engines are reached through [`NativePlayerAdapter`]
//! - Adapters are built by an [`AdapterFactory`] on `initialize`
//! - Native callbacks only post messages; state changes on the controller task
//!
//! # Example: Basic Playback
//!
//! ```rust,no_run
//! use cadence_playback::{AdapterFactory, PlaybackConfig, PlaybackController, Track, TrackMetadata};
//! use std::sync::Arc;
//!
//! # async fn run(factory: Arc<dyn AdapterFactory>) -> cadence_playback::Result<()> {
//! let controller = PlaybackController::spawn(factory, PlaybackConfig::default())?;
//!
//! controller.initialize(|| println!("player ready")).await?;
//! controller
//!     .set_tracks(vec![Track::new(
//!         "intro",
//!         "https://cdn.example.com/intro.mp3",
//!         TrackMetadata::default(),
//!     )])
//!     .await?;
//! controller.play(0).await?;
//!
//! let mut state = controller.subscribe_state();
//! while state.changed().await.is_ok() {
//!     let snapshot = state.borrow_and_update().clone();
//!     println!("{} / {}", snapshot.time_label(), snapshot.duration_label());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Example: Shuffle and Repeat
//!
//! ```rust
//! use cadence_playback::{RepeatMode, Track, TrackMetadata, TrackQueue};
//!
//! let mut queue = TrackQueue::new();
//! queue
//!     .set_tracks(
//!         ["a", "b", "c"]
//!             .iter()
//!             .map(|id| Track::new(*id, format!("file:///{}.mp3", id), TrackMetadata::default()))
//!             .collect(),
//!     )
//!     .unwrap();
//!
//! assert_eq!(queue.toggle_repeat_mode(), RepeatMode::One);
//! assert!(queue.toggle_shuffle());
//! assert_eq!(queue.current_track().unwrap().id, "a");
//! ```

mod adapter;
mod auto_advance;
mod controller;
mod error;
mod events;
mod format;
mod poller;
mod queue;
mod shuffle;
mod store;
pub mod types;

// Public exports
pub use adapter::{
    AdapterFactory, BoundaryCallback, ItemStatus, NativePlayerAdapter, ObserverHandle,
    PlayingCallback, StatusCallback,
};
pub use auto_advance::AutoAdvanceController;
pub use controller::PlaybackController;
pub use error::{AdapterError, PlaybackError, Result};
pub use events::{EventBus, PlaybackEvent};
pub use format::format_duration;
pub use poller::{PollerState, ProgressPoller};
pub use queue::{Advance, Direction, TrackQueue};
pub use shuffle::shuffled_order;
pub use store::{PlaybackStateStore, TrackSlot};
pub use types::{PlaybackConfig, PlaybackState, Progress, RepeatMode, Track, TrackMetadata};
