//! Cadence - Simulated Media Engine
//!
//! A [`NativePlayerAdapter`](cadence_playback::NativePlayerAdapter) that
//! needs no audio hardware. Items come from a [`Catalog`], load after a
//! configurable latency and play on the tokio clock.
//!
//! Used as the reference adapter by the end-to-end tests and the CLI.
//!
//! # Example
//!
//! ```rust,no_run
//! use cadence_engine_sim::{Catalog, EngineConfig, SimulatedEngineFactory};
//! use cadence_playback::{PlaybackConfig, PlaybackController};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn run() -> cadence_playback::Result<()> {
//! let catalog = Catalog::new().with_track("file:///intro.flac", Duration::from_secs(90));
//! let factory = Arc::new(SimulatedEngineFactory::new(catalog, EngineConfig::default()));
//!
//! let controller = PlaybackController::spawn(factory, PlaybackConfig::default())?;
//! controller.initialize(|| {}).await?;
//! # Ok(())
//! # }
//! ```

mod catalog;
mod engine;

pub use catalog::{Catalog, MediaEntry};
pub use engine::{EngineConfig, SimulatedEngine, SimulatedEngineFactory};
