//! Virtual-clock media engine
//!
//! Behaves like a push-style platform player: loading is asynchronous,
//! status and playing changes are reported through observers, and the
//! playhead advances on the tokio clock (so paused-time tests run instantly).
//!
//! Observers are invoked while the engine lock is held and must not call
//! back into the engine.

use async_trait::async_trait;
use cadence_playback::{
    AdapterError, AdapterFactory, BoundaryCallback, ItemStatus, NativePlayerAdapter,
    ObserverHandle, PlayingCallback, StatusCallback,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::catalog::{Catalog, MediaEntry};

/// Engine timing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Time between `load` and the item becoming ready or failing (default: 150ms)
    pub load_latency_ms: u64,

    /// Clock resolution for boundary and end detection (default: 10ms)
    pub tick_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            load_latency_ms: 150,
            tick_ms: 10,
        }
    }
}

impl EngineConfig {
    pub fn load_latency(&self) -> Duration {
        Duration::from_millis(self.load_latency_ms)
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }
}

/// Latest load outcome, used to wake `load_item_duration` waiters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LoadSignal {
    generation: u64,
    status: ItemStatus,
}

struct Item {
    uri: String,
    generation: u64,
    status: ItemStatus,
    duration: Option<Duration>,
    /// Playhead when the clock last stopped
    base: Duration,
    /// Clock start while audio is running
    anchor: Option<Instant>,
    ended: bool,
}

impl Item {
    fn new(uri: &str, generation: u64) -> Self {
        Self {
            uri: uri.to_string(),
            generation,
            status: ItemStatus::Loading,
            duration: None,
            base: Duration::ZERO,
            anchor: None,
            ended: false,
        }
    }

    fn position(&self, now: Instant) -> Duration {
        let elapsed = self
            .anchor
            .map(|anchor| now.saturating_duration_since(anchor))
            .unwrap_or_default();
        let position = self.base + elapsed;

        match self.duration {
            Some(duration) => position.min(duration),
            None => position,
        }
    }
}

struct Boundary {
    at: Duration,
    /// Cleared once fired, re-armed by a reload or a seek before `at`
    armed: bool,
    callback: BoundaryCallback,
}

struct EngineState {
    catalog: Catalog,
    item: Option<Item>,
    generation: u64,
    /// Transport intent, survives reloads
    wants_play: bool,
    /// Audio actually running (intent + ready + not ended)
    playing: bool,
    next_handle: u64,
    status_observers: HashMap<u64, StatusCallback>,
    playing_observers: HashMap<u64, PlayingCallback>,
    boundaries: HashMap<u64, Boundary>,
}

impl EngineState {
    fn next_handle(&mut self) -> ObserverHandle {
        self.next_handle += 1;
        ObserverHandle::new(self.next_handle)
    }

    fn notify_status(&self, status: ItemStatus) {
        for callback in self.status_observers.values() {
            callback(status);
        }
    }

    /// Recompute whether audio runs and report transitions
    fn sync_playing(&mut self, now: Instant) {
        let running = self.wants_play
            && self
                .item
                .as_ref()
                .is_some_and(|item| item.status == ItemStatus::Ready && !item.ended);

        if running == self.playing {
            return;
        }

        if let Some(item) = self.item.as_mut() {
            if running {
                item.anchor = Some(now);
            } else {
                item.base = item.position(now);
                item.anchor = None;
            }
        }

        self.playing = running;
        tracing::trace!("Simulated output {}", if running { "started" } else { "stopped" });
        for callback in self.playing_observers.values() {
            callback(running);
        }
    }

    /// One clock tick: fire crossed boundaries, then handle end of item
    fn tick(&mut self, now: Instant) {
        if !self.playing {
            return;
        }

        let Some(item) = self.item.as_mut() else {
            return;
        };
        let position = item.position(now);

        for boundary in self.boundaries.values_mut() {
            if boundary.armed && position >= boundary.at {
                boundary.armed = false;
                (boundary.callback)();
            }
        }

        if item.duration.is_some_and(|duration| position >= duration) {
            item.ended = true;
            tracing::debug!("Simulated item ended: {}", item.uri);
            self.sync_playing(now);
        }
    }
}

struct Shared {
    state: Mutex<EngineState>,
    signal: watch::Sender<LoadSignal>,
    config: EngineConfig,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// In-process media engine driven by the tokio clock
pub struct SimulatedEngine {
    shared: Arc<Shared>,
    clock: JoinHandle<()>,
}

impl SimulatedEngine {
    /// Create an engine and start its clock on the current runtime
    pub fn new(catalog: Catalog, config: EngineConfig) -> Self {
        let (signal, _) = watch::channel(LoadSignal {
            generation: 0,
            status: ItemStatus::Loading,
        });

        let shared = Arc::new(Shared {
            state: Mutex::new(EngineState {
                catalog,
                item: None,
                generation: 0,
                wants_play: false,
                playing: false,
                next_handle: 0,
                status_observers: HashMap::new(),
                playing_observers: HashMap::new(),
                boundaries: HashMap::new(),
            }),
            signal,
            config,
        });

        let clock = tokio::spawn(run_clock(Arc::downgrade(&shared), shared.config.tick()));

        Self { shared, clock }
    }

    /// URI of the current item
    pub fn current_uri(&self) -> Option<String> {
        self.shared.lock().item.as_ref().map(|item| item.uri.clone())
    }

    /// Number of registered observers of all kinds
    pub fn observer_count(&self) -> usize {
        let state = self.shared.lock();
        state.status_observers.len() + state.playing_observers.len() + state.boundaries.len()
    }

    /// Number of registered boundary observers
    pub fn boundary_count(&self) -> usize {
        self.shared.lock().boundaries.len()
    }
}

async fn run_clock(shared: Weak<Shared>, tick: Duration) {
    let mut interval = tokio::time::interval(tick);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        interval.tick().await;
        let Some(engine) = shared.upgrade() else {
            break;
        };
        engine.lock().tick(Instant::now());
    }
}

async fn complete_load(shared: Weak<Shared>, generation: u64, latency: Duration) {
    tokio::time::sleep(latency).await;

    let Some(shared) = shared.upgrade() else {
        return;
    };

    let status = {
        let mut guard = shared.lock();
        let state = &mut *guard;

        let Some(item) = state
            .item
            .as_mut()
            .filter(|item| item.generation == generation)
        else {
            return;
        };

        match state.catalog.get(&item.uri) {
            MediaEntry::Playable(duration) => {
                item.status = ItemStatus::Ready;
                item.duration = Some(duration);
            }
            MediaEntry::Broken => {
                item.status = ItemStatus::Failed;
                tracing::debug!("Simulated decode failure: {}", item.uri);
            }
        }

        let status = item.status;
        state.notify_status(status);
        state.sync_playing(Instant::now());
        status
    };

    shared.signal.send_replace(LoadSignal { generation, status });
}

#[async_trait]
impl NativePlayerAdapter for SimulatedEngine {
    fn load(&self, uri: &str) -> Result<(), AdapterError> {
        if !uri.contains("://") {
            return Err(AdapterError::InvalidUri(uri.to_string()));
        }

        let generation = {
            let mut state = self.shared.lock();
            state.generation += 1;
            let generation = state.generation;

            state.item = Some(Item::new(uri, generation));
            for boundary in state.boundaries.values_mut() {
                boundary.armed = true;
            }

            state.sync_playing(Instant::now());
            state.notify_status(ItemStatus::Loading);
            generation
        };

        self.shared.signal.send_replace(LoadSignal {
            generation,
            status: ItemStatus::Loading,
        });

        tokio::spawn(complete_load(
            Arc::downgrade(&self.shared),
            generation,
            self.shared.config.load_latency(),
        ));

        tracing::debug!("Simulated load: {}", uri);
        Ok(())
    }

    fn play(&self) {
        let mut state = self.shared.lock();
        state.wants_play = true;
        state.sync_playing(Instant::now());
    }

    fn pause(&self) {
        let mut state = self.shared.lock();
        state.wants_play = false;
        state.sync_playing(Instant::now());
    }

    fn seek_to(&self, time: Duration) {
        let now = Instant::now();
        let mut guard = self.shared.lock();
        let state = &mut *guard;

        let Some(item) = state.item.as_mut() else {
            return;
        };

        let target = item.duration.map_or(time, |duration| time.min(duration));
        item.base = target;
        if item.anchor.is_some() {
            item.anchor = Some(now);
        }
        // Reaching the end is detected by the clock, after boundaries fire
        item.ended = false;

        for boundary in state.boundaries.values_mut() {
            if target < boundary.at {
                boundary.armed = true;
            }
        }

        state.sync_playing(now);
    }

    fn is_playing(&self) -> bool {
        self.shared.lock().playing
    }

    fn current_position(&self) -> Duration {
        self.shared
            .lock()
            .item
            .as_ref()
            .map(|item| item.position(Instant::now()))
            .unwrap_or_default()
    }

    fn current_item_duration(&self) -> Option<Duration> {
        self.shared.lock().item.as_ref().and_then(|item| item.duration)
    }

    async fn load_item_duration(&self) -> Option<Duration> {
        let mut signal = self.shared.signal.subscribe();
        let generation = self.shared.lock().generation;

        loop {
            let current = *signal.borrow_and_update();
            if current.generation != generation {
                return None;
            }

            match current.status {
                ItemStatus::Ready => return self.current_item_duration(),
                ItemStatus::Failed => return None,
                ItemStatus::Loading => {}
            }

            if signal.changed().await.is_err() {
                return None;
            }
        }
    }

    fn observe_status(&self, callback: StatusCallback) -> ObserverHandle {
        let mut state = self.shared.lock();
        let handle = state.next_handle();
        state.status_observers.insert(handle.id(), callback);
        handle
    }

    fn observe_playing_changed(&self, callback: PlayingCallback) -> ObserverHandle {
        let mut state = self.shared.lock();
        let handle = state.next_handle();
        state.playing_observers.insert(handle.id(), callback);
        handle
    }

    fn observe_boundary(&self, at: Duration, callback: BoundaryCallback) -> ObserverHandle {
        let mut state = self.shared.lock();
        let handle = state.next_handle();
        state.boundaries.insert(
            handle.id(),
            Boundary {
                at,
                armed: true,
                callback,
            },
        );
        handle
    }

    fn remove_observer(&self, handle: ObserverHandle) {
        let mut state = self.shared.lock();
        let id = handle.id();
        if state.status_observers.remove(&id).is_none()
            && state.playing_observers.remove(&id).is_none()
            && state.boundaries.remove(&id).is_none()
        {
            tracing::trace!("Unknown observer {}", id);
        }
    }
}

impl Drop for SimulatedEngine {
    fn drop(&mut self) {
        self.clock.abort();
    }
}

impl fmt::Debug for SimulatedEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.lock();
        f.debug_struct("SimulatedEngine")
            .field("uri", &state.item.as_ref().map(|item| &item.uri))
            .field("playing", &state.playing)
            .field("observers", &(state.status_observers.len() + state.playing_observers.len()))
            .field("boundaries", &state.boundaries.len())
            .finish()
    }
}

/// Builds [`SimulatedEngine`]s sharing one catalog
#[derive(Debug, Clone)]
pub struct SimulatedEngineFactory {
    catalog: Catalog,
    config: EngineConfig,
    available: bool,
}

impl SimulatedEngineFactory {
    pub fn new(catalog: Catalog, config: EngineConfig) -> Self {
        Self {
            catalog,
            config,
            available: true,
        }
    }

    /// A factory whose audio output never comes up
    pub fn unavailable() -> Self {
        Self {
            catalog: Catalog::new(),
            config: EngineConfig::default(),
            available: false,
        }
    }
}

#[async_trait]
impl AdapterFactory for SimulatedEngineFactory {
    async fn create(&self) -> Result<Arc<dyn NativePlayerAdapter>, AdapterError> {
        if !self.available {
            return Err(AdapterError::CreationFailed(
                "simulated audio output unavailable".to_string(),
            ));
        }

        tracing::info!(
            "Creating simulated engine ({} catalog items, {:?} load latency)",
            self.catalog.len(),
            self.config.load_latency()
        );
        Ok(Arc::new(SimulatedEngine::new(
            self.catalog.clone(),
            self.config.clone(),
        )))
    }
}
