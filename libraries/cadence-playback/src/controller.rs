//! Playback controller
//!
//! [`PlaybackController`] is a cheap, cloneable handle to a single task that
//! owns the queue, the state store and the native adapter. UI commands and
//! native callbacks are both funnelled into that task, so every mutation
//! happens on one logical thread.
//!
//! ```text
//! UI ──Command──▶ ┌────────────────┐ ──load/play/seek──▶ NativePlayerAdapter
//!                 │ ControllerTask │                            │
//! UI ◀──watch──── └────────────────┘ ◀──────Notification───────┘
//! ```

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use crate::adapter::{AdapterFactory, ItemStatus, NativePlayerAdapter, ObserverHandle};
use crate::auto_advance::AutoAdvanceController;
use crate::error::{PlaybackError, Result};
use crate::events::{EventBus, PlaybackEvent};
use crate::poller::ProgressPoller;
use crate::queue::{Advance, Direction, TrackQueue};
use crate::store::{PlaybackStateStore, TrackSlot};
use crate::types::{PlaybackConfig, PlaybackState, Progress, Track};

/// Messages posted to the controller task from native callbacks and timers
///
/// Each carries the generation it belongs to so late deliveries are dropped.
#[derive(Debug)]
pub(crate) enum Notification {
    Status { epoch: u64, status: ItemStatus },
    PlayingChanged { epoch: u64, is_playing: bool },
    RefreshDue { generation: u64 },
    DurationResolved { item: u64, duration: Option<Duration> },
    BoundaryReached { item: u64 },
}

type Reply = oneshot::Sender<Result<()>>;

enum Command {
    Initialize {
        on_ready: Box<dyn FnOnce() + Send>,
        reply: Reply,
    },
    SetTracks {
        tracks: Vec<Track>,
        reply: Reply,
    },
    Action {
        action: Action,
        reply: Reply,
    },
    Release {
        reply: oneshot::Sender<()>,
    },
}

#[derive(Debug, Clone, Copy)]
enum Action {
    PlayPause,
    Resume,
    Pause,
    Stop,
    Play(usize),
    UpdateProgress,
    SkipToPrevious,
    SkipToNext,
    SeekBackward,
    SeekForward,
    SeekTo(Duration),
    ToggleRepeatMode,
    ToggleShuffleMode,
}

/// Handle to the playback controller task
///
/// Commands resolve once the controller has applied them locally; the
/// native outcome shows up later in [`PlaybackController::subscribe_state`].
/// Dropping the last handle releases the native player and stops the task.
#[derive(Clone)]
pub struct PlaybackController {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<PlaybackState>,
    track: watch::Receiver<Option<Track>>,
    events: EventBus,
    seek_back_increment: Duration,
    seek_forward_increment: Duration,
}

impl PlaybackController {
    /// Spawn the controller task on the current tokio runtime
    ///
    /// # Errors
    /// Returns [`PlaybackError::InvalidArgument`] for an invalid config
    pub fn spawn(factory: Arc<dyn AdapterFactory>, config: PlaybackConfig) -> Result<Self> {
        config.validate()?;

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (notify_tx, notify_rx) = mpsc::unbounded_channel();

        let task = ControllerTask::new(factory, config.clone(), notify_tx);
        let handle = Self {
            commands: command_tx,
            state: task.store.subscribe(),
            track: task.current.subscribe(),
            events: task.events.clone(),
            seek_back_increment: config.seek_back_increment(),
            seek_forward_increment: config.seek_forward_increment(),
        };

        tokio::spawn(task.run(command_rx, notify_rx));
        info!(
            "Playback controller started (refresh every {:?})",
            config.progress_interval()
        );

        Ok(handle)
    }

    // ===== Observation =====

    /// Latest playback snapshot
    pub fn state(&self) -> PlaybackState {
        self.state.borrow().clone()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<PlaybackState> {
        self.state.clone()
    }

    /// Currently selected track
    pub fn current_track(&self) -> Option<Track> {
        self.track.borrow().clone()
    }

    pub fn subscribe_track(&self) -> watch::Receiver<Option<Track>> {
        self.track.clone()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<PlaybackEvent> {
        self.events.subscribe()
    }

    pub fn seek_back_increment(&self) -> Duration {
        self.seek_back_increment
    }

    pub fn seek_forward_increment(&self) -> Duration {
        self.seek_forward_increment
    }

    // ===== Lifecycle =====

    /// Create the native player and register its observers
    ///
    /// Idempotent: when already initialized nothing is recreated, but
    /// `on_ready` is still invoked.
    pub async fn initialize(&self, on_ready: impl FnOnce() + Send + 'static) -> Result<()> {
        self.request(|reply| Command::Initialize {
            on_ready: Box::new(on_ready),
            reply,
        })
        .await
    }

    /// Replace the queue and load its first track
    ///
    /// # Errors
    /// [`PlaybackError::InvalidArgument`] for an empty list (state untouched),
    /// [`PlaybackError::IllegalState`] before `initialize`
    pub async fn set_tracks(&self, tracks: Vec<Track>) -> Result<()> {
        self.request(|reply| Command::SetTracks { tracks, reply })
            .await
    }

    /// Tear down the native player; safe to call repeatedly
    pub async fn release_player(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Release { reply })
            .map_err(|_| PlaybackError::ControllerClosed)?;
        rx.await.map_err(|_| PlaybackError::ControllerClosed)
    }

    // ===== Transport =====

    /// Pause if the native player is playing, play otherwise
    pub async fn play_pause(&self) -> Result<()> {
        self.action(Action::PlayPause).await
    }

    pub async fn resume(&self) -> Result<()> {
        self.action(Action::Resume).await
    }

    pub async fn pause(&self) -> Result<()> {
        self.action(Action::Pause).await
    }

    /// Pause and rewind the current track
    pub async fn stop(&self) -> Result<()> {
        self.action(Action::Stop).await
    }

    /// Load and play the track at a logical position
    pub async fn play(&self, index: usize) -> Result<()> {
        self.action(Action::Play(index)).await
    }

    /// Refresh progress immediately instead of waiting for the poller
    pub async fn update_progress(&self) -> Result<()> {
        self.action(Action::UpdateProgress).await
    }

    pub async fn skip_to_previous(&self) -> Result<()> {
        self.action(Action::SkipToPrevious).await
    }

    pub async fn skip_to_next(&self) -> Result<()> {
        self.action(Action::SkipToNext).await
    }

    pub async fn seek_backward(&self) -> Result<()> {
        self.action(Action::SeekBackward).await
    }

    pub async fn seek_forward(&self) -> Result<()> {
        self.action(Action::SeekForward).await
    }

    /// Seek to an absolute time, clamped to the track duration
    pub async fn seek_to(&self, time: Duration) -> Result<()> {
        self.action(Action::SeekTo(time)).await
    }

    // ===== Modes =====

    pub async fn toggle_repeat_mode(&self) -> Result<()> {
        self.action(Action::ToggleRepeatMode).await
    }

    pub async fn toggle_shuffle_mode(&self) -> Result<()> {
        self.action(Action::ToggleShuffleMode).await
    }

    async fn action(&self, action: Action) -> Result<()> {
        self.request(|reply| Command::Action { action, reply }).await
    }

    async fn request(&self, command: impl FnOnce(Reply) -> Command) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(command(reply))
            .map_err(|_| PlaybackError::ControllerClosed)?;
        rx.await.map_err(|_| PlaybackError::ControllerClosed)?
    }
}

impl std::fmt::Debug for PlaybackController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackController")
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}

/// State owned by the controller task
struct ControllerTask {
    factory: Arc<dyn AdapterFactory>,
    config: PlaybackConfig,

    adapter: Option<Arc<dyn NativePlayerAdapter>>,
    observers: Vec<ObserverHandle>,
    /// Adapter session; bumped on initialize and release
    epoch: u64,

    queue: TrackQueue,
    store: PlaybackStateStore,
    current: TrackSlot,
    events: EventBus,

    poller: ProgressPoller,
    auto_advance: AutoAdvanceController,
    notifier: mpsc::UnboundedSender<Notification>,
}

impl ControllerTask {
    fn new(
        factory: Arc<dyn AdapterFactory>,
        config: PlaybackConfig,
        notifier: mpsc::UnboundedSender<Notification>,
    ) -> Self {
        let mut queue = TrackQueue::new();
        queue.set_repeat_mode(config.repeat);
        queue.set_shuffle(config.shuffle);

        let store = PlaybackStateStore::new(PlaybackState {
            repeat_mode: config.repeat,
            is_shuffle_mode_on: config.shuffle,
            ..PlaybackState::default()
        });

        Self {
            factory,
            adapter: None,
            observers: Vec::new(),
            epoch: 0,
            queue,
            store,
            current: TrackSlot::new(),
            events: EventBus::new(config.event_buffer_size),
            poller: ProgressPoller::new(config.progress_interval()),
            auto_advance: AutoAdvanceController::new(),
            notifier,
            config,
        }
    }

    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut notifications: mpsc::UnboundedReceiver<Notification>,
    ) {
        loop {
            tokio::select! {
                biased;

                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
                Some(notification) = notifications.recv() => {
                    self.handle_notification(notification);
                }
            }
        }

        self.release();
        debug!("Playback controller task stopped");
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Initialize { on_ready, reply } => {
                let result = self.initialize().await;
                if result.is_ok() {
                    on_ready();
                }
                let _ = reply.send(result);
            }
            Command::SetTracks { tracks, reply } => {
                let _ = reply.send(self.set_tracks(tracks));
            }
            Command::Action { action, reply } => {
                let result = self.apply(action);
                if let Err(e) = &result {
                    debug!("{:?} rejected: {}", action, e);
                }
                let _ = reply.send(result);
            }
            Command::Release { reply } => {
                self.release();
                let _ = reply.send(());
            }
        }
    }

    // ===== Lifecycle =====

    async fn initialize(&mut self) -> Result<()> {
        if self.adapter.is_some() {
            debug!("Native player already initialized");
            return Ok(());
        }

        let adapter = self.factory.create().await?;

        self.epoch += 1;
        let epoch = self.epoch;

        let notifier = self.notifier.clone();
        let status = adapter.observe_status(Box::new(move |status| {
            let _ = notifier.send(Notification::Status { epoch, status });
        }));

        let notifier = self.notifier.clone();
        let playing = adapter.observe_playing_changed(Box::new(move |is_playing| {
            let _ = notifier.send(Notification::PlayingChanged { epoch, is_playing });
        }));

        self.observers = vec![status, playing];
        self.adapter = Some(adapter);

        info!("Native player initialized (session {})", epoch);
        self.events.emit(PlaybackEvent::Initialized);
        Ok(())
    }

    fn release(&mut self) {
        let Some(adapter) = self.adapter.take() else {
            debug!("Release requested with no native player");
            return;
        };

        self.poller.cancel();
        self.auto_advance.reset(Some(adapter.as_ref()));
        for handle in self.observers.drain(..) {
            adapter.remove_observer(handle);
        }
        adapter.pause();
        self.epoch += 1;

        self.queue.clear();
        self.current.set(None);

        let repeat_mode = self.queue.repeat_mode();
        let is_shuffle_mode_on = self.queue.is_shuffle_enabled();
        self.store.update(|_| PlaybackState {
            repeat_mode,
            is_shuffle_mode_on,
            ..PlaybackState::default()
        });

        info!("Native player released");
        self.events.emit(PlaybackEvent::Released);
    }

    // ===== Queue =====

    fn set_tracks(&mut self, tracks: Vec<Track>) -> Result<()> {
        if tracks.is_empty() {
            return Err(PlaybackError::InvalidArgument(
                "track list must not be empty".to_string(),
            ));
        }

        let adapter = self.adapter()?;
        let count = tracks.len();
        self.queue.set_tracks(tracks)?;

        let repeat_mode = self.queue.repeat_mode();
        let is_shuffle_mode_on = self.queue.is_shuffle_enabled();
        self.store
            .update(|_| PlaybackState::loading(repeat_mode, is_shuffle_mode_on));

        info!("Queue set: {} tracks", count);
        self.events.emit(PlaybackEvent::TracksChanged { count });

        self.set_current_item(&adapter, self.queue.current_index())
    }

    /// Make `logical` the current item and hand it to the native player
    ///
    /// The poller and the previous boundary observer are torn down before the
    /// new item is loaded.
    fn set_current_item(
        &mut self,
        adapter: &Arc<dyn NativePlayerAdapter>,
        logical: usize,
    ) -> Result<()> {
        if logical >= self.queue.len() {
            return Err(PlaybackError::IndexOutOfBounds {
                index: logical,
                len: self.queue.len(),
            });
        }

        self.poller.cancel();
        self.auto_advance.reset(Some(adapter.as_ref()));

        let track = self.queue.select(logical)?.clone();
        let previous = self.current.set(Some(track.clone()));
        let previous_track_id = previous.map(|t| t.id);
        if previous_track_id.as_deref() != Some(track.id.as_str()) {
            self.events.emit(PlaybackEvent::TrackChanged {
                track_id: track.id.clone(),
                previous_track_id,
            });
        }

        match adapter.load(&track.uri) {
            Ok(()) => {
                self.store.update(|s| PlaybackState {
                    is_loading: true,
                    progress: Progress::default(),
                    duration: Duration::ZERO,
                    ..s
                });
                self.auto_advance.arm(Arc::clone(adapter), &self.notifier);
                debug!("Loading '{}' at position {}", track.id, logical);
            }
            Err(e) => {
                warn!("Failed to load '{}': {}", track.id, e);
                self.store.update(|s| PlaybackState {
                    is_loading: false,
                    has_error: true,
                    progress: Progress::default(),
                    duration: Duration::ZERO,
                    ..s
                });
                self.events.emit(PlaybackEvent::Error {
                    message: e.to_string(),
                });
            }
        }

        Ok(())
    }

    // ===== Commands =====

    fn apply(&mut self, action: Action) -> Result<()> {
        match action {
            Action::ToggleRepeatMode => {
                let repeat_mode = self.queue.toggle_repeat_mode();
                self.store.update(|s| PlaybackState { repeat_mode, ..s });
                info!("Repeat mode: {:?}", repeat_mode);
                return Ok(());
            }
            Action::ToggleShuffleMode => {
                let is_shuffle_mode_on = self.queue.toggle_shuffle();
                self.store.update(|s| PlaybackState {
                    is_shuffle_mode_on,
                    ..s
                });
                info!("Shuffle: {}", is_shuffle_mode_on);
                return Ok(());
            }
            _ => {}
        }

        let adapter = self.ready_adapter()?;

        match action {
            Action::PlayPause => {
                if adapter.is_playing() {
                    self.pause(adapter.as_ref());
                } else {
                    self.play_current(&adapter);
                }
            }
            Action::Resume => self.play_current(&adapter),
            Action::Pause => self.pause(adapter.as_ref()),
            Action::Stop => {
                self.pause(adapter.as_ref());
                adapter.seek_to(Duration::ZERO);
                self.refresh(adapter.as_ref());
            }
            Action::Play(index) => {
                self.set_current_item(&adapter, index)?;
                self.play_current(&adapter);
            }
            Action::UpdateProgress => self.refresh(adapter.as_ref()),
            Action::SkipToPrevious => self.skip(&adapter, Direction::Previous)?,
            Action::SkipToNext => self.skip(&adapter, Direction::Next)?,
            Action::SeekBackward => self.seek_backward(adapter.as_ref()),
            Action::SeekForward => self.seek_forward(adapter.as_ref()),
            Action::SeekTo(time) => self.seek_to(adapter.as_ref(), time),
            Action::ToggleRepeatMode | Action::ToggleShuffleMode => {}
        }

        Ok(())
    }

    /// Start output, restore the boundary observer and resume polling
    ///
    /// Engines that keep playing across a reload do not report a playing
    /// change, so the poller cancelled by the track change is re-armed here.
    fn play_current(&mut self, adapter: &Arc<dyn NativePlayerAdapter>) {
        // A failed item stays without auto-advance until a new load
        if !self.store.get().has_error {
            if let Some(at) = self.auto_advance.restore(adapter, &self.notifier) {
                debug!("Boundary observer restored at {:?}", at);
            }
        }

        adapter.play();
        if adapter.is_playing() {
            self.poller.schedule(&self.notifier);
        }
    }

    /// Pause output and drop both the pending refresh and the boundary observer
    ///
    /// Bumping the item generation also discards a boundary firing that was
    /// already queued before the pause.
    fn pause(&mut self, adapter: &dyn NativePlayerAdapter) {
        adapter.pause();
        self.poller.cancel();
        self.auto_advance.reset(Some(adapter));
    }

    fn skip(&mut self, adapter: &Arc<dyn NativePlayerAdapter>, direction: Direction) -> Result<()> {
        match self.queue.advance(direction) {
            Advance::Play(index) => {
                self.set_current_item(adapter, index)?;
                self.play_current(adapter);
            }
            Advance::SeekToStart => {
                adapter.seek_to(Duration::ZERO);
                self.refresh(adapter.as_ref());
            }
            Advance::Stop => {
                self.pause(adapter.as_ref());
                self.refresh(adapter.as_ref());
                info!("Reached end of queue");
                self.events.emit(PlaybackEvent::QueueEnded);
            }
        }
        Ok(())
    }

    fn seek_backward(&mut self, adapter: &dyn NativePlayerAdapter) {
        let position = adapter.current_position();
        if position.is_zero() {
            return;
        }

        adapter.seek_to(position.saturating_sub(self.config.seek_back_increment()));
        self.refresh(adapter);
    }

    fn seek_forward(&mut self, adapter: &dyn NativePlayerAdapter) {
        let Some(duration) = known_duration(adapter) else {
            return;
        };

        let position = adapter.current_position();
        if position >= duration {
            return;
        }

        adapter.seek_to((position + self.config.seek_forward_increment()).min(duration));
        self.refresh(adapter);
    }

    fn seek_to(&mut self, adapter: &dyn NativePlayerAdapter, time: Duration) {
        let Some(duration) = known_duration(adapter) else {
            debug!("Seek ignored: duration unknown");
            return;
        };

        adapter.seek_to(time.min(duration));
        self.refresh(adapter);
    }

    /// Pull position and duration from the native player into the store
    fn refresh(&mut self, adapter: &dyn NativePlayerAdapter) {
        let duration = adapter.current_item_duration().unwrap_or_default();
        let mut time = adapter.current_position();
        if !duration.is_zero() {
            time = time.min(duration);
        }

        self.store.update(|s| PlaybackState {
            progress: Progress::at(time, duration),
            duration,
            ..s
        });
    }

    // ===== Native notifications =====

    fn handle_notification(&mut self, notification: Notification) {
        match notification {
            Notification::Status { epoch, status } => {
                if let Some(adapter) = self.session(epoch) {
                    self.on_status(&adapter, status);
                }
            }
            Notification::PlayingChanged { epoch, is_playing } => {
                if let Some(adapter) = self.session(epoch) {
                    self.on_playing_changed(adapter.as_ref(), is_playing);
                }
            }
            Notification::RefreshDue { generation } => {
                if !self.poller.take_due(generation) {
                    return;
                }
                if let Some(adapter) = self.adapter.clone() {
                    self.refresh(adapter.as_ref());
                    if adapter.is_playing() {
                        self.poller.schedule(&self.notifier);
                    }
                }
            }
            Notification::DurationResolved { item, duration } => {
                let Some(adapter) = self.adapter.clone() else {
                    return;
                };
                if let Some(at) = self.auto_advance.on_duration_resolved(
                    adapter.as_ref(),
                    &self.notifier,
                    item,
                    duration,
                ) {
                    debug!("Boundary observer registered at {:?}", at);
                    self.refresh(adapter.as_ref());
                }
            }
            Notification::BoundaryReached { item } => {
                let Some(adapter) = self.adapter.clone() else {
                    return;
                };
                if !self.auto_advance.on_boundary(adapter.as_ref(), item) {
                    return;
                }

                if let Some(track) = self.current.get() {
                    info!("Track finished: {}", track.id);
                    self.events
                        .emit(PlaybackEvent::TrackFinished { track_id: track.id });
                }

                if let Err(e) = self.skip(&adapter, Direction::Next) {
                    warn!("Auto-advance failed: {}", e);
                }
            }
        }
    }

    fn on_status(&mut self, adapter: &Arc<dyn NativePlayerAdapter>, status: ItemStatus) {
        match status {
            ItemStatus::Loading => {
                self.store.update(|s| PlaybackState {
                    is_loading: true,
                    ..s
                });
            }
            ItemStatus::Ready => {
                self.store.update(|s| PlaybackState {
                    is_loading: false,
                    has_error: false,
                    ..s
                });
                self.refresh(adapter.as_ref());
            }
            ItemStatus::Failed => {
                let track_id = self.current.get().map(|t| t.id).unwrap_or_default();
                warn!("Native player failed on '{}'", track_id);

                self.poller.cancel();
                self.auto_advance.reset(Some(adapter.as_ref()));
                self.store.update(|s| PlaybackState {
                    is_loading: false,
                    has_error: true,
                    ..s
                });
                self.events.emit(PlaybackEvent::Error {
                    message: format!("playback failed for track '{}'", track_id),
                });
            }
        }
    }

    fn on_playing_changed(&mut self, adapter: &dyn NativePlayerAdapter, is_playing: bool) {
        self.store.update(|s| PlaybackState { is_playing, ..s });

        if is_playing {
            self.poller.schedule(&self.notifier);
        } else {
            self.poller.cancel();
        }

        self.refresh(adapter);
    }

    // ===== Helpers =====

    fn adapter(&self) -> Result<Arc<dyn NativePlayerAdapter>> {
        self.adapter
            .clone()
            .ok_or_else(|| PlaybackError::IllegalState("player not initialized".to_string()))
    }

    fn ready_adapter(&self) -> Result<Arc<dyn NativePlayerAdapter>> {
        let adapter = self.adapter()?;
        if self.queue.is_empty() {
            return Err(PlaybackError::IllegalState("no tracks set".to_string()));
        }
        Ok(adapter)
    }

    /// Adapter for a callback session, `None` if the session is over
    fn session(&self, epoch: u64) -> Option<Arc<dyn NativePlayerAdapter>> {
        if epoch != self.epoch {
            debug!("Dropping callback from released session {}", epoch);
            return None;
        }
        self.adapter.clone()
    }
}

fn known_duration(adapter: &dyn NativePlayerAdapter) -> Option<Duration> {
    adapter.current_item_duration().filter(|d| !d.is_zero())
}
