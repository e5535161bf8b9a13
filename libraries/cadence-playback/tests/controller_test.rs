//! Integration tests for the playback controller
//!
//! Drives the controller against an in-memory adapter that records every
//! native call, and checks state, events and timer/observer hygiene.

use async_trait::async_trait;
use cadence_playback::{
    AdapterError, AdapterFactory, BoundaryCallback, ItemStatus, NativePlayerAdapter,
    ObserverHandle, PlaybackConfig, PlaybackController, PlaybackError, PlaybackEvent,
    PlayingCallback, RepeatMode, StatusCallback, Track, TrackMetadata,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;

const TRACK_DURATION: Duration = Duration::from_secs(180);

// ===== Mock Adapter =====

#[derive(Default)]
struct MockState {
    playing: bool,
    position: Duration,
    duration: Option<Duration>,
    loaded: Vec<String>,
    seeks: Vec<Duration>,
    position_calls: usize,
    next_handle: u64,
    status_observers: HashMap<u64, StatusCallback>,
    playing_observers: HashMap<u64, PlayingCallback>,
    boundary_observers: HashMap<u64, (Duration, BoundaryCallback)>,
    retired_boundaries: Vec<BoundaryCallback>,
}

#[derive(Default)]
struct MockAdapter {
    state: Mutex<MockState>,
}

impl MockAdapter {
    fn set_playing(&self, playing: bool) {
        let mut state = self.state.lock().unwrap();
        if state.playing != playing {
            state.playing = playing;
            for callback in state.playing_observers.values() {
                callback(playing);
            }
        }
    }

    fn emit_status(&self, status: ItemStatus) {
        let state = self.state.lock().unwrap();
        for callback in state.status_observers.values() {
            callback(status);
        }
    }

    fn fire_boundary(&self) {
        let state = self.state.lock().unwrap();
        for (_, callback) in state.boundary_observers.values() {
            callback();
        }
    }

    fn fire_retired_boundaries(&self) {
        let state = self.state.lock().unwrap();
        for callback in &state.retired_boundaries {
            callback();
        }
    }

    fn set_position(&self, position: Duration) {
        self.state.lock().unwrap().position = position;
    }

    fn position_calls(&self) -> usize {
        self.state.lock().unwrap().position_calls
    }

    fn active_boundaries(&self) -> Vec<Duration> {
        let state = self.state.lock().unwrap();
        state.boundary_observers.values().map(|(at, _)| *at).collect()
    }

    fn observer_count(&self) -> usize {
        let state = self.state.lock().unwrap();
        state.status_observers.len() + state.playing_observers.len() + state.boundary_observers.len()
    }

    fn loaded(&self) -> Vec<String> {
        self.state.lock().unwrap().loaded.clone()
    }

    fn seeks(&self) -> Vec<Duration> {
        self.state.lock().unwrap().seeks.clone()
    }

    fn next_handle(state: &mut MockState) -> ObserverHandle {
        state.next_handle += 1;
        ObserverHandle::new(state.next_handle)
    }
}

#[async_trait]
impl NativePlayerAdapter for MockAdapter {
    fn load(&self, uri: &str) -> Result<(), AdapterError> {
        if uri.starts_with("bad://") {
            return Err(AdapterError::InvalidUri(uri.to_string()));
        }

        let mut state = self.state.lock().unwrap();
        state.loaded.push(uri.to_string());
        state.position = Duration::ZERO;
        state.duration = if uri.starts_with("live://") {
            None
        } else {
            Some(TRACK_DURATION)
        };
        Ok(())
    }

    fn play(&self) {
        self.set_playing(true);
    }

    fn pause(&self) {
        self.set_playing(false);
    }

    fn seek_to(&self, time: Duration) {
        let mut state = self.state.lock().unwrap();
        state.position = time;
        state.seeks.push(time);
    }

    fn is_playing(&self) -> bool {
        self.state.lock().unwrap().playing
    }

    fn current_position(&self) -> Duration {
        let mut state = self.state.lock().unwrap();
        state.position_calls += 1;
        state.position
    }

    fn current_item_duration(&self) -> Option<Duration> {
        self.state.lock().unwrap().duration
    }

    async fn load_item_duration(&self) -> Option<Duration> {
        self.state.lock().unwrap().duration
    }

    fn observe_status(&self, callback: StatusCallback) -> ObserverHandle {
        let mut state = self.state.lock().unwrap();
        let handle = Self::next_handle(&mut state);
        state.status_observers.insert(handle.id(), callback);
        handle
    }

    fn observe_playing_changed(&self, callback: PlayingCallback) -> ObserverHandle {
        let mut state = self.state.lock().unwrap();
        let handle = Self::next_handle(&mut state);
        state.playing_observers.insert(handle.id(), callback);
        handle
    }

    fn observe_boundary(&self, at: Duration, callback: BoundaryCallback) -> ObserverHandle {
        let mut state = self.state.lock().unwrap();
        let handle = Self::next_handle(&mut state);
        state.boundary_observers.insert(handle.id(), (at, callback));
        handle
    }

    fn remove_observer(&self, handle: ObserverHandle) {
        let mut state = self.state.lock().unwrap();
        state.status_observers.remove(&handle.id());
        state.playing_observers.remove(&handle.id());
        if let Some((_, callback)) = state.boundary_observers.remove(&handle.id()) {
            state.retired_boundaries.push(callback);
        }
    }
}

struct MockFactory {
    adapter: Arc<MockAdapter>,
    created: AtomicUsize,
}

#[async_trait]
impl AdapterFactory for MockFactory {
    async fn create(&self) -> Result<Arc<dyn NativePlayerAdapter>, AdapterError> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(self.adapter.clone() as Arc<dyn NativePlayerAdapter>)
    }
}

// ===== Helpers =====

fn create_test_track(index: usize) -> Track {
    Track::new(
        format!("track-{}", index),
        format!("https://cdn.example.com/{}.mp3", index),
        TrackMetadata {
            title: format!("Track {}", index),
            artist: "Test Artist".to_string(),
            album_title: "Test Album".to_string(),
            artwork_uri: String::new(),
        },
    )
}

fn tracks(count: usize) -> Vec<Track> {
    (0..count).map(create_test_track).collect()
}

struct Harness {
    controller: PlaybackController,
    adapter: Arc<MockAdapter>,
    factory: Arc<MockFactory>,
    events: broadcast::Receiver<PlaybackEvent>,
}

fn spawn() -> Harness {
    let adapter = Arc::new(MockAdapter::default());
    let factory = Arc::new(MockFactory {
        adapter: adapter.clone(),
        created: AtomicUsize::new(0),
    });
    let controller =
        PlaybackController::spawn(factory.clone(), PlaybackConfig::default()).unwrap();
    let events = controller.subscribe_events();

    Harness {
        controller,
        adapter,
        factory,
        events,
    }
}

async fn spawn_with_tracks(count: usize) -> Harness {
    let harness = spawn();
    harness.controller.initialize(|| {}).await.unwrap();
    harness.controller.set_tracks(tracks(count)).await.unwrap();
    settle().await;
    harness
}

/// Let the controller task drain its notification queue
async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

fn drain(events: &mut broadcast::Receiver<PlaybackEvent>) -> Vec<PlaybackEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

// ===== Preconditions =====

#[tokio::test(start_paused = true)]
async fn commands_before_initialize_are_illegal_state() {
    let harness = spawn();

    let err = harness.controller.play_pause().await.unwrap_err();
    assert!(matches!(err, PlaybackError::IllegalState(_)));

    let err = harness.controller.set_tracks(tracks(2)).await.unwrap_err();
    assert!(matches!(err, PlaybackError::IllegalState(_)));

    let err = harness.controller.set_tracks(Vec::new()).await.unwrap_err();
    assert!(matches!(err, PlaybackError::InvalidArgument(_)));
}

#[tokio::test(start_paused = true)]
async fn transport_without_tracks_is_illegal_state() {
    let harness = spawn();
    harness.controller.initialize(|| {}).await.unwrap();

    for result in [
        harness.controller.play(0).await,
        harness.controller.skip_to_next().await,
        harness.controller.seek_forward().await,
        harness.controller.update_progress().await,
    ] {
        assert!(result.unwrap_err().is_precondition_violation());
    }
}

#[tokio::test]
async fn invalid_config_is_rejected() {
    let factory = Arc::new(MockFactory {
        adapter: Arc::new(MockAdapter::default()),
        created: AtomicUsize::new(0),
    });
    let config = PlaybackConfig {
        progress_interval_ms: 0,
        ..Default::default()
    };

    let err = PlaybackController::spawn(factory, config).unwrap_err();
    assert!(matches!(err, PlaybackError::InvalidArgument(_)));
}

// ===== Lifecycle =====

#[tokio::test(start_paused = true)]
async fn initialize_is_idempotent_and_always_calls_on_ready() {
    let mut harness = spawn();
    let ready = Arc::new(AtomicUsize::new(0));

    for _ in 0..2 {
        let ready = ready.clone();
        harness
            .controller
            .initialize(move || {
                ready.fetch_add(1, Ordering::SeqCst);
            })
            .await
            .unwrap();
    }

    assert_eq!(ready.load(Ordering::SeqCst), 2);
    assert_eq!(harness.factory.created.load(Ordering::SeqCst), 1);
    assert_eq!(drain(&mut harness.events), vec![PlaybackEvent::Initialized]);
    // status + playing observers
    assert_eq!(harness.adapter.observer_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn set_tracks_loads_first_track() {
    let mut harness = spawn();
    harness.controller.initialize(|| {}).await.unwrap();
    harness.controller.set_tracks(tracks(3)).await.unwrap();

    assert_eq!(harness.controller.current_track(), Some(create_test_track(0)));
    assert_eq!(
        harness.adapter.loaded(),
        vec!["https://cdn.example.com/0.mp3".to_string()]
    );

    let state = harness.controller.state();
    assert!(state.is_loading);
    assert!(!state.has_error);

    let events = drain(&mut harness.events);
    assert!(events.contains(&PlaybackEvent::TracksChanged { count: 3 }));
    assert!(events.contains(&PlaybackEvent::TrackChanged {
        track_id: "track-0".to_string(),
        previous_track_id: None,
    }));
}

#[tokio::test(start_paused = true)]
async fn empty_set_tracks_leaves_state_unchanged() {
    let harness = spawn_with_tracks(3).await;
    harness.controller.play(1).await.unwrap();
    settle().await;

    let before = harness.controller.state();
    let err = harness.controller.set_tracks(Vec::new()).await.unwrap_err();

    assert!(matches!(err, PlaybackError::InvalidArgument(_)));
    assert_eq!(harness.controller.state(), before);
    assert_eq!(harness.controller.current_track(), Some(create_test_track(1)));
}

#[tokio::test(start_paused = true)]
async fn ready_status_clears_loading() {
    let harness = spawn_with_tracks(2).await;
    assert!(harness.controller.state().is_loading);

    harness.adapter.emit_status(ItemStatus::Ready);
    settle().await;

    let state = harness.controller.state();
    assert!(!state.is_loading);
    assert_eq!(state.duration, TRACK_DURATION);
}

#[tokio::test(start_paused = true)]
async fn release_twice_is_a_noop() {
    let mut harness = spawn_with_tracks(3).await;
    harness.controller.play(0).await.unwrap();
    settle().await;
    assert_eq!(harness.adapter.active_boundaries().len(), 1);
    drain(&mut harness.events);

    harness.controller.release_player().await.unwrap();
    harness.controller.release_player().await.unwrap();

    assert_eq!(harness.adapter.observer_count(), 0);
    assert!(!harness.adapter.is_playing());
    assert_eq!(drain(&mut harness.events), vec![PlaybackEvent::Released]);
    assert!(harness.controller.current_track().is_none());

    let err = harness.controller.play_pause().await.unwrap_err();
    assert!(matches!(err, PlaybackError::IllegalState(_)));
}

#[tokio::test(start_paused = true)]
async fn reinitialize_after_release_creates_new_adapter() {
    let harness = spawn_with_tracks(2).await;
    harness.controller.release_player().await.unwrap();

    harness.controller.initialize(|| {}).await.unwrap();
    harness.controller.set_tracks(tracks(2)).await.unwrap();

    assert_eq!(harness.factory.created.load(Ordering::SeqCst), 2);
    assert_eq!(harness.controller.current_track(), Some(create_test_track(0)));
}

#[tokio::test(start_paused = true)]
async fn dropping_last_handle_releases_player() {
    let harness = spawn_with_tracks(2).await;
    harness.controller.play(0).await.unwrap();
    settle().await;

    let adapter = harness.adapter.clone();
    drop(harness);
    settle().await;

    assert_eq!(adapter.observer_count(), 0);
    assert!(!adapter.is_playing());
}

// ===== Transport =====

#[tokio::test(start_paused = true)]
async fn play_pause_follows_native_flag() {
    let harness = spawn_with_tracks(2).await;

    harness.controller.play_pause().await.unwrap();
    settle().await;
    assert!(harness.adapter.is_playing());
    assert!(harness.controller.state().is_playing);

    // Engine paused on its own (e.g. audio focus loss)
    harness.adapter.set_playing(false);
    settle().await;

    harness.controller.play_pause().await.unwrap();
    settle().await;
    assert!(harness.adapter.is_playing());

    harness.controller.play_pause().await.unwrap();
    settle().await;
    assert!(!harness.adapter.is_playing());
    assert!(!harness.controller.state().is_playing);
}

#[tokio::test(start_paused = true)]
async fn stop_pauses_and_rewinds() {
    let harness = spawn_with_tracks(2).await;
    harness.controller.resume().await.unwrap();
    harness.adapter.set_position(Duration::from_secs(42));

    harness.controller.stop().await.unwrap();
    settle().await;

    assert!(!harness.adapter.is_playing());
    assert_eq!(harness.adapter.seeks().last(), Some(&Duration::ZERO));
    assert_eq!(harness.controller.state().progress.time, Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn play_index_loads_and_plays() {
    let mut harness = spawn_with_tracks(3).await;
    drain(&mut harness.events);

    harness.controller.play(2).await.unwrap();
    settle().await;

    assert!(harness.adapter.is_playing());
    assert_eq!(harness.controller.current_track(), Some(create_test_track(2)));
    assert_eq!(
        drain(&mut harness.events),
        vec![PlaybackEvent::TrackChanged {
            track_id: "track-2".to_string(),
            previous_track_id: Some("track-0".to_string()),
        }]
    );

    let err = harness.controller.play(3).await.unwrap_err();
    assert!(matches!(err, PlaybackError::IndexOutOfBounds { index: 3, len: 3 }));
    // Rejected index keeps the current item's boundary
    assert_eq!(harness.adapter.active_boundaries(), vec![TRACK_DURATION]);
}

#[tokio::test(start_paused = true)]
async fn skip_previous_at_start_seeks_to_zero() {
    let harness = spawn_with_tracks(3).await;
    harness.adapter.set_position(Duration::from_secs(30));

    harness.controller.skip_to_previous().await.unwrap();

    assert_eq!(harness.adapter.seeks(), vec![Duration::ZERO]);
    assert_eq!(harness.controller.current_track(), Some(create_test_track(0)));
}

#[tokio::test(start_paused = true)]
async fn skip_next_past_end_stops_playback() {
    let mut harness = spawn_with_tracks(2).await;
    harness.controller.play(1).await.unwrap();
    settle().await;
    drain(&mut harness.events);

    harness.controller.skip_to_next().await.unwrap();
    settle().await;

    assert!(!harness.adapter.is_playing());
    assert_eq!(harness.controller.current_track(), Some(create_test_track(1)));
    assert_eq!(drain(&mut harness.events), vec![PlaybackEvent::QueueEnded]);
}

#[tokio::test(start_paused = true)]
async fn skip_next_with_repeat_all_wraps_to_first_track() {
    let harness = spawn_with_tracks(2).await;
    harness.controller.toggle_repeat_mode().await.unwrap();
    harness.controller.toggle_repeat_mode().await.unwrap();
    harness.controller.play(1).await.unwrap();
    settle().await;

    harness.controller.skip_to_next().await.unwrap();
    settle().await;

    assert_eq!(
        harness.adapter.loaded().last().map(String::as_str),
        Some("https://cdn.example.com/0.mp3")
    );
    assert_eq!(harness.controller.current_track(), Some(create_test_track(0)));
    assert!(harness.adapter.is_playing());
    assert!(harness.controller.state().is_playing);
}

#[tokio::test(start_paused = true)]
async fn seeks_are_clamped_and_noop_at_bounds() {
    let harness = spawn_with_tracks(1).await;

    harness.adapter.set_position(Duration::from_secs(3));
    harness.controller.seek_backward().await.unwrap();
    assert_eq!(harness.adapter.seeks(), vec![Duration::ZERO]);

    // Already at zero
    harness.controller.seek_backward().await.unwrap();
    assert_eq!(harness.adapter.seeks().len(), 1);

    harness.adapter.set_position(Duration::from_secs(170));
    harness.controller.seek_forward().await.unwrap();
    assert_eq!(harness.adapter.seeks().last(), Some(&TRACK_DURATION));

    // Already at the end
    harness.controller.seek_forward().await.unwrap();
    assert_eq!(harness.adapter.seeks().len(), 2);

    harness.controller.seek_to(Duration::from_secs(600)).await.unwrap();
    assert_eq!(harness.adapter.seeks().last(), Some(&TRACK_DURATION));

    let state = harness.controller.state();
    assert_eq!(state.progress.position, 1.0);
    assert_eq!(state.time_label(), "3:00");
}

#[tokio::test(start_paused = true)]
async fn seek_forward_without_duration_is_noop() {
    let harness = spawn();
    harness.controller.initialize(|| {}).await.unwrap();
    harness
        .controller
        .set_tracks(vec![Track::new("radio", "live://radio", TrackMetadata::default())])
        .await
        .unwrap();
    settle().await;

    harness.controller.seek_forward().await.unwrap();
    assert!(harness.adapter.seeks().is_empty());
    // No duration, no boundary
    assert!(harness.adapter.active_boundaries().is_empty());
}

#[tokio::test(start_paused = true)]
async fn update_progress_bumps_timestamp() {
    let harness = spawn_with_tracks(1).await;
    harness.adapter.set_position(Duration::from_secs(45));

    harness.controller.update_progress().await.unwrap();
    let first = harness.controller.state();
    harness.controller.update_progress().await.unwrap();
    let second = harness.controller.state();

    assert_eq!(first.progress.time, Duration::from_secs(45));
    assert!((first.progress.position - 0.25).abs() < f32::EPSILON);
    assert!(second.progress.timestamp > first.progress.timestamp);
}

// ===== Progress polling =====

#[tokio::test(start_paused = true)]
async fn poller_refreshes_while_playing() {
    let harness = spawn_with_tracks(1).await;
    harness.controller.resume().await.unwrap();
    settle().await;

    let before = harness.adapter.position_calls();
    tokio::time::sleep(Duration::from_millis(500)).await;
    let refreshes = harness.adapter.position_calls() - before;

    // 50ms cadence
    assert!((9..=11).contains(&refreshes), "got {} refreshes", refreshes);
}

#[tokio::test(start_paused = true)]
async fn no_refresh_after_pause() {
    let harness = spawn_with_tracks(1).await;
    harness.controller.resume().await.unwrap();
    settle().await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    harness.controller.pause().await.unwrap();
    settle().await;

    let after_pause = harness.adapter.position_calls();
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(harness.adapter.position_calls(), after_pause);
}

#[tokio::test(start_paused = true)]
async fn rapid_commands_leave_one_timer_and_one_boundary() {
    let harness = spawn_with_tracks(5).await;
    harness.controller.toggle_repeat_mode().await.unwrap();
    harness.controller.toggle_repeat_mode().await.unwrap();

    for i in 0..25 {
        harness.controller.play_pause().await.unwrap();
        harness.controller.skip_to_next().await.unwrap();
        if i % 3 == 0 {
            harness.controller.skip_to_previous().await.unwrap();
        }
        harness.controller.resume().await.unwrap();
    }
    settle().await;

    assert_eq!(harness.adapter.active_boundaries(), vec![TRACK_DURATION]);

    let before = harness.adapter.position_calls();
    tokio::time::sleep(Duration::from_secs(1)).await;
    let refreshes = harness.adapter.position_calls() - before;
    assert!(refreshes <= 21, "duplicate polling loops: {} refreshes", refreshes);
}

// ===== Auto-advance =====

#[tokio::test(start_paused = true)]
async fn boundary_advances_to_next_track() {
    let mut harness = spawn_with_tracks(3).await;
    harness.controller.play(0).await.unwrap();
    settle().await;
    assert_eq!(harness.adapter.active_boundaries(), vec![TRACK_DURATION]);
    drain(&mut harness.events);

    harness.adapter.fire_boundary();
    settle().await;

    assert_eq!(harness.controller.current_track(), Some(create_test_track(1)));
    assert_eq!(
        harness.adapter.loaded().last().map(String::as_str),
        Some("https://cdn.example.com/1.mp3")
    );
    assert_eq!(harness.adapter.active_boundaries().len(), 1);
    assert_eq!(
        drain(&mut harness.events),
        vec![
            PlaybackEvent::TrackFinished {
                track_id: "track-0".to_string()
            },
            PlaybackEvent::TrackChanged {
                track_id: "track-1".to_string(),
                previous_track_id: Some("track-0".to_string()),
            },
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn boundary_on_last_track_stops() {
    let mut harness = spawn_with_tracks(2).await;
    harness.controller.play(1).await.unwrap();
    settle().await;
    drain(&mut harness.events);

    harness.adapter.fire_boundary();
    settle().await;

    assert!(!harness.adapter.is_playing());
    assert_eq!(harness.controller.current_track(), Some(create_test_track(1)));
    assert!(harness.adapter.active_boundaries().is_empty());
    assert_eq!(
        drain(&mut harness.events),
        vec![
            PlaybackEvent::TrackFinished {
                track_id: "track-1".to_string()
            },
            PlaybackEvent::QueueEnded,
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn repeat_one_replays_current_track() {
    let harness = spawn_with_tracks(3).await;
    harness.controller.toggle_repeat_mode().await.unwrap();
    assert_eq!(harness.controller.state().repeat_mode, RepeatMode::One);

    harness.controller.play(1).await.unwrap();
    settle().await;
    let loads = harness.adapter.loaded().len();

    harness.adapter.fire_boundary();
    settle().await;

    assert_eq!(harness.adapter.loaded().len(), loads + 1);
    assert_eq!(harness.controller.current_track(), Some(create_test_track(1)));
    assert!(harness.adapter.is_playing());
}

#[tokio::test(start_paused = true)]
async fn repeat_all_wraps_to_first_track() {
    let harness = spawn_with_tracks(2).await;
    harness.controller.toggle_repeat_mode().await.unwrap();
    harness.controller.toggle_repeat_mode().await.unwrap();
    harness.controller.play(1).await.unwrap();
    settle().await;

    harness.adapter.fire_boundary();
    settle().await;

    assert_eq!(harness.controller.current_track(), Some(create_test_track(0)));
    assert!(harness.adapter.is_playing());
}

#[tokio::test(start_paused = true)]
async fn replaced_track_boundary_is_ignored() {
    let mut harness = spawn_with_tracks(3).await;
    harness.controller.play(0).await.unwrap();
    settle().await;

    harness.controller.skip_to_next().await.unwrap();
    settle().await;
    drain(&mut harness.events);

    // Observer of track 0 fires late
    harness.adapter.fire_retired_boundaries();
    settle().await;

    assert_eq!(harness.controller.current_track(), Some(create_test_track(1)));
    assert!(drain(&mut harness.events).is_empty());
}

#[tokio::test(start_paused = true)]
async fn pause_removes_boundary_and_resume_restores_it() {
    let harness = spawn_with_tracks(3).await;
    harness.controller.play(0).await.unwrap();
    settle().await;
    assert_eq!(harness.adapter.active_boundaries(), vec![TRACK_DURATION]);

    harness.controller.pause().await.unwrap();
    settle().await;
    assert!(harness.adapter.active_boundaries().is_empty());

    harness.controller.resume().await.unwrap();
    settle().await;
    assert_eq!(harness.adapter.active_boundaries(), vec![TRACK_DURATION]);

    // Restored observer still advances
    harness.adapter.fire_boundary();
    settle().await;
    assert_eq!(harness.controller.current_track(), Some(create_test_track(1)));
}

#[tokio::test(start_paused = true)]
async fn boundary_queued_before_pause_does_not_advance() {
    let mut harness = spawn_with_tracks(3).await;
    harness.controller.play(0).await.unwrap();
    settle().await;
    drain(&mut harness.events);

    // Firing lands in the controller's queue right before the pause command
    harness.adapter.fire_boundary();
    harness.controller.pause().await.unwrap();
    settle().await;

    assert!(!harness.adapter.is_playing());
    assert!(!harness.controller.state().is_playing);
    assert_eq!(harness.controller.current_track(), Some(create_test_track(0)));
    assert!(harness.adapter.active_boundaries().is_empty());
    assert!(drain(&mut harness.events).is_empty());
}

#[tokio::test(start_paused = true)]
async fn stop_removes_boundary() {
    let harness = spawn_with_tracks(2).await;
    harness.controller.play(0).await.unwrap();
    settle().await;

    harness.controller.stop().await.unwrap();
    settle().await;

    assert!(harness.adapter.active_boundaries().is_empty());
    harness.adapter.fire_retired_boundaries();
    settle().await;
    assert_eq!(harness.controller.current_track(), Some(create_test_track(0)));
}

// ===== Errors =====

#[tokio::test(start_paused = true)]
async fn load_failure_surfaces_as_has_error() {
    let mut harness = spawn();
    harness.controller.initialize(|| {}).await.unwrap();
    harness
        .controller
        .set_tracks(vec![
            Track::new("broken", "bad://broken", TrackMetadata::default()),
            create_test_track(1),
        ])
        .await
        .unwrap();
    settle().await;

    let state = harness.controller.state();
    assert!(state.has_error);
    assert!(!state.is_loading);
    assert!(harness.adapter.active_boundaries().is_empty());
    assert!(drain(&mut harness.events)
        .iter()
        .any(|e| matches!(e, PlaybackEvent::Error { .. })));

    // Explicit skip still works; a successful load clears the error
    harness.controller.skip_to_next().await.unwrap();
    settle().await;
    assert_eq!(harness.controller.current_track(), Some(create_test_track(1)));

    harness.adapter.emit_status(ItemStatus::Ready);
    settle().await;
    assert!(!harness.controller.state().has_error);
}

#[tokio::test(start_paused = true)]
async fn failed_status_disables_auto_advance() {
    let harness = spawn_with_tracks(3).await;
    harness.controller.play(0).await.unwrap();
    settle().await;
    assert_eq!(harness.adapter.active_boundaries().len(), 1);

    harness.adapter.emit_status(ItemStatus::Failed);
    settle().await;

    let state = harness.controller.state();
    assert!(state.has_error);
    assert!(harness.adapter.active_boundaries().is_empty());

    harness.adapter.fire_retired_boundaries();
    settle().await;
    assert_eq!(harness.controller.current_track(), Some(create_test_track(0)));
}

// ===== Modes =====

#[tokio::test(start_paused = true)]
async fn toggles_update_state_without_player() {
    let harness = spawn();

    harness.controller.toggle_repeat_mode().await.unwrap();
    harness.controller.toggle_shuffle_mode().await.unwrap();

    let state = harness.controller.state();
    assert_eq!(state.repeat_mode, RepeatMode::One);
    assert!(state.is_shuffle_mode_on);
}

#[tokio::test(start_paused = true)]
async fn shuffle_toggle_keeps_current_track_playing() {
    let harness = spawn_with_tracks(6).await;
    harness.controller.play(3).await.unwrap();
    settle().await;
    let loads = harness.adapter.loaded().len();

    harness.controller.toggle_shuffle_mode().await.unwrap();
    settle().await;

    assert!(harness.controller.state().is_shuffle_mode_on);
    assert_eq!(harness.controller.current_track(), Some(create_test_track(3)));
    assert_eq!(harness.adapter.loaded().len(), loads);
}

#[tokio::test(start_paused = true)]
async fn modes_survive_set_tracks() {
    let harness = spawn_with_tracks(2).await;
    harness.controller.toggle_repeat_mode().await.unwrap();
    harness.controller.toggle_shuffle_mode().await.unwrap();

    harness.controller.set_tracks(tracks(4)).await.unwrap();

    let state = harness.controller.state();
    assert_eq!(state.repeat_mode, RepeatMode::One);
    assert!(state.is_shuffle_mode_on);
    assert_eq!(harness.controller.current_track(), Some(create_test_track(0)));
}

#[tokio::test(start_paused = true)]
async fn exposes_seek_increments() {
    let harness = spawn();
    assert_eq!(harness.controller.seek_back_increment(), Duration::from_secs(5));
    assert_eq!(harness.controller.seek_forward_increment(), Duration::from_secs(15));
}
