//! Observable state cells
//!
//! Both cells are backed by `tokio::sync::watch`: readers always see the
//! latest value and late subscribers start from it.

use tokio::sync::watch;

use crate::types::{clamp_position, PlaybackState, Track};

/// Single source of truth for [`PlaybackState`]
///
/// Every update replaces the whole snapshot and stamps a fresh progress
/// timestamp, so two refreshes with identical positions are still distinct.
#[derive(Debug)]
pub struct PlaybackStateStore {
    sender: watch::Sender<PlaybackState>,
    tick: u64,
}

impl PlaybackStateStore {
    pub fn new(initial: PlaybackState) -> Self {
        let (sender, _) = watch::channel(initial);
        Self { sender, tick: 0 }
    }

    /// Latest snapshot
    pub fn get(&self) -> PlaybackState {
        self.sender.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PlaybackState> {
        self.sender.subscribe()
    }

    /// Derive the next snapshot from the current one and publish it
    pub fn update(&mut self, f: impl FnOnce(PlaybackState) -> PlaybackState) -> PlaybackState {
        let mut next = f(self.get());
        next.progress.position = clamp_position(next.progress.position);

        self.tick += 1;
        next.progress.timestamp = self.tick;

        self.sender.send_replace(next.clone());
        next
    }
}

/// Observable "currently selected track" cell
#[derive(Debug)]
pub struct TrackSlot {
    sender: watch::Sender<Option<Track>>,
}

impl TrackSlot {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(None);
        Self { sender }
    }

    pub fn get(&self) -> Option<Track> {
        self.sender.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Track>> {
        self.sender.subscribe()
    }

    /// Publish a new current track, returning the previous one
    pub fn set(&self, track: Option<Track>) -> Option<Track> {
        self.sender.send_replace(track)
    }
}

impl Default for TrackSlot {
    fn default() -> Self {
        Self::new()
    }
}
