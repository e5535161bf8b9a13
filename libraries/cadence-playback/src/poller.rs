//! Progress refresh scheduling
//!
//! A single-shot timer that the controller re-arms after each refresh
//! while audio is playing. Re-arming always cancels first, so at most one
//! refresh is ever pending.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::controller::Notification;

/// Poller state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    /// No refresh scheduled
    Idle,
    /// One refresh pending
    Polling,
}

/// Delayed-refresh scheduler
///
/// Each scheduled timer carries the generation it was armed with. Cancelling
/// bumps the generation, so a timer that already fired before being aborted
/// is recognised as stale by [`ProgressPoller::take_due`].
#[derive(Debug)]
pub struct ProgressPoller {
    interval: Duration,
    generation: u64,
    pending: Option<JoinHandle<()>>,
}

impl ProgressPoller {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            generation: 0,
            pending: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn state(&self) -> PollerState {
        if self.pending.is_some() {
            PollerState::Polling
        } else {
            PollerState::Idle
        }
    }

    pub fn is_polling(&self) -> bool {
        self.state() == PollerState::Polling
    }

    /// Arm a refresh after the configured interval, replacing any pending one
    pub(crate) fn schedule(&mut self, notifier: &mpsc::UnboundedSender<Notification>) {
        self.cancel();

        let generation = self.generation;
        let interval = self.interval;
        let notifier = notifier.clone();

        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(interval).await;
            if notifier.send(Notification::RefreshDue { generation }).is_err() {
                tracing::trace!("Controller gone before refresh fired");
            }
        }));
    }

    /// Drop the pending refresh (if any) and return to Idle
    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
            tracing::trace!("Progress refresh cancelled");
        }
        self.generation = self.generation.wrapping_add(1);
    }

    /// Accept a fired timer
    ///
    /// Returns `false` for timers that were cancelled or replaced.
    pub(crate) fn take_due(&mut self, generation: u64) -> bool {
        if self.pending.is_none() || generation != self.generation {
            tracing::debug!("Dropping stale progress refresh (generation {})", generation);
            return false;
        }

        self.pending = None;
        true
    }
}

impl Drop for ProgressPoller {
    fn drop(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}
