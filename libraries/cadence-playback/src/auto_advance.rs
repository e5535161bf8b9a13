//! End-of-track detection
//!
//! A boundary observer is registered at the current item's duration once
//! the engine resolves it. Resetting for a new item removes the previous
//! observer before anything else happens, so a replaced track can never
//! trigger an advance.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::adapter::{NativePlayerAdapter, ObserverHandle};
use crate::controller::Notification;

/// Tracks the boundary observer of the current item
///
/// Each loaded item gets a new item generation; duration resolutions and
/// boundary firings tagged with an older generation are ignored.
#[derive(Debug, Default)]
pub struct AutoAdvanceController {
    item: u64,
    resolving: Option<JoinHandle<()>>,
    boundary: Option<ObserverHandle>,
}

impl AutoAdvanceController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generation of the current item
    pub fn item(&self) -> u64 {
        self.item
    }

    pub fn has_boundary_observer(&self) -> bool {
        self.boundary.is_some()
    }

    pub fn is_resolving(&self) -> bool {
        self.resolving.is_some()
    }

    /// Forget the current item: remove its boundary and stop waiting for its duration
    pub fn reset(&mut self, adapter: Option<&dyn NativePlayerAdapter>) {
        if let Some(handle) = self.boundary.take() {
            if let Some(adapter) = adapter {
                adapter.remove_observer(handle);
            }
            tracing::debug!("Boundary observer {} removed", handle.id());
        }

        if let Some(task) = self.resolving.take() {
            task.abort();
        }

        self.item = self.item.wrapping_add(1);
    }

    /// Start resolving the freshly loaded item's duration
    pub(crate) fn arm(
        &mut self,
        adapter: Arc<dyn NativePlayerAdapter>,
        notifier: &mpsc::UnboundedSender<Notification>,
    ) {
        if let Some(task) = self.resolving.take() {
            task.abort();
        }

        let item = self.item;
        let notifier = notifier.clone();

        self.resolving = Some(tokio::spawn(async move {
            let duration = adapter.load_item_duration().await;
            if notifier
                .send(Notification::DurationResolved { item, duration })
                .is_err()
            {
                tracing::trace!("Controller gone before duration resolved");
            }
        }));
    }

    /// Bring back auto-advance for the current item after a pause
    ///
    /// Registers the boundary straight away when the engine already knows
    /// the duration, otherwise starts resolving it again. Does nothing while
    /// an observer is registered or a resolution is in flight.
    pub(crate) fn restore(
        &mut self,
        adapter: &Arc<dyn NativePlayerAdapter>,
        notifier: &mpsc::UnboundedSender<Notification>,
    ) -> Option<Duration> {
        if self.boundary.is_some() || self.resolving.is_some() {
            return None;
        }

        match adapter.current_item_duration() {
            Some(duration) => {
                self.on_duration_resolved(adapter.as_ref(), notifier, self.item, Some(duration))
            }
            None => {
                self.arm(Arc::clone(adapter), notifier);
                None
            }
        }
    }

    /// Register the boundary for a resolved duration
    ///
    /// Returns the boundary time if an observer was registered. Unknown or
    /// zero durations leave the item without auto-advance.
    pub(crate) fn on_duration_resolved(
        &mut self,
        adapter: &dyn NativePlayerAdapter,
        notifier: &mpsc::UnboundedSender<Notification>,
        item: u64,
        duration: Option<Duration>,
    ) -> Option<Duration> {
        if item != self.item {
            tracing::debug!("Dropping duration of replaced item {}", item);
            return None;
        }

        self.resolving = None;

        let Some(duration) = duration.filter(|d| !d.is_zero()) else {
            tracing::debug!("Duration unresolved, auto-advance disabled for item {}", item);
            return None;
        };

        if let Some(previous) = self.boundary.take() {
            adapter.remove_observer(previous);
        }

        let notifier = notifier.clone();
        let handle = adapter.observe_boundary(
            duration,
            Box::new(move || {
                if notifier.send(Notification::BoundaryReached { item }).is_err() {
                    tracing::trace!("Controller gone before boundary fired");
                }
            }),
        );
        self.boundary = Some(handle);

        Some(duration)
    }

    /// Accept a boundary firing, removing the observer
    ///
    /// Returns `false` for stale firings.
    pub(crate) fn on_boundary(&mut self, adapter: &dyn NativePlayerAdapter, item: u64) -> bool {
        if item != self.item {
            tracing::debug!("Dropping boundary of replaced item {}", item);
            return false;
        }

        match self.boundary.take() {
            Some(handle) => {
                adapter.remove_observer(handle);
                true
            }
            None => false,
        }
    }
}

impl Drop for AutoAdvanceController {
    fn drop(&mut self) {
        if let Some(task) = self.resolving.take() {
            task.abort();
        }
    }
}
