//! Error types for playback synchronization

use thiserror::Error;

/// Playback errors
///
/// `InvalidArgument`, `IllegalState` and `IndexOutOfBounds` are precondition
/// violations: programmer errors returned immediately. Native transport
/// failures are not errors here, they surface as `has_error` in the
/// playback snapshot.
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// Argument rejected (e.g. empty track list)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Command issued in a state that does not allow it
    #[error("Illegal state: {0}")]
    IllegalState(String),

    /// Index outside the queue
    #[error("Index out of bounds: {index} (queue length {len})")]
    IndexOutOfBounds { index: usize, len: usize },

    /// Native adapter could not be created
    #[error("Native player error: {0}")]
    Adapter(#[from] AdapterError),

    /// The controller task has shut down
    #[error("Playback controller is closed")]
    ControllerClosed,
}

impl PlaybackError {
    /// Whether this is a caller-side precondition violation
    pub fn is_precondition_violation(&self) -> bool {
        matches!(
            self,
            PlaybackError::InvalidArgument(_)
                | PlaybackError::IllegalState(_)
                | PlaybackError::IndexOutOfBounds { .. }
        )
    }
}

/// Errors reported by a native player adapter
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AdapterError {
    /// Engine could not be instantiated
    #[error("Failed to create native player: {0}")]
    CreationFailed(String),

    /// URI rejected before loading
    #[error("Invalid URI: {0:?}")]
    InvalidUri(String),

    /// Item could not be loaded
    #[error("Failed to load {uri}: {reason}")]
    LoadFailed { uri: String, reason: String },
}

/// Result type for playback operations
pub type Result<T> = std::result::Result<T, PlaybackError>;
