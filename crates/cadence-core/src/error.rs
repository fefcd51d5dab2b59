//! Drift controller error types

use thiserror::Error;

/// Errors that can occur while running a sync tick
///
/// The first four variants are transient: the tick is skipped and retried on
/// the next frame. The fault variants come from collaborator reads/writes and
/// are caught at the tick boundary.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SyncError {
    /// `activate()` has not been called yet
    #[error("Controller has not been activated")]
    NotActivated,

    /// No playback device could be resolved
    #[error("No playback device resolved")]
    DeviceUnavailable,

    /// Device has no clip loaded (or it is still loading)
    #[error("Playback clip is unknown or still loading")]
    ClipUnknown,

    /// No sync strategy selected
    #[error("No sync strategy selected")]
    ConfigIncomplete,

    /// Playback device failed a read or write
    #[error("Playback device fault: {0}")]
    DeviceFault(String),

    /// Reference clock failed to report a position
    #[error("Reference clock fault: {0}")]
    ClockFault(String),
}

impl SyncError {
    /// Whether this error just means "try again next frame"
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::NotActivated | Self::DeviceUnavailable | Self::ClipUnknown | Self::ConfigIncomplete
        )
    }
}

/// Result type for sync operations
pub type SyncResult<T> = Result<T, SyncError>;
