//! Error types for the synchronization engine
//!
//! Only score loading is fatal. Everything that can go wrong while playing
//! (surface lookups, stray pointer events, out-of-range times) is handled
//! locally and logged, so a single bad frame never stops playback.

use thiserror::Error;

/// Errors reported by the rendering surface collaborator
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SurfaceError {
    /// The marker has no graphical position (e.g. not rendered yet)
    #[error("No graphical position for marker {0}")]
    MarkerNotRendered(u64),

    /// The cursor element no longer exists on the surface
    #[error("Cursor element {0} not found")]
    CursorNotFound(u32),

    /// Any other surface failure
    #[error("Surface error: {0}")]
    Other(String),
}

/// Errors that can occur while building or driving the engine
#[derive(Debug, Error)]
pub enum SyncError {
    /// Score entries cannot be turned into a monotonic timeline
    #[error("Invalid score at entry {index}: {reason}")]
    InvalidScore { index: usize, reason: String },

    /// Sync settings are negative or not finite
    #[error("Invalid sync settings: {0}")]
    InvalidSyncSettings(String),

    /// Engine configuration values out of range
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// An operation needs a loaded score
    #[error("{0} called before a score was loaded")]
    Uninitialized(&'static str),

    /// Rendering surface failure surfaced to the caller
    #[error("Surface error: {0}")]
    Surface(#[from] SurfaceError),
}

/// Result type for engine operations
pub type SyncResult<T> = Result<T, SyncError>;
