//! Notasync Core - temporal cursor synchronization for rendered notation
//!
//! Keeps a visual cursor on a rendered score in step with an external media
//! clock, and lets the user drag that cursor to seek the clock:
//! - `timeline`: score linearized into time-ranged pointers, with a cached locator
//! - `cursor`: interpolating cursor and notehead highlighting
//! - `looping`: activatable loop range
//! - `pointer`: raw input adapter and hover/drag state machine
//! - `scroller`: scroll-follow behavior
//! - `events`: typed event bus
//! - `session`: one engine instance per loaded score
//! - `headless`: in-memory collaborators for simulation and tests

pub mod config;
pub mod cursor;
pub mod error;
pub mod events;
pub mod headless;
pub mod looping;
pub mod pointer;
pub mod score;
pub mod scroller;
pub mod session;
pub mod surface;
pub mod timeline;
pub mod types;

pub use error::{SurfaceError, SyncError, SyncResult};
pub use events::{EventBus, EventKind, SyncEvent};
pub use session::SyncSession;
pub use types::*;
