//! Cursor - visual playback position on the rendered notation
//!
//! - [`LerpCursor`]: lagger/leader pair plus an interpolated lerper
//! - [`ColoringOperation`]: reversible notehead highlight
//! - [`CursorSnapshot`]: committed pointer plus its highlight

mod coloring;
mod lerp;
mod snapshot;

pub use coloring::ColoringOperation;
pub use lerp::LerpCursor;
pub use snapshot::CursorSnapshot;
