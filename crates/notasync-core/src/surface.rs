//! Host-side collaborators
//!
//! The engine talks to the rendered notation, the scroll container and the
//! media clock only through these traits. Implementations are owned by the
//! host; the engine holds them behind `Rc` and calls their public contract.
//! All methods take `&self` (surface, container) because the same handle is
//! shared by several cursors; implementations use interior mutability.

use crate::error::SurfaceError;
use crate::types::{CursorId, NoteheadId, PixelBox, PositionMarker, SurfacePoint};

/// Cursor element shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorKind {
    /// Full-width box over the current position
    Standard,
    /// Thin line at the left edge of the position
    ThinLeft,
}

/// Options for creating a cursor element
#[derive(Debug, Clone, PartialEq)]
pub struct CursorOptions {
    pub kind: CursorKind,
    pub color: String,
    pub alpha: f32,
}

/// Graphical placement of a position marker
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkerGeometry {
    /// Left edge of the position (px)
    pub x: f64,
    /// Top of the system the position is engraved on (px)
    pub y: f64,
    /// System height (px)
    pub height: f64,
    /// Right edge of the system (px)
    pub line_right: f64,
}

/// The rendered notation
pub trait RenderSurface {
    /// Create a cursor element, initially hidden
    fn create_cursor(&self, options: &CursorOptions) -> CursorId;

    /// Remove a cursor element
    fn remove_cursor(&self, id: CursorId);

    /// Place a cursor over a position marker
    fn move_cursor_to(&self, id: CursorId, marker: PositionMarker) -> Result<(), SurfaceError>;

    /// Set only the horizontal position of a cursor (px)
    fn set_cursor_left(&self, id: CursorId, x: f64) -> Result<(), SurfaceError>;

    fn show_cursor(&self, id: CursorId);

    fn hide_cursor(&self, id: CursorId);

    fn set_cursor_style(&self, id: CursorId, property: &str, value: &str);

    fn clear_cursor_style(&self, id: CursorId, property: &str);

    /// Current bounds of a cursor, `None` when hidden or unplaced
    fn cursor_bounds(&self, id: CursorId) -> Option<PixelBox>;

    /// Placement of a marker
    fn marker_geometry(&self, marker: PositionMarker) -> Result<MarkerGeometry, SurfaceError>;

    /// Index of the system under a surface y coordinate
    fn line_at_y(&self, y: f64) -> Option<usize>;

    /// Color a notehead, `None` restores its engraved color
    fn set_notehead_color(&self, id: NoteheadId, color: Option<&str>);

    /// Convert client (device) coordinates to surface coordinates
    fn client_to_surface(&self, client_x: f64, client_y: f64) -> SurfacePoint;
}

/// Scrollable element hosting the surface
pub trait ScrollContainer {
    /// Visible region in surface coordinates
    fn viewport(&self) -> PixelBox;

    /// Scroll so that `top` is the first visible surface row
    fn scroll_to(&self, top: f64);
}

/// The external media clock
///
/// Owned and driven by the host; the engine only calls it.
pub trait Clock {
    fn current_time_ms(&self) -> f64;

    fn seek(&mut self, time_ms: f64);

    /// Pause for a user interaction, remembering whether playback was running
    fn suspend(&mut self);

    /// Undo [`Clock::suspend`], resuming playback if it was running
    fn unsuspend(&mut self);

    fn play(&mut self);

    fn pause(&mut self);
}
