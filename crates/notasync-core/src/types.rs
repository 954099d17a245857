//! Common types for notasync
//!
//! This module contains the small value types shared by every component of
//! the synchronization engine: half-open number ranges, pixel boxes, and the
//! opaque handles the engine receives from the rendering surface.

use serde::{Deserialize, Serialize};

/// Padding added around the lerp cursor when computing its visible box (px)
pub const CURSOR_BOX_PADDING_PX: f64 = 20.0;

/// Duration of cursor style transitions (ms)
pub const CURSOR_STYLE_TRANSITION_MS: u32 = 250;

/// A half-open range `[start, end)` of f64 values
///
/// The constructor orders its bounds, so `start <= end` always holds. Used
/// for time ranges (ms), beat ranges and pixel spans.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct NumberRange {
    start: f64,
    end: f64,
}

impl NumberRange {
    /// Create a range from two bounds in any order
    pub fn new(a: f64, b: f64) -> Self {
        if a <= b {
            Self { start: a, end: b }
        } else {
            Self { start: b, end: a }
        }
    }

    /// Lower (inclusive) bound
    #[inline]
    pub fn start(&self) -> f64 {
        self.start
    }

    /// Upper (exclusive) bound
    #[inline]
    pub fn end(&self) -> f64 {
        self.end
    }

    /// Length of the range
    #[inline]
    pub fn size(&self) -> f64 {
        self.end - self.start
    }

    /// Whether `value` lies in `[start, end)`
    #[inline]
    pub fn contains(&self, value: f64) -> bool {
        self.start <= value && value < self.end
    }

    /// Position of `value` inside the range as a fraction clamped to `[0, 1]`
    ///
    /// Zero-sized ranges report 0.
    pub fn fraction_of(&self, value: f64) -> f64 {
        let size = self.size();
        if size <= 0.0 {
            return 0.0;
        }
        ((value - self.start) / size).clamp(0.0, 1.0)
    }

    /// Linear interpolation from `start` to `end`
    #[inline]
    pub fn lerp(&self, fraction: f64) -> f64 {
        self.start + self.size() * fraction
    }
}

/// An axis-aligned pixel box
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PixelBox {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl PixelBox {
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self {
            x0: x0.min(x1),
            y0: y0.min(y1),
            x1: x0.max(x1),
            y1: y0.max(y1),
        }
    }

    /// Build a box from its left/top corner and size
    pub fn from_origin(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self::new(left, top, left + width, top + height)
    }

    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }

    /// Grow the box by `padding` on every side, clamping the result at 0
    pub fn padded(&self, padding: f64) -> Self {
        Self {
            x0: (self.x0 - padding).max(0.0),
            y0: (self.y0 - padding).max(0.0),
            x1: (self.x1 + padding).max(0.0),
            y1: (self.y1 + padding).max(0.0),
        }
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        self.x0 <= x && x <= self.x1 && self.y0 <= y && y <= self.y1
    }

    /// Whether `other` lies fully inside this box
    pub fn encloses(&self, other: &PixelBox) -> bool {
        self.x0 <= other.x0 && other.x1 <= self.x1 && self.y0 <= other.y0 && other.y1 <= self.y1
    }
}

/// Why a cursor update happened
///
/// Only drives cosmetic styling, never positioning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdateCause {
    #[default]
    Unknown,
    /// The user is dragging the cursor
    Interaction,
}

/// Opaque position handle produced by the score for a beat position
///
/// The engine never inspects it; it only hands it back to the rendering
/// surface for coordinate lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PositionMarker(pub u64);

/// Opaque handle to a rendered notehead (used for coloring)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NoteheadId(pub u64);

/// Handle to a cursor element created on the rendering surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CursorId(pub u32);

/// A pointer position in surface coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SurfacePoint {
    pub x: f64,
    pub y: f64,
}

impl SurfacePoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}
