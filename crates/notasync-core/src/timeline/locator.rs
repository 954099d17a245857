//! Locator - maps wall-clock time to timeline pointers
//!
//! Each locator caches the pointer it found last. Forward playback moves at
//! most one pointer per tick, so checking the cached pointer and its two
//! neighbours answers almost every call in O(1) ("cheap"). Anything else,
//! typically a user seek, falls back to a binary search ("expensive").
//!
//! The cache is private state: every cursor owns its own locator (see
//! [`Locator::fork`]) so that, say, the loop cursors never disturb the main
//! cursor's cheap path.

use std::rc::Rc;

use crate::error::SurfaceError;
use crate::surface::{MarkerGeometry, RenderSurface};
use crate::types::{PositionMarker, SurfacePoint};

use super::index::{Pointer, TimelineIndex};

/// How much work a locate call needed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LocateCost {
    /// Nothing to search (empty timeline or unusable input)
    #[default]
    Unknown,
    /// Answered from the cached pointer or one of its neighbours
    Cheap,
    /// Answered by binary search
    Expensive,
}

/// Outcome of a single locate call
#[derive(Debug, Clone)]
pub struct LocateResult {
    pub time_ms: f64,
    pub cost: LocateCost,
    /// `None` when `time_ms` is outside the playable range
    pub pointer: Option<Rc<Pointer>>,
}

impl LocateResult {
    fn new(time_ms: f64, cost: LocateCost, pointer: Option<Rc<Pointer>>) -> Self {
        Self {
            time_ms,
            cost,
            pointer,
        }
    }

    /// Position of `time_ms` inside the found pointer, clamped to `[0, 1]`
    ///
    /// Only ever used for continuous visual state.
    pub fn fraction(&self) -> f64 {
        self.pointer
            .as_ref()
            .map(|p| p.time_ms_range.fraction_of(self.time_ms))
            .unwrap_or(0.0)
    }

    pub fn pointer_index(&self) -> Option<usize> {
        self.pointer.as_ref().map(|p| p.index)
    }
}

/// Time-to-pointer lookup with a last-result cache
pub struct Locator {
    timeline: Rc<TimelineIndex>,
    surface: Rc<dyn RenderSurface>,
    cached: Option<usize>,
}

impl Locator {
    pub fn new(timeline: Rc<TimelineIndex>, surface: Rc<dyn RenderSurface>) -> Self {
        Self {
            timeline,
            surface,
            cached: None,
        }
    }

    /// Independent locator over the same timeline, with an empty cache
    pub fn fork(&self) -> Self {
        Self::new(Rc::clone(&self.timeline), Rc::clone(&self.surface))
    }

    pub fn timeline(&self) -> &Rc<TimelineIndex> {
        &self.timeline
    }

    /// Index of the cached pointer
    pub fn cached_index(&self) -> Option<usize> {
        self.cached
    }

    /// Forget the cached pointer
    pub fn reset(&mut self) {
        self.cached = None;
    }

    /// Find the pointer whose time range contains `time_ms`
    pub fn locate(&mut self, time_ms: f64) -> LocateResult {
        if !time_ms.is_finite() || self.timeline.is_empty() {
            return LocateResult::new(time_ms, LocateCost::Unknown, None);
        }

        if let Some(result) = self.locate_cheap(time_ms) {
            return result;
        }

        self.locate_expensive(time_ms)
    }

    /// Cached pointer, its neighbours, or the boundary it already sits on
    fn locate_cheap(&mut self, time_ms: f64) -> Option<LocateResult> {
        let timeline = Rc::clone(&self.timeline);
        let cached = timeline.get(self.cached?)?;

        if cached.time_ms_range.contains(time_ms) {
            return Some(LocateResult::new(time_ms, LocateCost::Cheap, Some(Rc::clone(cached))));
        }

        let neighbour = if time_ms >= cached.time_ms_range.end() {
            timeline.next(cached)
        } else {
            timeline.prev(cached)
        };
        if let Some(neighbour) = neighbour.filter(|p| p.time_ms_range.contains(time_ms)) {
            self.cached = Some(neighbour.index);
            return Some(LocateResult::new(time_ms, LocateCost::Cheap, Some(Rc::clone(neighbour))));
        }

        let before_first = cached.index == 0 && time_ms < cached.time_ms_range.start();
        let after_last = cached.index + 1 == timeline.len() && time_ms >= cached.time_ms_range.end();
        if before_first || after_last {
            return Some(LocateResult::new(time_ms, LocateCost::Cheap, None));
        }

        None
    }

    fn locate_expensive(&mut self, time_ms: f64) -> LocateResult {
        let timeline = Rc::clone(&self.timeline);
        let (first, last) = match (timeline.first(), timeline.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return LocateResult::new(time_ms, LocateCost::Unknown, None),
        };

        log::debug!(
            "Locator: cache miss at {:.1}ms (cached={:?}), binary searching",
            time_ms,
            self.cached
        );

        // Out of range keeps the nearest boundary cached for later cheap steps
        if time_ms < first.time_ms_range.start() {
            self.cached = Some(first.index);
            return LocateResult::new(time_ms, LocateCost::Expensive, None);
        }
        if time_ms >= last.time_ms_range.end() {
            self.cached = Some(last.index);
            return LocateResult::new(time_ms, LocateCost::Expensive, None);
        }

        match timeline.search_time(time_ms) {
            Some(pointer) => {
                self.cached = Some(pointer.index);
                LocateResult::new(time_ms, LocateCost::Expensive, Some(Rc::clone(pointer)))
            }
            None => LocateResult::new(time_ms, LocateCost::Unknown, None),
        }
    }

    /// Interpolated x coordinate for a locate result
    ///
    /// Moves from the pointer's marker toward the next marker on the same
    /// line, or toward the end of the line for the last position of a
    /// system. `None` when the surface cannot place the marker this tick.
    pub fn x_for(&self, result: &LocateResult) -> Option<f64> {
        let pointer = result.pointer.as_ref()?;
        let geometry = self.geometry(pointer.marker)?;
        let end_x = self.span_end_x(pointer, &geometry);
        Some(geometry.x + (end_x - geometry.x) * result.fraction())
    }

    /// Time under a surface position, for pointer targets on the notation
    ///
    /// Assumes pointers are engraved on non-decreasing lines in score order.
    pub fn locate_by_position(&self, point: SurfacePoint) -> Option<f64> {
        let line = self.surface.line_at_y(point.y)?;
        let timeline = &self.timeline;

        let line_start = timeline
            .iter()
            .position(|p| p.measure_line == line)?;
        let line_pointers = timeline
            .iter()
            .skip(line_start)
            .take_while(|p| p.measure_line == line);

        let mut last_on_line = None;
        for pointer in line_pointers {
            let geometry = self.geometry(pointer.marker)?;
            if point.x < geometry.x && pointer.index == line_start {
                return Some(pointer.time_ms_range.start());
            }
            let end_x = self.span_end_x(pointer, &geometry);
            if point.x < end_x {
                let width = end_x - geometry.x;
                let fraction = if width > 0.0 {
                    ((point.x - geometry.x) / width).clamp(0.0, 1.0)
                } else {
                    0.0
                };
                return Some(pointer.time_ms_range.lerp(fraction));
            }
            last_on_line = Some(pointer);
        }

        last_on_line.map(|p| p.time_ms_range.end())
    }

    fn span_end_x(&self, pointer: &Pointer, geometry: &MarkerGeometry) -> f64 {
        match self.timeline.next(pointer) {
            Some(next) if next.measure_line == pointer.measure_line => self
                .geometry(next.marker)
                .map(|g| g.x)
                .unwrap_or(geometry.line_right),
            _ => geometry.line_right,
        }
    }

    fn geometry(&self, marker: PositionMarker) -> Option<MarkerGeometry> {
        match self.surface.marker_geometry(marker) {
            Ok(geometry) => Some(geometry),
            Err(SurfaceError::MarkerNotRendered(id)) => {
                log::debug!("Locator: marker {} has no graphical position yet", id);
                None
            }
            Err(e) => {
                log::debug!("Locator: marker lookup failed: {}", e);
                None
            }
        }
    }
}
