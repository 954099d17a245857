//! Loop - an activatable time range shown by two cursors
//!
//! The loop only visualizes and reports its range. Whoever drives playback
//! decides what to do with it (wrap the clock, deactivate it when a drag
//! leaves the range, ...). Its inner cursors use forked locators and report
//! on a private bus, so they never disturb the main cursor or its listeners.

use std::rc::Rc;

use crate::config::CursorConfig;
use crate::cursor::LerpCursor;
use crate::events::{EventBus, SyncEvent};
use crate::surface::RenderSurface;
use crate::timeline::Locator;
use crate::types::{NumberRange, UpdateCause};

/// Loop bounds in ms, always ordered
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LoopRange {
    pub start_ms: f64,
    pub end_ms: f64,
}

impl LoopRange {
    /// Bounds in any order
    pub fn new(a: f64, b: f64) -> Self {
        NumberRange::new(a, b).into()
    }

    /// Half-open containment `[start, end)`
    pub fn contains(&self, time_ms: f64) -> bool {
        NumberRange::from(*self).contains(time_ms)
    }
}

impl From<NumberRange> for LoopRange {
    fn from(range: NumberRange) -> Self {
        Self {
            start_ms: range.start(),
            end_ms: range.end(),
        }
    }
}

impl From<LoopRange> for NumberRange {
    fn from(range: LoopRange) -> Self {
        NumberRange::new(range.start_ms, range.end_ms)
    }
}

pub struct Loop {
    bus: Rc<EventBus>,
    start_cursor: LerpCursor,
    end_cursor: LerpCursor,
    range: LoopRange,
    active: bool,
}

impl Loop {
    /// Build an inactive loop over the locator's timeline
    pub fn create(
        surface: Rc<dyn RenderSurface>,
        locator: &Locator,
        bus: Rc<EventBus>,
        config: &CursorConfig,
    ) -> Self {
        let config = CursorConfig {
            notehead_coloring: false,
            ..config.clone()
        };
        let inner_bus = Rc::new(EventBus::new());

        let mut start_cursor =
            LerpCursor::create(Rc::clone(&surface), locator.fork(), Rc::clone(&inner_bus), config.clone());
        start_cursor.clear();
        let mut end_cursor = LerpCursor::create(surface, locator.fork(), inner_bus, config);
        end_cursor.clear();

        Self {
            bus,
            start_cursor,
            end_cursor,
            range: LoopRange::default(),
            active: false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn range(&self) -> LoopRange {
        self.range
    }

    /// Whether the loop is active and `time_ms` is inside it
    pub fn contains(&self, time_ms: f64) -> bool {
        self.active && self.range.contains(time_ms)
    }

    pub fn activate(&mut self) {
        if self.active {
            return;
        }
        self.active = true;
        self.show_range();
        log::info!(
            "Loop: activated [{:.1}, {:.1}) ms",
            self.range.start_ms,
            self.range.end_ms
        );
        self.bus.dispatch(SyncEvent::LoopActivated(self.range));
    }

    pub fn deactivate(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        self.start_cursor.clear();
        self.end_cursor.clear();
        log::info!("Loop: deactivated");
        self.bus.dispatch(SyncEvent::LoopDeactivated(self.range));
    }

    /// Store a new range, moving the cursors when active
    pub fn update(&mut self, range: impl Into<LoopRange>) {
        self.range = range.into();
        if self.active {
            self.show_range();
        }
        self.bus.dispatch(SyncEvent::LoopUpdated(self.range));
    }

    /// Re-place the cursors after the surface was laid out again
    ///
    /// Activation and range are unchanged, so nothing is announced.
    pub fn refresh(&mut self) {
        self.start_cursor.clear();
        self.end_cursor.clear();
        if self.active {
            self.show_range();
        }
    }

    pub fn start_cursor(&self) -> &LerpCursor {
        &self.start_cursor
    }

    pub fn end_cursor(&self) -> &LerpCursor {
        &self.end_cursor
    }

    pub fn dispose(&mut self) {
        self.active = false;
        self.start_cursor.dispose();
        self.end_cursor.dispose();
    }

    fn show_range(&mut self) {
        self.start_cursor.update(self.range.start_ms, UpdateCause::Unknown);
        self.end_cursor.update(self.range.end_ms, UpdateCause::Unknown);
    }
}
