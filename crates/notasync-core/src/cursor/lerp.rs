//! LerpCursor - smooth cursor driven by the locator
//!
//! Three cursor elements live on the surface:
//!
//! ```text
//!   lagger           leader
//!   [ pointer k     )[ pointer k+1 )
//!        |
//!        lerper (thin line at fraction of pointer k)
//! ```
//!
//! The lagger/leader pair only moves when the committed pointer changes. The
//! lerper moves every tick. Both invisible boxes exist so hosts can style or
//! inspect the committed span; only the lerper is drawn by default.

use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use crate::config::CursorConfig;
use crate::error::SurfaceError;
use crate::events::{CursorInfo, EventBus, SyncEvent};
use crate::surface::{CursorKind, CursorOptions, RenderSurface};
use crate::timeline::{LocateResult, Locator, Pointer};
use crate::types::{
    CursorId, PixelBox, PositionMarker, UpdateCause, CURSOR_BOX_PADDING_PX, CURSOR_STYLE_TRANSITION_MS,
};

use super::coloring::ColoringOperation;
use super::snapshot::CursorSnapshot;

/// Cursor following a time position with per-tick interpolation
pub struct LerpCursor {
    surface: Rc<dyn RenderSurface>,
    bus: Rc<EventBus>,
    config: CursorConfig,

    lagger: CursorId,
    leader: CursorId,
    lerper: CursorId,

    locator: Option<Locator>,
    time_ms: Option<f64>,
    cause: UpdateCause,
    snapshot: Option<CursorSnapshot>,
    last_measure: Option<usize>,
    hidden: bool,
}

impl LerpCursor {
    /// Create the cursor elements; the cursor stays inert until [`LerpCursor::init`]
    pub fn new(surface: Rc<dyn RenderSurface>, bus: Rc<EventBus>, config: CursorConfig) -> Self {
        let invisible = |kind| CursorOptions {
            kind,
            color: "transparent".to_string(),
            alpha: 0.0,
        };
        let lagger = surface.create_cursor(&invisible(CursorKind::Standard));
        let leader = surface.create_cursor(&invisible(CursorKind::Standard));
        let lerper = surface.create_cursor(&CursorOptions {
            kind: CursorKind::ThinLeft,
            color: config.lerper_color.clone(),
            alpha: 1.0,
        });

        Self {
            surface,
            bus,
            config,
            lagger,
            leader,
            lerper,
            locator: None,
            time_ms: None,
            cause: UpdateCause::Unknown,
            snapshot: None,
            last_measure: None,
            hidden: true,
        }
    }

    /// Create and initialize in one step
    pub fn create(
        surface: Rc<dyn RenderSurface>,
        locator: Locator,
        bus: Rc<EventBus>,
        config: CursorConfig,
    ) -> Self {
        let mut cursor = Self::new(surface, bus, config);
        cursor.init(locator);
        cursor
    }

    /// Apply base styles to the lerper and attach the locator
    pub fn init(&mut self, locator: Locator) {
        let element = self.lerper;
        self.surface.set_cursor_style(element, "z-index", "2");
        self.surface.set_cursor_style(element, "pointer-events", "none");
        for (prop, value) in &self.config.default_style {
            self.surface.set_cursor_style(element, prop, value);
        }

        let transitioned: BTreeSet<&str> = self
            .config
            .default_style
            .keys()
            .chain(self.config.interacting_style.keys())
            .map(String::as_str)
            .collect();
        if !transitioned.is_empty() {
            let props: Vec<&str> = transitioned.into_iter().collect();
            let transition = format!("{} {}ms", props.join(", "), CURSOR_STYLE_TRANSITION_MS);
            self.surface.set_cursor_style(element, "transition", &transition);
        }

        self.locator = Some(locator);
    }

    pub fn is_initialized(&self) -> bool {
        self.locator.is_some()
    }

    /// Move to `time_ms`
    ///
    /// Repeating the previous time is a no-op apart from a cause change.
    pub fn update(&mut self, time_ms: f64, cause: UpdateCause) {
        if self.locator.is_none() {
            log::warn!("LerpCursor::update: cannot update before init");
            return;
        }
        if cause != self.cause {
            self.on_cause_change(self.cause, cause);
            self.cause = cause;
        }
        if self.time_ms == Some(time_ms) {
            return;
        }
        self.time_ms = Some(time_ms);

        let Some(locator) = self.locator.as_mut() else {
            return;
        };
        let result = locator.locate(time_ms);

        let prev_index = self.snapshot.as_ref().map(CursorSnapshot::index);
        let prev_line = self.snapshot.as_ref().map(CursorSnapshot::measure_line);
        let next_line = result.pointer.as_ref().map(|p| p.measure_line);

        if result.pointer_index() == prev_index {
            if result.pointer.is_some() {
                self.move_lerper(&result);
            }
        } else {
            self.commit(result.pointer.clone());
            if result.pointer.is_some() {
                self.move_lerper(&result);
            }
        }

        if prev_line != next_line {
            self.bus.dispatch(SyncEvent::MeasureLineChanged { line: next_line });
        }
        self.bus.dispatch(SyncEvent::InteractableMoved);
    }

    /// Hide every element and drop the committed snapshot
    ///
    /// The next update commits again, even for the same time.
    pub fn clear(&mut self) {
        self.hide_all();
        self.time_ms = None;
    }

    fn hide_all(&mut self) {
        let had_snapshot = self.snapshot.is_some();
        if let Some(snapshot) = self.snapshot.take() {
            if let Some(coloring) = &snapshot.coloring {
                coloring.restore(self.surface.as_ref());
            }
        }
        self.surface.hide_cursor(self.lagger);
        self.surface.hide_cursor(self.leader);
        self.surface.hide_cursor(self.lerper);
        self.hidden = true;
        self.last_measure = None;

        if had_snapshot {
            self.bus.dispatch(SyncEvent::CursorSnapshotChanged { index: None });
        }
    }

    pub fn show(&mut self) {
        if !self.hidden {
            return;
        }
        self.surface.show_cursor(self.lagger);
        self.surface.show_cursor(self.leader);
        self.surface.show_cursor(self.lerper);
        self.hidden = false;
    }

    /// Padded lerper bounds, `None` while hidden
    pub fn get_box(&self) -> Option<PixelBox> {
        if self.hidden {
            return None;
        }
        self.surface
            .cursor_bounds(self.lerper)
            .map(|bounds| bounds.padded(CURSOR_BOX_PADDING_PX))
    }

    /// The drawn (interpolated) element
    pub fn element(&self) -> CursorId {
        self.lerper
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn time_ms(&self) -> Option<f64> {
        self.time_ms
    }

    pub fn cause(&self) -> UpdateCause {
        self.cause
    }

    pub fn snapshot(&self) -> Option<&CursorSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn locator(&self) -> Option<&Locator> {
        self.locator.as_ref()
    }

    /// Restore highlights and remove the elements from the surface
    pub fn dispose(&mut self) {
        if let Some(coloring) = self.snapshot.take().and_then(|s| s.coloring) {
            coloring.restore(self.surface.as_ref());
        }
        self.surface.remove_cursor(self.lagger);
        self.surface.remove_cursor(self.leader);
        self.surface.remove_cursor(self.lerper);
        self.locator = None;
        self.time_ms = None;
        self.hidden = true;
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn on_cause_change(&self, current: UpdateCause, next: UpdateCause) {
        let current_style = self.style_for(current);
        let next_style = self.style_for(next);

        for prop in current_style.keys().filter(|p| !next_style.contains_key(*p)) {
            self.surface.clear_cursor_style(self.lerper, prop);
        }
        for (prop, value) in next_style {
            self.surface.set_cursor_style(self.lerper, prop, value);
        }
    }

    fn style_for(&self, cause: UpdateCause) -> &BTreeMap<String, String> {
        match cause {
            UpdateCause::Interaction => &self.config.interacting_style,
            UpdateCause::Unknown => &self.config.default_style,
        }
    }

    /// Move lagger/leader to a new pointer and swap the highlight
    fn commit(&mut self, pointer: Option<Rc<Pointer>>) {
        let Some(pointer) = pointer else {
            self.hide_all();
            return;
        };

        self.place(self.lagger, pointer.marker);
        match self.next_marker(&pointer) {
            Some(marker) => self.place(self.leader, marker),
            None => self.place(self.leader, pointer.marker),
        }
        self.place(self.lerper, pointer.marker);
        self.show();

        if let Some(coloring) = self.snapshot.take().and_then(|s| s.coloring) {
            coloring.restore(self.surface.as_ref());
        }
        let coloring = self.config.notehead_coloring.then(|| {
            let op = ColoringOperation::for_pointer(&pointer, self.config.notehead_color.as_str());
            op.perform(self.surface.as_ref());
            op
        });

        let index = pointer.index;
        let measure_index = pointer.measure_index;
        let measure_number = pointer.measure_number;
        self.snapshot = Some(CursorSnapshot::new(pointer, coloring));

        self.bus.dispatch(SyncEvent::CursorSnapshotChanged { index: Some(index) });
        if self.last_measure != Some(measure_index) {
            self.last_measure = Some(measure_index);
            let num_measures = self
                .locator
                .as_ref()
                .map(|l| l.timeline().num_measures())
                .unwrap_or(0);
            self.bus.dispatch(SyncEvent::CursorInfoChanged(CursorInfo {
                current_measure_index: measure_index,
                current_measure_number: measure_number,
                num_measures,
            }));
        }
    }

    fn next_marker(&self, pointer: &Pointer) -> Option<PositionMarker> {
        let locator = self.locator.as_ref()?;
        locator.timeline().next(pointer).map(|p| p.marker)
    }

    fn place(&self, id: CursorId, marker: PositionMarker) {
        if let Err(e) = self.surface.move_cursor_to(id, marker) {
            log_surface_error("move_cursor_to", &e);
        }
    }

    fn move_lerper(&self, result: &LocateResult) {
        let Some(x) = self.locator.as_ref().and_then(|l| l.x_for(result)) else {
            return;
        };
        if let Err(e) = self.surface.set_cursor_left(self.lerper, x) {
            log_surface_error("set_cursor_left", &e);
        }
    }
}

fn log_surface_error(op: &str, e: &SurfaceError) {
    log::debug!("LerpCursor: {} failed: {}", op, e);
}
