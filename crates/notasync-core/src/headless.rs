//! Headless collaborators
//!
//! Deterministic, in-memory implementations of the host traits. The
//! simulator binary drives sessions with them, and tests use them to observe
//! every side effect the engine has on the "rendered" notation.
//!
//! Layout model: positions are engraved left to right, `beats_per_line`
//! beats per system, `px_per_beat` pixels per beat. A [`PositionMarker`]
//! encodes its beat in thousandths.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::SurfaceError;
use crate::score::{Score, ScoreEntry};
use crate::surface::{Clock, CursorKind, CursorOptions, MarkerGeometry, RenderSurface, ScrollContainer};
use crate::types::{CursorId, NoteheadId, PixelBox, PositionMarker, SurfacePoint};

/// Width of a thin cursor line (px)
const THIN_CURSOR_WIDTH_PX: f64 = 3.0;

/// Deterministic engraving geometry
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeadlessLayout {
    pub left_margin: f64,
    pub top_margin: f64,
    pub px_per_beat: f64,
    pub beats_per_measure: f64,
    pub beats_per_line: f64,
    pub line_height: f64,
    /// Distance between the tops of consecutive systems
    pub line_spacing: f64,
}

impl Default for HeadlessLayout {
    fn default() -> Self {
        Self {
            left_margin: 40.0,
            top_margin: 20.0,
            px_per_beat: 50.0,
            beats_per_measure: 4.0,
            beats_per_line: 16.0,
            line_height: 120.0,
            line_spacing: 160.0,
        }
    }
}

impl HeadlessLayout {
    pub fn marker_for_beat(&self, beat: f64) -> PositionMarker {
        PositionMarker((beat * 1000.0).round() as u64)
    }

    pub fn beat_for_marker(&self, marker: PositionMarker) -> f64 {
        marker.0 as f64 / 1000.0
    }

    pub fn line_for_beat(&self, beat: f64) -> usize {
        (beat / self.beats_per_line).floor() as usize
    }

    pub fn x_for_beat(&self, beat: f64) -> f64 {
        self.left_margin + (beat % self.beats_per_line) * self.px_per_beat
    }

    pub fn y_for_line(&self, line: usize) -> f64 {
        self.top_margin + line as f64 * self.line_spacing
    }

    pub fn line_right(&self) -> f64 {
        self.left_margin + self.beats_per_line * self.px_per_beat
    }

    pub fn line_at_y(&self, y: f64) -> Option<usize> {
        if y < self.top_margin {
            return None;
        }
        let line = ((y - self.top_margin) / self.line_spacing).floor() as usize;
        let offset = y - self.y_for_line(line);
        (offset < self.line_height).then_some(line)
    }
}

/// A score given as explicit entries
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScriptedScore {
    #[serde(default)]
    layout: HeadlessLayout,
    entries: Vec<ScoreEntry>,
}

impl ScriptedScore {
    pub fn from_entries(entries: Vec<ScoreEntry>) -> Self {
        Self {
            layout: HeadlessLayout::default(),
            entries,
        }
    }

    /// `positions` single-note positions of `beats_each` beats at `bpm`
    pub fn uniform(positions: usize, beats_each: f64, bpm: f64) -> Self {
        let layout = HeadlessLayout::default();
        let entries = (0..positions)
            .map(|i| {
                let beat = i as f64 * beats_each;
                let measure_index = (beat / layout.beats_per_measure).floor() as usize;
                ScoreEntry {
                    beat,
                    duration_beats: beats_each,
                    bpm,
                    measure_index,
                    measure_number: measure_index as u32 + 1,
                    measure_line: layout.line_for_beat(beat),
                    noteheads: vec![NoteheadId(i as u64)],
                }
            })
            .collect();
        Self { layout, entries }
    }

    pub fn with_layout(mut self, layout: HeadlessLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn layout(&self) -> HeadlessLayout {
        self.layout
    }
}

impl Score for ScriptedScore {
    fn entries(&self) -> &[ScoreEntry] {
        &self.entries
    }

    fn project(&self, beat: f64) -> PositionMarker {
        self.layout.marker_for_beat(beat)
    }
}

/// Observable operations performed on a [`HeadlessSurface`]
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceOp {
    Create(CursorId),
    Remove(CursorId),
    MoveTo(CursorId, PositionMarker),
    SetLeft(CursorId, f64),
    Show(CursorId),
    Hide(CursorId),
    Style(CursorId, String, Option<String>),
    Color(NoteheadId, Option<String>),
}

/// State of one cursor element
#[derive(Debug, Clone, PartialEq)]
pub struct HeadlessCursor {
    pub options: CursorOptions,
    pub marker: Option<PositionMarker>,
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
    pub hidden: bool,
    pub styles: BTreeMap<String, String>,
}

#[derive(Debug, Default)]
struct SurfaceState {
    next_id: u32,
    cursors: BTreeMap<CursorId, HeadlessCursor>,
    notehead_colors: BTreeMap<NoteheadId, String>,
    ops: Vec<SurfaceOp>,
}

/// In-memory rendering surface
#[derive(Debug, Default)]
pub struct HeadlessSurface {
    layout: HeadlessLayout,
    state: RefCell<SurfaceState>,
    fail_lookups: Cell<bool>,
}

impl HeadlessSurface {
    pub fn new(layout: HeadlessLayout) -> Self {
        Self {
            layout,
            state: RefCell::new(SurfaceState::default()),
            fail_lookups: Cell::new(false),
        }
    }

    pub fn layout(&self) -> HeadlessLayout {
        self.layout
    }

    /// Make every marker lookup fail (simulates a score being re-rendered)
    pub fn fail_marker_lookups(&self, fail: bool) {
        self.fail_lookups.set(fail);
    }

    pub fn ops(&self) -> Vec<SurfaceOp> {
        self.state.borrow().ops.clone()
    }

    pub fn op_count(&self) -> usize {
        self.state.borrow().ops.len()
    }

    pub fn cursor(&self, id: CursorId) -> Option<HeadlessCursor> {
        self.state.borrow().cursors.get(&id).cloned()
    }

    pub fn cursor_count(&self) -> usize {
        self.state.borrow().cursors.len()
    }

    pub fn notehead_color(&self, id: NoteheadId) -> Option<String> {
        self.state.borrow().notehead_colors.get(&id).cloned()
    }

    /// Noteheads currently showing a non-engraved color
    pub fn colored_noteheads(&self) -> Vec<NoteheadId> {
        self.state.borrow().notehead_colors.keys().copied().collect()
    }

    fn with_cursor<T>(
        &self,
        id: CursorId,
        op: SurfaceOp,
        f: impl FnOnce(&mut HeadlessCursor) -> T,
    ) -> Result<T, SurfaceError> {
        let mut state = self.state.borrow_mut();
        let cursor = state
            .cursors
            .get_mut(&id)
            .ok_or(SurfaceError::CursorNotFound(id.0))?;
        let value = f(cursor);
        state.ops.push(op);
        Ok(value)
    }
}

impl RenderSurface for HeadlessSurface {
    fn create_cursor(&self, options: &CursorOptions) -> CursorId {
        let mut state = self.state.borrow_mut();
        let id = CursorId(state.next_id);
        state.next_id += 1;
        let width = match options.kind {
            CursorKind::Standard => self.layout.px_per_beat,
            CursorKind::ThinLeft => THIN_CURSOR_WIDTH_PX,
        };
        state.cursors.insert(
            id,
            HeadlessCursor {
                options: options.clone(),
                marker: None,
                left: 0.0,
                top: 0.0,
                width,
                height: self.layout.line_height,
                hidden: true,
                styles: BTreeMap::new(),
            },
        );
        state.ops.push(SurfaceOp::Create(id));
        id
    }

    fn remove_cursor(&self, id: CursorId) {
        let mut state = self.state.borrow_mut();
        if state.cursors.remove(&id).is_some() {
            state.ops.push(SurfaceOp::Remove(id));
        }
    }

    fn move_cursor_to(&self, id: CursorId, marker: PositionMarker) -> Result<(), SurfaceError> {
        let geometry = self.marker_geometry(marker)?;
        self.with_cursor(id, SurfaceOp::MoveTo(id, marker), |cursor| {
            cursor.marker = Some(marker);
            cursor.left = geometry.x;
            cursor.top = geometry.y;
        })
    }

    fn set_cursor_left(&self, id: CursorId, x: f64) -> Result<(), SurfaceError> {
        self.with_cursor(id, SurfaceOp::SetLeft(id, x), |cursor| cursor.left = x)
    }

    fn show_cursor(&self, id: CursorId) {
        let _ = self.with_cursor(id, SurfaceOp::Show(id), |cursor| cursor.hidden = false);
    }

    fn hide_cursor(&self, id: CursorId) {
        let _ = self.with_cursor(id, SurfaceOp::Hide(id), |cursor| cursor.hidden = true);
    }

    fn set_cursor_style(&self, id: CursorId, property: &str, value: &str) {
        let op = SurfaceOp::Style(id, property.to_string(), Some(value.to_string()));
        let _ = self.with_cursor(id, op, |cursor| {
            cursor.styles.insert(property.to_string(), value.to_string());
        });
    }

    fn clear_cursor_style(&self, id: CursorId, property: &str) {
        let op = SurfaceOp::Style(id, property.to_string(), None);
        let _ = self.with_cursor(id, op, |cursor| {
            cursor.styles.remove(property);
        });
    }

    fn cursor_bounds(&self, id: CursorId) -> Option<PixelBox> {
        let state = self.state.borrow();
        let cursor = state.cursors.get(&id)?;
        if cursor.hidden || cursor.marker.is_none() {
            return None;
        }
        Some(PixelBox::from_origin(cursor.left, cursor.top, cursor.width, cursor.height))
    }

    fn marker_geometry(&self, marker: PositionMarker) -> Result<MarkerGeometry, SurfaceError> {
        if self.fail_lookups.get() {
            return Err(SurfaceError::MarkerNotRendered(marker.0));
        }
        let beat = self.layout.beat_for_marker(marker);
        Ok(MarkerGeometry {
            x: self.layout.x_for_beat(beat),
            y: self.layout.y_for_line(self.layout.line_for_beat(beat)),
            height: self.layout.line_height,
            line_right: self.layout.line_right(),
        })
    }

    fn line_at_y(&self, y: f64) -> Option<usize> {
        self.layout.line_at_y(y)
    }

    fn set_notehead_color(&self, id: NoteheadId, color: Option<&str>) {
        let mut state = self.state.borrow_mut();
        match color {
            Some(color) => {
                state.notehead_colors.insert(id, color.to_string());
            }
            None => {
                state.notehead_colors.remove(&id);
            }
        }
        state.ops.push(SurfaceOp::Color(id, color.map(str::to_string)));
    }

    fn client_to_surface(&self, client_x: f64, client_y: f64) -> SurfacePoint {
        SurfacePoint::new(client_x, client_y)
    }
}

/// In-memory scroll container
#[derive(Debug)]
pub struct HeadlessContainer {
    width: f64,
    height: f64,
    scroll_top: Cell<f64>,
    scroll_calls: Cell<usize>,
}

impl HeadlessContainer {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            scroll_top: Cell::new(0.0),
            scroll_calls: Cell::new(0),
        }
    }

    pub fn scroll_top(&self) -> f64 {
        self.scroll_top.get()
    }

    /// Number of programmatic scrolls issued through [`ScrollContainer::scroll_to`]
    pub fn scroll_calls(&self) -> usize {
        self.scroll_calls.get()
    }

    /// Scroll as the user would, bypassing the engine
    pub fn user_scroll(&self, top: f64) {
        self.scroll_top.set(top.max(0.0));
    }
}

impl ScrollContainer for HeadlessContainer {
    fn viewport(&self) -> PixelBox {
        let top = self.scroll_top.get();
        PixelBox::new(0.0, top, self.width, top + self.height)
    }

    fn scroll_to(&self, top: f64) {
        self.scroll_top.set(top.max(0.0));
        self.scroll_calls.set(self.scroll_calls.get() + 1);
    }
}

/// Media clock advanced manually
#[derive(Debug, Clone, Default)]
pub struct SimulatedClock {
    time_ms: f64,
    playing: bool,
    resume_after_suspend: Option<bool>,
    seeks: Vec<f64>,
}

impl SimulatedClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move time forward if playing
    pub fn advance(&mut self, delta_ms: f64) {
        if self.playing {
            self.time_ms += delta_ms;
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn is_suspended(&self) -> bool {
        self.resume_after_suspend.is_some()
    }

    pub fn seeks(&self) -> &[f64] {
        &self.seeks
    }
}

impl Clock for SimulatedClock {
    fn current_time_ms(&self) -> f64 {
        self.time_ms
    }

    fn seek(&mut self, time_ms: f64) {
        self.time_ms = time_ms.max(0.0);
        self.seeks.push(time_ms);
    }

    fn suspend(&mut self) {
        if self.resume_after_suspend.is_none() {
            self.resume_after_suspend = Some(self.playing);
            self.playing = false;
        }
    }

    fn unsuspend(&mut self) {
        if let Some(resume) = self.resume_after_suspend.take() {
            self.playing = resume;
        }
    }

    fn play(&mut self) {
        self.playing = true;
    }

    fn pause(&mut self) {
        self.playing = false;
    }
}
