//! PointerProxy - raw input to [`PointerEvent`]s
//!
//! Converts device events into machine events: client coordinates become
//! surface coordinates, the target is resolved (main cursor within a hit
//! padding, otherwise the notation position under the pointer), and moves are
//! throttled. The throttle fires on the leading edge; the last suppressed move
//! is delivered before the next up, or by [`PointerProxy::flush`].

use std::rc::Rc;

use crate::config::PointerConfig;
use crate::surface::{RenderSurface, ScrollContainer};
use crate::timeline::Locator;
use crate::types::{CursorId, SurfacePoint};

use super::machine::{PointerEvent, PointerPosition, PointerTarget};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawPointerKind {
    Down,
    Move,
    Up,
}

/// A device pointer event as delivered by the host
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawPointerEvent {
    pub kind: RawPointerKind,
    pub client_x: f64,
    pub client_y: f64,
    /// Host timestamp (ms), used for throttling
    pub timestamp_ms: f64,
}

impl RawPointerEvent {
    pub fn new(kind: RawPointerKind, client_x: f64, client_y: f64, timestamp_ms: f64) -> Self {
        Self {
            kind,
            client_x,
            client_y,
            timestamp_ms,
        }
    }
}

pub struct PointerProxy {
    surface: Rc<dyn RenderSurface>,
    container: Rc<dyn ScrollContainer>,
    locator: Locator,
    config: PointerConfig,
    installed: bool,
    last_move_ms: Option<f64>,
    pending_move: Option<RawPointerEvent>,
}

impl PointerProxy {
    pub fn new(
        surface: Rc<dyn RenderSurface>,
        container: Rc<dyn ScrollContainer>,
        locator: Locator,
        config: PointerConfig,
    ) -> Self {
        Self {
            surface,
            container,
            locator,
            config,
            installed: false,
            last_move_ms: None,
            pending_move: None,
        }
    }

    /// Start forwarding raw events
    pub fn install(&mut self) {
        self.installed = true;
    }

    /// Stop forwarding raw events and drop any pending move
    pub fn uninstall(&mut self) {
        self.installed = false;
        self.last_move_ms = None;
        self.pending_move = None;
    }

    pub fn is_installed(&self) -> bool {
        self.installed
    }

    /// Translate one raw event
    ///
    /// `cursor` is the main cursor element when it is visible.
    pub fn translate(&mut self, raw: RawPointerEvent, cursor: Option<CursorId>) -> Vec<PointerEvent> {
        if !self.installed {
            return Vec::new();
        }

        match raw.kind {
            RawPointerKind::Down => vec![self.down(raw, cursor)],
            RawPointerKind::Move => {
                let throttled = self
                    .last_move_ms
                    .is_some_and(|last| raw.timestamp_ms - last < self.config.move_throttle_ms);
                if throttled {
                    self.pending_move = Some(raw);
                    return Vec::new();
                }
                self.last_move_ms = Some(raw.timestamp_ms);
                self.pending_move = None;
                vec![self.move_event(raw, cursor)]
            }
            RawPointerKind::Up => {
                let mut events = Vec::with_capacity(2);
                if let Some(pending) = self.pending_move.take() {
                    events.push(self.move_event(pending, cursor));
                }
                self.last_move_ms = None;
                let (position, point) = self.position(raw);
                events.push(PointerEvent::Up {
                    position,
                    dst_time_ms: self.locator.locate_by_position(point),
                });
                events
            }
        }
    }

    /// Deliver the trailing move once the throttle window has passed
    pub fn flush(&mut self, now_ms: f64, cursor: Option<CursorId>) -> Option<PointerEvent> {
        let pending = self.pending_move?;
        let last = self.last_move_ms.unwrap_or(f64::NEG_INFINITY);
        if now_ms - last < self.config.move_throttle_ms {
            return None;
        }
        self.pending_move = None;
        self.last_move_ms = Some(now_ms);
        Some(self.move_event(pending, cursor))
    }

    fn down(&self, raw: RawPointerEvent, cursor: Option<CursorId>) -> PointerEvent {
        let (position, point) = self.position(raw);
        PointerEvent::Down {
            target: self.target_at(point, cursor),
            position,
        }
    }

    fn move_event(&self, raw: RawPointerEvent, cursor: Option<CursorId>) -> PointerEvent {
        let (position, point) = self.position(raw);
        PointerEvent::Move {
            target: self.target_at(point, cursor),
            position,
            dst_time_ms: self.locator.locate_by_position(point),
        }
    }

    fn position(&self, raw: RawPointerEvent) -> (PointerPosition, SurfacePoint) {
        let point = self.surface.client_to_surface(raw.client_x, raw.client_y);
        let viewport = self.container.viewport();
        let fraction = |offset: f64, size: f64| if size > 0.0 { offset / size } else { 0.0 };
        let position = PointerPosition {
            x: point.x,
            y: point.y,
            rel_x: fraction(point.x - viewport.x0, viewport.width()),
            rel_y: fraction(point.y - viewport.y0, viewport.height()),
        };
        (position, point)
    }

    fn target_at(&self, point: SurfacePoint, cursor: Option<CursorId>) -> PointerTarget {
        let hit_cursor = cursor
            .and_then(|id| self.surface.cursor_bounds(id))
            .map(|bounds| bounds.padded(self.config.hit_padding_px))
            .is_some_and(|bounds| bounds.contains(point.x, point.y));
        if hit_cursor {
            return PointerTarget::Cursor;
        }
        match self.locator.locate_by_position(point) {
            Some(time_ms) => PointerTarget::CursorSnapshot { time_ms },
            None => PointerTarget::None,
        }
    }
}
