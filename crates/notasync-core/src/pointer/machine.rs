//! PointerMachine - hover and drag state for the main cursor
//!
//! ```text
//!            move(t != None)               down(t != None)
//!   Idle ─────────────────────▶ Hovering ─────────────────▶ Dragging
//!    ▲                              │ move: enter/exit           │ move: dragupdated
//!    └──────────────────────────────┴────────── up ◀─────────────┘
//! ```
//!
//! The machine only announces transitions on the bus. Reacting to them
//! (suspending the clock, seeking, scrolling) is left to subscribers.

use std::mem;
use std::rc::Rc;

use crate::events::{EventBus, SyncEvent};

/// What the pointer is over
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum PointerTarget {
    #[default]
    None,
    /// The main cursor (within its hit padding)
    Cursor,
    /// A position on the notation, resolved to its time
    CursorSnapshot { time_ms: f64 },
}

impl PointerTarget {
    pub fn is_none(&self) -> bool {
        matches!(self, PointerTarget::None)
    }

    /// Same kind of target, ignoring the resolved time
    fn same_kind(&self, other: &PointerTarget) -> bool {
        mem::discriminant(self) == mem::discriminant(other)
    }

    fn entered_event(&self) -> SyncEvent {
        match *self {
            PointerTarget::None => SyncEvent::NoTargetEntered,
            PointerTarget::Cursor => SyncEvent::CursorEntered,
            PointerTarget::CursorSnapshot { time_ms } => SyncEvent::CursorSnapshotEntered { time_ms },
        }
    }

    fn exited_event(&self) -> SyncEvent {
        match *self {
            PointerTarget::None => SyncEvent::NoTargetExited,
            PointerTarget::Cursor => SyncEvent::CursorExited,
            PointerTarget::CursorSnapshot { time_ms } => SyncEvent::CursorSnapshotExited { time_ms },
        }
    }
}

/// Pointer position in surface coordinates, plus its place in the viewport
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PointerPosition {
    pub x: f64,
    pub y: f64,
    /// Horizontal fraction of the visible container (0 = left edge)
    pub rel_x: f64,
    /// Vertical fraction of the visible container (0 = top edge)
    pub rel_y: f64,
}

/// Where a drag currently points
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DragDestination {
    /// `None` when the position does not map to a time
    pub time_ms: Option<f64>,
    pub position: PointerPosition,
}

impl DragDestination {
    /// Whether the destination resolved to a time
    pub fn is_temporal(&self) -> bool {
        self.time_ms.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    Down {
        target: PointerTarget,
        position: PointerPosition,
    },
    Move {
        target: PointerTarget,
        position: PointerPosition,
        dst_time_ms: Option<f64>,
    },
    Up {
        position: PointerPosition,
        dst_time_ms: Option<f64>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum PointerState {
    #[default]
    Idle,
    Hovering(PointerTarget),
    Dragging {
        target: PointerTarget,
        origin: PointerPosition,
    },
}

pub struct PointerMachine {
    bus: Rc<EventBus>,
    state: PointerState,
}

impl PointerMachine {
    pub fn new(bus: Rc<EventBus>) -> Self {
        Self {
            bus,
            state: PointerState::Idle,
        }
    }

    pub fn state(&self) -> PointerState {
        self.state
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, PointerState::Dragging { .. })
    }

    pub fn send(&mut self, event: PointerEvent) {
        match (self.state, event) {
            (PointerState::Dragging { .. }, PointerEvent::Down { .. }) => {
                log::trace!("PointerMachine: down while dragging, ignored");
            }
            (_, PointerEvent::Down { target, position }) => {
                self.bus.dispatch(SyncEvent::PointerDown { target, position });
                if !target.is_none() {
                    self.state = PointerState::Dragging {
                        target,
                        origin: position,
                    };
                    self.bus.dispatch(SyncEvent::CursorDragStarted { src: target });
                }
            }
            (
                PointerState::Dragging { target, .. },
                PointerEvent::Move {
                    position,
                    dst_time_ms,
                    ..
                },
            ) => {
                let dst = DragDestination {
                    time_ms: dst_time_ms,
                    position,
                };
                self.bus.dispatch(SyncEvent::CursorDragUpdated { src: target, dst });
            }
            (PointerState::Idle, PointerEvent::Move { target, .. }) => {
                if !target.is_none() {
                    self.state = PointerState::Hovering(target);
                    self.bus.dispatch(target.entered_event());
                }
            }
            (PointerState::Hovering(current), PointerEvent::Move { target, .. }) => {
                self.state = PointerState::Hovering(target);
                if !current.same_kind(&target) {
                    self.bus.dispatch(current.exited_event());
                    self.bus.dispatch(target.entered_event());
                }
            }
            (
                PointerState::Dragging { target, .. },
                PointerEvent::Up {
                    position,
                    dst_time_ms,
                },
            ) => {
                self.state = PointerState::Idle;
                let dst = DragDestination {
                    time_ms: dst_time_ms,
                    position,
                };
                self.bus.dispatch(SyncEvent::CursorDragEnded { src: target, dst });
            }
            (_, PointerEvent::Up { .. }) => {
                log::trace!("PointerMachine: up while not dragging, ignored");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    use crate::events::EventKind;

    fn machine() -> (PointerMachine, Rc<RefCell<Vec<SyncEvent>>>) {
        let bus = Rc::new(EventBus::new());
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        bus.subscribe_all(move |e| sink.borrow_mut().push(e.clone()));
        (PointerMachine::new(bus), seen)
    }

    fn pos(y: f64) -> PointerPosition {
        PointerPosition {
            x: 10.0,
            y,
            rel_x: 0.1,
            rel_y: y / 100.0,
        }
    }

    fn kinds(events: &RefCell<Vec<SyncEvent>>) -> Vec<EventKind> {
        events.borrow().iter().map(SyncEvent::kind).collect()
    }

    fn count(events: &RefCell<Vec<SyncEvent>>, kind: EventKind) -> usize {
        events.borrow().iter().filter(|e| e.kind() == kind).count()
    }

    #[test]
    fn test_drag_sequence() {
        let (mut m, events) = machine();
        m.send(PointerEvent::Down {
            target: PointerTarget::Cursor,
            position: pos(10.0),
        });
        assert!(m.is_dragging());
        m.send(PointerEvent::Move {
            target: PointerTarget::None,
            position: pos(20.0),
            dst_time_ms: Some(1200.0),
        });
        m.send(PointerEvent::Move {
            target: PointerTarget::None,
            position: pos(30.0),
            dst_time_ms: Some(1400.0),
        });
        m.send(PointerEvent::Up {
            position: pos(30.0),
            dst_time_ms: Some(1400.0),
        });

        assert_eq!(count(&events, EventKind::CursorDragStarted), 1);
        assert_eq!(count(&events, EventKind::CursorDragUpdated), 2);
        assert_eq!(count(&events, EventKind::CursorDragEnded), 1);
        assert_eq!(m.state(), PointerState::Idle);
    }

    #[test]
    fn test_down_on_nothing_does_not_drag() {
        let (mut m, events) = machine();
        m.send(PointerEvent::Down {
            target: PointerTarget::None,
            position: pos(10.0),
        });
        assert_eq!(kinds(&events), vec![EventKind::PointerDown]);
        assert_eq!(m.state(), PointerState::Idle);
    }

    #[test]
    fn test_second_down_while_dragging_ignored() {
        let (mut m, events) = machine();
        let first = PointerEvent::Down {
            target: PointerTarget::Cursor,
            position: pos(10.0),
        };
        m.send(first);
        m.send(PointerEvent::Down {
            target: PointerTarget::CursorSnapshot { time_ms: 900.0 },
            position: pos(50.0),
        });

        assert_eq!(count(&events, EventKind::CursorDragStarted), 1);
        assert_eq!(
            m.state(),
            PointerState::Dragging {
                target: PointerTarget::Cursor,
                origin: pos(10.0)
            }
        );
    }

    #[test]
    fn test_late_up_and_move_when_idle() {
        let (mut m, events) = machine();
        m.send(PointerEvent::Up {
            position: pos(10.0),
            dst_time_ms: None,
        });
        m.send(PointerEvent::Move {
            target: PointerTarget::None,
            position: pos(10.0),
            dst_time_ms: None,
        });
        assert!(events.borrow().is_empty());
        assert_eq!(m.state(), PointerState::Idle);
    }

    #[test]
    fn test_hover_transitions() {
        let (mut m, events) = machine();
        let mv = |target| PointerEvent::Move {
            target,
            position: pos(10.0),
            dst_time_ms: None,
        };

        m.send(mv(PointerTarget::Cursor));
        m.send(mv(PointerTarget::Cursor));
        m.send(mv(PointerTarget::CursorSnapshot { time_ms: 100.0 }));
        m.send(mv(PointerTarget::CursorSnapshot { time_ms: 150.0 }));
        m.send(mv(PointerTarget::None));

        assert_eq!(
            kinds(&events),
            vec![
                EventKind::CursorEntered,
                EventKind::CursorExited,
                EventKind::CursorSnapshotEntered,
                EventKind::CursorSnapshotExited,
                EventKind::NoTargetEntered,
            ]
        );
        assert_eq!(m.state(), PointerState::Hovering(PointerTarget::None));
    }

    #[test]
    fn test_drag_from_hover() {
        let (mut m, events) = machine();
        m.send(PointerEvent::Move {
            target: PointerTarget::Cursor,
            position: pos(10.0),
            dst_time_ms: None,
        });
        m.send(PointerEvent::Down {
            target: PointerTarget::Cursor,
            position: pos(10.0),
        });
        m.send(PointerEvent::Up {
            position: pos(40.0),
            dst_time_ms: Some(3000.0),
        });

        let ended = events
            .borrow()
            .iter()
            .find_map(|e| match e {
                SyncEvent::CursorDragEnded { src, dst } => Some((*src, *dst)),
                _ => None,
            })
            .unwrap();
        assert_eq!(ended.0, PointerTarget::Cursor);
        assert_eq!(ended.1.time_ms, Some(3000.0));
        assert_eq!(m.state(), PointerState::Idle);
    }
}
