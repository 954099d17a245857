//! EventBus - typed, synchronous publish/subscribe between engine components
//!
//! Every component that reports something (cursor, loop, pointer machine,
//! scroller, session) dispatches a [`SyncEvent`] through one shared bus.
//! Handlers run synchronously, in subscription order.
//!
//! Dispatch works on a snapshot of the subscription list, so handlers may
//! subscribe or unsubscribe while an event is in flight:
//! - new subscribers are first invoked for the next event
//! - unsubscribed handlers are skipped if they have not run yet
//! - a handler that triggers its own event again is not re-entered

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::looping::LoopRange;
use crate::pointer::{DragDestination, PointerPosition, PointerTarget};
use crate::scroller::ScrollBehavior;

/// Measure information reported by the main cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorInfo {
    pub current_measure_index: usize,
    pub current_measure_number: u32,
    pub num_measures: usize,
}

/// Everything the engine announces
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    CursorDragStarted { src: PointerTarget },
    CursorDragUpdated { src: PointerTarget, dst: DragDestination },
    CursorDragEnded { src: PointerTarget, dst: DragDestination },
    CursorEntered,
    CursorExited,
    CursorSnapshotEntered { time_ms: f64 },
    CursorSnapshotExited { time_ms: f64 },
    NoTargetEntered,
    NoTargetExited,
    PointerDown { target: PointerTarget, position: PointerPosition },
    CursorInfoChanged(CursorInfo),
    /// `None` when the cursor left the playable range
    MeasureLineChanged { line: Option<usize> },
    /// Committed pointer changed; `None` when the cursor was cleared
    CursorSnapshotChanged { index: Option<usize> },
    InteractableMoved,
    LoopActivated(LoopRange),
    LoopUpdated(LoopRange),
    LoopDeactivated(LoopRange),
    ExternalScrollDetected { scroll_top: f64 },
    ScrollBehaviorChanged(ScrollBehavior),
    ResizeStarted,
    ResizeEnded,
    LoadStarted,
    LoadEnded,
    NumMeasuresChanged { num_measures: usize },
}

/// Discriminant of [`SyncEvent`], used as the subscription key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    CursorDragStarted,
    CursorDragUpdated,
    CursorDragEnded,
    CursorEntered,
    CursorExited,
    CursorSnapshotEntered,
    CursorSnapshotExited,
    NoTargetEntered,
    NoTargetExited,
    PointerDown,
    CursorInfoChanged,
    MeasureLineChanged,
    CursorSnapshotChanged,
    InteractableMoved,
    LoopActivated,
    LoopUpdated,
    LoopDeactivated,
    ExternalScrollDetected,
    ScrollBehaviorChanged,
    ResizeStarted,
    ResizeEnded,
    LoadStarted,
    LoadEnded,
    NumMeasuresChanged,
}

impl EventKind {
    /// Public event name
    pub fn name(self) -> &'static str {
        match self {
            EventKind::CursorDragStarted => "cursordragstarted",
            EventKind::CursorDragUpdated => "cursordragupdated",
            EventKind::CursorDragEnded => "cursordragended",
            EventKind::CursorEntered => "cursorentered",
            EventKind::CursorExited => "cursorexited",
            EventKind::CursorSnapshotEntered => "cursorsnapshotentered",
            EventKind::CursorSnapshotExited => "cursorsnapshotexited",
            EventKind::NoTargetEntered => "notargetentered",
            EventKind::NoTargetExited => "notargetexited",
            EventKind::PointerDown => "pointerdown",
            EventKind::CursorInfoChanged => "cursorinfochanged",
            EventKind::MeasureLineChanged => "measurelinechanged",
            EventKind::CursorSnapshotChanged => "cursorsnapshotchanged",
            EventKind::InteractableMoved => "interactablemoved",
            EventKind::LoopActivated => "loopactivated",
            EventKind::LoopUpdated => "loopupdated",
            EventKind::LoopDeactivated => "loopdeactivated",
            EventKind::ExternalScrollDetected => "externalscrolldetected",
            EventKind::ScrollBehaviorChanged => "scrollbehaviorchanged",
            EventKind::ResizeStarted => "resizestarted",
            EventKind::ResizeEnded => "resizeended",
            EventKind::LoadStarted => "loadstarted",
            EventKind::LoadEnded => "loadended",
            EventKind::NumMeasuresChanged => "nummeasureschanged",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl SyncEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            SyncEvent::CursorDragStarted { .. } => EventKind::CursorDragStarted,
            SyncEvent::CursorDragUpdated { .. } => EventKind::CursorDragUpdated,
            SyncEvent::CursorDragEnded { .. } => EventKind::CursorDragEnded,
            SyncEvent::CursorEntered => EventKind::CursorEntered,
            SyncEvent::CursorExited => EventKind::CursorExited,
            SyncEvent::CursorSnapshotEntered { .. } => EventKind::CursorSnapshotEntered,
            SyncEvent::CursorSnapshotExited { .. } => EventKind::CursorSnapshotExited,
            SyncEvent::NoTargetEntered => EventKind::NoTargetEntered,
            SyncEvent::NoTargetExited => EventKind::NoTargetExited,
            SyncEvent::PointerDown { .. } => EventKind::PointerDown,
            SyncEvent::CursorInfoChanged(_) => EventKind::CursorInfoChanged,
            SyncEvent::MeasureLineChanged { .. } => EventKind::MeasureLineChanged,
            SyncEvent::CursorSnapshotChanged { .. } => EventKind::CursorSnapshotChanged,
            SyncEvent::InteractableMoved => EventKind::InteractableMoved,
            SyncEvent::LoopActivated(_) => EventKind::LoopActivated,
            SyncEvent::LoopUpdated(_) => EventKind::LoopUpdated,
            SyncEvent::LoopDeactivated(_) => EventKind::LoopDeactivated,
            SyncEvent::ExternalScrollDetected { .. } => EventKind::ExternalScrollDetected,
            SyncEvent::ScrollBehaviorChanged(_) => EventKind::ScrollBehaviorChanged,
            SyncEvent::ResizeStarted => EventKind::ResizeStarted,
            SyncEvent::ResizeEnded => EventKind::ResizeEnded,
            SyncEvent::LoadStarted => EventKind::LoadStarted,
            SyncEvent::LoadEnded => EventKind::LoadEnded,
            SyncEvent::NumMeasuresChanged { .. } => EventKind::NumMeasuresChanged,
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind().name()
    }
}

/// Token returned by [`EventBus::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

type Handler = Box<dyn Fn(&SyncEvent)>;

struct Subscription {
    id: SubscriptionId,
    /// `None` receives every event
    kind: Option<EventKind>,
    handler: Handler,
    alive: Cell<bool>,
    running: Cell<bool>,
}

impl Subscription {
    fn matches(&self, kind: EventKind) -> bool {
        self.alive.get() && self.kind.map_or(true, |k| k == kind)
    }
}

/// Clears the re-entrancy flag even if the handler panics
struct RunningGuard<'a>(&'a Cell<bool>);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

#[derive(Default)]
struct BusState {
    next_id: u64,
    subscriptions: Vec<Rc<Subscription>>,
}

/// Shared mediator for [`SyncEvent`]s
#[derive(Default)]
pub struct EventBus {
    state: RefCell<BusState>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriptions", &self.len())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for one event kind
    pub fn subscribe(&self, kind: EventKind, handler: impl Fn(&SyncEvent) + 'static) -> SubscriptionId {
        self.insert(Some(kind), Box::new(handler))
    }

    /// Register a handler for every event kind
    pub fn subscribe_all(&self, handler: impl Fn(&SyncEvent) + 'static) -> SubscriptionId {
        self.insert(None, Box::new(handler))
    }

    fn insert(&self, kind: Option<EventKind>, handler: Handler) -> SubscriptionId {
        let mut state = self.state.borrow_mut();
        let id = SubscriptionId(state.next_id);
        state.next_id += 1;
        state.subscriptions.push(Rc::new(Subscription {
            id,
            kind,
            handler,
            alive: Cell::new(true),
            running: Cell::new(false),
        }));
        id
    }

    /// Remove handlers; unknown ids are ignored
    pub fn unsubscribe(&self, ids: &[SubscriptionId]) {
        let mut state = self.state.borrow_mut();
        state.subscriptions.retain(|sub| {
            let remove = ids.contains(&sub.id);
            if remove {
                sub.alive.set(false);
            }
            !remove
        });
    }

    /// Number of live subscriptions
    pub fn len(&self) -> usize {
        self.state.borrow().subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invoke every matching handler synchronously
    pub fn dispatch(&self, event: SyncEvent) {
        let kind = event.kind();
        let snapshot: Vec<Rc<Subscription>> = self
            .state
            .borrow()
            .subscriptions
            .iter()
            .filter(|sub| sub.matches(kind))
            .cloned()
            .collect();

        log::trace!("EventBus: {} -> {} handler(s)", kind, snapshot.len());

        for sub in snapshot {
            if !sub.alive.get() {
                continue;
            }
            if sub.running.get() {
                log::warn!(
                    "EventBus: handler {:?} re-entered by its own {} dispatch, skipping",
                    sub.id,
                    kind
                );
                continue;
            }
            sub.running.set(true);
            let _guard = RunningGuard(&sub.running);
            (sub.handler)(&event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder(bus: &EventBus, kind: EventKind) -> Rc<RefCell<Vec<SyncEvent>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        bus.subscribe(kind, move |e| sink.borrow_mut().push(e.clone()));
        seen
    }

    #[test]
    fn test_dispatch_by_kind() {
        let bus = EventBus::new();
        let loads = recorder(&bus, EventKind::LoadStarted);
        let resizes = recorder(&bus, EventKind::ResizeStarted);

        bus.dispatch(SyncEvent::LoadStarted);
        bus.dispatch(SyncEvent::LoadStarted);
        bus.dispatch(SyncEvent::ResizeEnded);

        assert_eq!(loads.borrow().len(), 2);
        assert!(resizes.borrow().is_empty());
    }

    #[test]
    fn test_subscription_order() {
        let bus = EventBus::new();
        let order = Rc::new(RefCell::new(Vec::new()));
        for n in 0..3 {
            let order = Rc::clone(&order);
            bus.subscribe(EventKind::ResizeEnded, move |_| order.borrow_mut().push(n));
        }
        bus.dispatch(SyncEvent::ResizeEnded);
        assert_eq!(*order.borrow(), vec![0, 1, 2]);
    }

    #[test]
    fn test_unsubscribe() {
        let bus = EventBus::new();
        let count = Rc::new(Cell::new(0));
        let c = Rc::clone(&count);
        let id = bus.subscribe(EventKind::LoadEnded, move |_| c.set(c.get() + 1));

        bus.dispatch(SyncEvent::LoadEnded);
        bus.unsubscribe(&[id]);
        bus.dispatch(SyncEvent::LoadEnded);

        assert_eq!(count.get(), 1);
        assert!(bus.is_empty());
    }

    #[test]
    fn test_subscribe_during_dispatch_waits_for_next_event() {
        let bus = Rc::new(EventBus::new());
        let late_calls = Rc::new(Cell::new(0));

        let bus_ref = Rc::clone(&bus);
        let calls = Rc::clone(&late_calls);
        bus.subscribe(EventKind::LoadStarted, move |_| {
            let calls = Rc::clone(&calls);
            bus_ref.subscribe(EventKind::LoadStarted, move |_| calls.set(calls.get() + 1));
        });

        bus.dispatch(SyncEvent::LoadStarted);
        assert_eq!(late_calls.get(), 0);
        bus.dispatch(SyncEvent::LoadStarted);
        assert_eq!(late_calls.get(), 1);
    }

    #[test]
    fn test_unsubscribe_during_dispatch_skips_pending_handler() {
        let bus = Rc::new(EventBus::new());
        let second_calls = Rc::new(Cell::new(0));
        let victim = Rc::new(Cell::new(None));

        let bus_ref = Rc::clone(&bus);
        let victim_ref = Rc::clone(&victim);
        bus.subscribe(EventKind::LoadStarted, move |_| {
            if let Some(id) = victim_ref.get() {
                bus_ref.unsubscribe(&[id]);
            }
        });
        let calls = Rc::clone(&second_calls);
        let id = bus.subscribe(EventKind::LoadStarted, move |_| calls.set(calls.get() + 1));
        victim.set(Some(id));

        bus.dispatch(SyncEvent::LoadStarted);
        assert_eq!(second_calls.get(), 0);
        assert_eq!(bus.len(), 1);
    }

    #[test]
    fn test_reentrant_handler_is_skipped() {
        let bus = Rc::new(EventBus::new());
        let calls = Rc::new(Cell::new(0));

        let bus_ref = Rc::clone(&bus);
        let c = Rc::clone(&calls);
        bus.subscribe(EventKind::InteractableMoved, move |_| {
            c.set(c.get() + 1);
            bus_ref.dispatch(SyncEvent::InteractableMoved);
        });

        bus.dispatch(SyncEvent::InteractableMoved);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_subscribe_all_and_names() {
        let bus = EventBus::new();
        let names = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&names);
        bus.subscribe_all(move |e| sink.borrow_mut().push(e.name()));

        bus.dispatch(SyncEvent::LoadStarted);
        bus.dispatch(SyncEvent::NumMeasuresChanged { num_measures: 4 });
        bus.dispatch(SyncEvent::LoadEnded);

        assert_eq!(
            *names.borrow(),
            vec!["loadstarted", "nummeasureschanged", "loadended"]
        );
    }
}
