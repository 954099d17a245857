//! Scroller - keeps the cursor visible in the scroll container
//!
//! Three behaviors:
//! - `Auto`: follow the cursor, scrolling whenever it leaves the viewport
//! - `Manual`: the user drives scrolling; dragging near an edge steps it
//! - `Disabled`: never scroll
//!
//! Scrolls the scroller issues itself are remembered, so the container's
//! scroll notification can tell them apart from user scrolling.

use std::fmt;
use std::rc::Rc;

use crate::config::ScrollConfig;
use crate::events::{EventBus, SyncEvent};
use crate::surface::ScrollContainer;
use crate::types::PixelBox;

/// Tolerance when matching a scroll notification to an issued scroll (px)
const SCROLL_MATCH_TOLERANCE_PX: f64 = 1.0;

/// Issued scrolls kept for matching; older ones never get a notification
const MAX_PENDING_SCROLLS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScrollBehavior {
    #[default]
    Disabled,
    Auto,
    Manual,
}

impl fmt::Display for ScrollBehavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScrollBehavior::Disabled => write!(f, "disabled"),
            ScrollBehavior::Auto => write!(f, "auto"),
            ScrollBehavior::Manual => write!(f, "manual"),
        }
    }
}

pub struct Scroller {
    container: Rc<dyn ScrollContainer>,
    bus: Rc<EventBus>,
    config: ScrollConfig,
    behavior: ScrollBehavior,
    /// Scroll positions issued but not yet reported back by the container
    expected: Vec<f64>,
}

impl Scroller {
    pub fn new(container: Rc<dyn ScrollContainer>, bus: Rc<EventBus>, config: ScrollConfig) -> Self {
        Self {
            container,
            bus,
            config,
            behavior: ScrollBehavior::Disabled,
            expected: Vec::new(),
        }
    }

    pub fn behavior(&self) -> ScrollBehavior {
        self.behavior
    }

    pub fn start_auto_scrolling(&mut self) {
        self.set_behavior(ScrollBehavior::Auto);
    }

    pub fn start_manual_scrolling(&mut self) {
        self.set_behavior(ScrollBehavior::Manual);
    }

    pub fn disable(&mut self) {
        self.set_behavior(ScrollBehavior::Disabled);
    }

    /// Auto when preferred, otherwise disabled
    pub fn start_preferential_scrolling(&mut self, prefer_auto: bool) {
        if prefer_auto {
            self.start_auto_scrolling();
        } else {
            self.disable();
        }
    }

    /// Bring a cursor box into view (auto mode only)
    ///
    /// Returns whether a scroll was issued.
    pub fn scroll_to_cursor(&mut self, cursor_box: PixelBox) -> bool {
        if self.behavior != ScrollBehavior::Auto {
            return false;
        }
        let viewport = self.container.viewport();
        if viewport.encloses(&cursor_box) {
            return false;
        }
        let top = cursor_box.y0.max(0.0);
        if (top - viewport.y0).abs() < SCROLL_MATCH_TOLERANCE_PX {
            // Taller than the viewport and already aligned
            return false;
        }
        self.scroll_to(top);
        true
    }

    /// Step the container while a drag hovers near its top or bottom edge
    pub fn update_scroll_intent(&mut self, rel_y: f64) {
        if self.behavior != ScrollBehavior::Manual {
            return;
        }
        let edge = self.config.edge_fraction;
        let step = if rel_y < edge {
            -self.config.edge_step_px
        } else if rel_y > 1.0 - edge {
            self.config.edge_step_px
        } else {
            return;
        };
        let current = self.container.viewport().y0;
        let top = (current + step).max(0.0);
        if top != current {
            self.scroll_to(top);
        }
    }

    /// Container scroll notification from the host
    ///
    /// Returns `true` (and emits `externalscrolldetected`) when the scroll
    /// was not issued by this scroller.
    pub fn on_container_scrolled(&mut self, scroll_top: f64) -> bool {
        let issued = self
            .expected
            .iter()
            .position(|top| (top - scroll_top).abs() < SCROLL_MATCH_TOLERANCE_PX);
        if let Some(index) = issued {
            // Older issued scrolls were superseded
            self.expected.drain(..=index);
            return false;
        }
        log::debug!("Scroller: external scroll to {:.1}", scroll_top);
        self.bus.dispatch(SyncEvent::ExternalScrollDetected { scroll_top });
        true
    }

    fn scroll_to(&mut self, top: f64) {
        let before = self.container.viewport().y0;
        self.container.scroll_to(top);
        // Containers clamp at their scroll range, so remember where it landed
        let landed = self.container.viewport().y0;
        if landed == before {
            return;
        }
        if self.expected.len() == MAX_PENDING_SCROLLS {
            self.expected.remove(0);
        }
        self.expected.push(landed);
    }

    fn set_behavior(&mut self, behavior: ScrollBehavior) {
        if self.behavior == behavior {
            return;
        }
        log::info!("Scroller: {} -> {}", self.behavior, behavior);
        self.behavior = behavior;
        self.bus.dispatch(SyncEvent::ScrollBehaviorChanged(behavior));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    use crate::events::EventKind;
    use crate::headless::HeadlessContainer;

    fn scroller() -> (Rc<HeadlessContainer>, Rc<EventBus>, Scroller) {
        let container = Rc::new(HeadlessContainer::new(800.0, 400.0));
        let bus = Rc::new(EventBus::new());
        let s = Scroller::new(container.clone(), bus.clone(), ScrollConfig::default());
        (container, bus, s)
    }

    fn record(bus: &EventBus, kind: EventKind) -> Rc<RefCell<Vec<SyncEvent>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        bus.subscribe(kind, move |e| sink.borrow_mut().push(e.clone()));
        seen
    }

    #[test]
    fn test_behavior_changes_emit_once() {
        let (_container, bus, mut s) = scroller();
        let events = record(&bus, EventKind::ScrollBehaviorChanged);

        s.start_auto_scrolling();
        s.start_auto_scrolling();
        s.start_manual_scrolling();
        s.start_preferential_scrolling(false);

        assert_eq!(
            *events.borrow(),
            vec![
                SyncEvent::ScrollBehaviorChanged(ScrollBehavior::Auto),
                SyncEvent::ScrollBehaviorChanged(ScrollBehavior::Manual),
                SyncEvent::ScrollBehaviorChanged(ScrollBehavior::Disabled),
            ]
        );
    }

    #[test]
    fn test_scroll_to_cursor_only_in_auto() {
        let (container, _bus, mut s) = scroller();
        let below = PixelBox::new(100.0, 600.0, 110.0, 700.0);

        assert!(!s.scroll_to_cursor(below));
        s.start_auto_scrolling();
        assert!(s.scroll_to_cursor(below));
        assert_eq!(container.scroll_top(), 600.0);

        // Visible now
        assert!(!s.scroll_to_cursor(below));
        assert_eq!(container.scroll_calls(), 1);
    }

    #[test]
    fn test_own_scroll_is_not_external() {
        let (container, bus, mut s) = scroller();
        let events = record(&bus, EventKind::ExternalScrollDetected);
        s.start_auto_scrolling();
        s.scroll_to_cursor(PixelBox::new(0.0, 500.0, 10.0, 600.0));

        assert!(!s.on_container_scrolled(container.scroll_top()));
        container.user_scroll(20.0);
        assert!(s.on_container_scrolled(20.0));
        assert_eq!(
            *events.borrow(),
            vec![SyncEvent::ExternalScrollDetected { scroll_top: 20.0 }]
        );
    }

    /// Container that cannot scroll past `max_top`, like a real scroll element
    struct ClampedContainer {
        inner: HeadlessContainer,
        max_top: f64,
    }

    impl ScrollContainer for ClampedContainer {
        fn viewport(&self) -> PixelBox {
            self.inner.viewport()
        }

        fn scroll_to(&self, top: f64) {
            self.inner.scroll_to(top.min(self.max_top));
        }
    }

    #[test]
    fn test_clamped_scroll_is_not_external() {
        let container = Rc::new(ClampedContainer {
            inner: HeadlessContainer::new(800.0, 100.0),
            max_top: 300.0,
        });
        let bus = Rc::new(EventBus::new());
        let events = record(&bus, EventKind::ExternalScrollDetected);
        let mut s = Scroller::new(container.clone(), bus.clone(), ScrollConfig::default());
        s.start_auto_scrolling();

        assert!(s.scroll_to_cursor(PixelBox::new(0.0, 500.0, 10.0, 560.0)));
        assert_eq!(container.inner.scroll_top(), 300.0);
        assert!(!s.on_container_scrolled(300.0));
        assert!(events.borrow().is_empty());
        assert!(s.expected.is_empty());

        // Already at the limit: nothing moves, nothing is awaited
        s.scroll_to_cursor(PixelBox::new(0.0, 500.0, 10.0, 560.0));
        assert!(s.expected.is_empty());
    }

    #[test]
    fn test_unreported_scrolls_are_capped() {
        let (_container, _bus, mut s) = scroller();
        s.start_auto_scrolling();
        for i in 0..20 {
            let y = 1000.0 * (i + 1) as f64;
            s.scroll_to_cursor(PixelBox::new(0.0, y, 10.0, y + 10.0));
        }
        assert_eq!(s.expected.len(), MAX_PENDING_SCROLLS);
        assert!(!s.on_container_scrolled(20_000.0));
        assert!(s.expected.is_empty());
    }

    #[test]
    fn test_scroll_intent_near_edges() {
        let (container, _bus, mut s) = scroller();
        container.user_scroll(100.0);

        s.update_scroll_intent(0.99);
        assert_eq!(container.scroll_top(), 100.0);

        s.start_manual_scrolling();
        s.update_scroll_intent(0.5);
        assert_eq!(container.scroll_top(), 100.0);
        s.update_scroll_intent(0.99);
        assert_eq!(container.scroll_top(), 124.0);
        s.update_scroll_intent(0.01);
        s.update_scroll_intent(0.01);
        assert_eq!(container.scroll_top(), 76.0);
    }
}
