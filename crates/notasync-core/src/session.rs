//! SyncSession - one engine instance for one rendered score
//!
//! Owns everything a loaded score needs (timeline, main cursor, loop, pointer
//! handling, scroller) and ties it to the host's collaborators. There is no
//! global state: hosts create as many sessions as they display scores.
//!
//! Frame flow:
//!
//! ```text
//!  host clock ──▶ tick(t) ──▶ LerpCursor::update ──▶ Scroller::scroll_to_cursor
//!  host input ──▶ handle_pointer ──▶ PointerProxy ──▶ PointerMachine ──▶ bus
//!                                                                        │
//!             interaction effects (clock suspend/seek, loop, scroll) ◀───┘
//! ```
//!
//! Shared components live in `Rc<RefCell<_>>` so bus handlers can reach them.
//! Handlers use `try_borrow*` and skip (with a warning) instead of panicking
//! when a component is already in use further up the stack.

use std::cell::RefCell;
use std::rc::Rc;

use crate::config::EngineConfig;
use crate::cursor::LerpCursor;
use crate::error::{SyncError, SyncResult};
use crate::events::{EventBus, EventKind, SubscriptionId, SyncEvent};
use crate::looping::Loop;
use crate::pointer::{PointerMachine, PointerProxy, PointerState, PointerTarget, RawPointerEvent};
use crate::score::Score;
use crate::scroller::Scroller;
use crate::surface::{Clock, RenderSurface, ScrollContainer};
use crate::timeline::{Locator, TimelineIndex};
use crate::types::{CursorId, UpdateCause};

/// Per-score state, rebuilt by every [`SyncSession::init`]
struct LoadedScore {
    timeline: Rc<TimelineIndex>,
    cursor: Rc<RefCell<LerpCursor>>,
    looping: Rc<RefCell<Loop>>,
    proxy: PointerProxy,
    machine: PointerMachine,
    effect_ids: Vec<SubscriptionId>,
}

pub struct SyncSession {
    surface: Rc<dyn RenderSurface>,
    container: Rc<dyn ScrollContainer>,
    config: EngineConfig,
    bus: Rc<EventBus>,
    scroller: Rc<RefCell<Scroller>>,
    loaded: Option<LoadedScore>,
}

impl SyncSession {
    pub fn new(
        surface: Rc<dyn RenderSurface>,
        container: Rc<dyn ScrollContainer>,
        config: EngineConfig,
    ) -> Self {
        let bus = Rc::new(EventBus::new());
        let mut scroller = Scroller::new(Rc::clone(&container), Rc::clone(&bus), config.scroll);
        scroller.start_preferential_scrolling(config.scroll.autoscroll_preferred);

        Self {
            surface,
            container,
            config,
            bus,
            scroller: Rc::new(RefCell::new(scroller)),
            loaded: None,
        }
    }

    /// Load a rendered score, replacing any previous one
    pub fn init(&mut self, score: &dyn Score) -> SyncResult<()> {
        self.config.validate()?;
        if self.loaded.is_some() {
            self.dispose();
        }

        self.bus.dispatch(SyncEvent::LoadStarted);
        let timeline = match TimelineIndex::build(score, &self.config.sync) {
            Ok(timeline) => Rc::new(timeline),
            Err(e) => {
                log::warn!("SyncSession::init: failed to build timeline: {}", e);
                self.bus.dispatch(SyncEvent::LoadEnded);
                return Err(e);
            }
        };

        let locator = Locator::new(Rc::clone(&timeline), Rc::clone(&self.surface));
        let cursor = LerpCursor::create(
            Rc::clone(&self.surface),
            locator.fork(),
            Rc::clone(&self.bus),
            self.config.cursor.clone(),
        );
        let looping = Loop::create(
            Rc::clone(&self.surface),
            &locator,
            Rc::clone(&self.bus),
            &self.config.cursor,
        );
        let mut proxy = PointerProxy::new(
            Rc::clone(&self.surface),
            Rc::clone(&self.container),
            locator,
            self.config.pointer,
        );
        proxy.install();

        let num_measures = timeline.num_measures();
        log::info!(
            "SyncSession::init: {} pointers, {} measures, {:.1} ms",
            timeline.len(),
            num_measures,
            timeline.total_duration_ms()
        );

        self.loaded = Some(LoadedScore {
            timeline,
            cursor: Rc::new(RefCell::new(cursor)),
            looping: Rc::new(RefCell::new(looping)),
            proxy,
            machine: PointerMachine::new(Rc::clone(&self.bus)),
            effect_ids: Vec::new(),
        });

        self.bus.dispatch(SyncEvent::NumMeasuresChanged { num_measures });
        self.bus.dispatch(SyncEvent::LoadEnded);
        Ok(())
    }

    /// Tear down the loaded score; the session can be initialized again
    pub fn dispose(&mut self) {
        let Some(mut loaded) = self.loaded.take() else {
            return;
        };
        self.bus.unsubscribe(&loaded.effect_ids);
        loaded.proxy.uninstall();
        match loaded.cursor.try_borrow_mut() {
            Ok(mut cursor) => cursor.dispose(),
            Err(_) => log::warn!("SyncSession::dispose: cursor busy, elements left on surface"),
        }
        match loaded.looping.try_borrow_mut() {
            Ok(mut looping) => looping.dispose(),
            Err(_) => log::warn!("SyncSession::dispose: loop busy, elements left on surface"),
        }
        log::info!("SyncSession::dispose: score unloaded");
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.is_some()
    }

    /// Advance the main cursor to the clock time and follow it
    pub fn tick(&mut self, time_ms: f64) {
        let Some(loaded) = &self.loaded else {
            log::trace!("SyncSession::tick: no score loaded");
            return;
        };

        let cause = if loaded.machine.is_dragging() {
            UpdateCause::Interaction
        } else {
            UpdateCause::Unknown
        };

        let cursor_box = match loaded.cursor.try_borrow_mut() {
            Ok(mut cursor) => {
                cursor.update(time_ms, cause);
                cursor.get_box()
            }
            Err(_) => {
                log::warn!("SyncSession::tick: cursor busy, frame skipped");
                return;
            }
        };

        if let Some(cursor_box) = cursor_box {
            if let Ok(mut scroller) = self.scroller.try_borrow_mut() {
                scroller.scroll_to_cursor(cursor_box);
            }
        }
    }

    /// Feed one raw pointer event through the proxy into the machine
    pub fn handle_pointer(&mut self, raw: RawPointerEvent) {
        let Some(loaded) = &mut self.loaded else {
            return;
        };
        let cursor = visible_cursor(&loaded.cursor);
        for event in loaded.proxy.translate(raw, cursor) {
            loaded.machine.send(event);
        }
    }

    /// Deliver a throttled trailing move once its window has passed
    pub fn flush_pointer(&mut self, now_ms: f64) {
        let Some(loaded) = &mut self.loaded else {
            return;
        };
        let cursor = visible_cursor(&loaded.cursor);
        if let Some(event) = loaded.proxy.flush(now_ms, cursor) {
            loaded.machine.send(event);
        }
    }

    /// Container scroll notification; `true` when the user scrolled
    pub fn on_container_scrolled(&mut self, scroll_top: f64) -> bool {
        match self.scroller.try_borrow_mut() {
            Ok(mut scroller) => scroller.on_container_scrolled(scroll_top),
            Err(_) => false,
        }
    }

    /// Wire drag events to the clock, loop and scroller
    ///
    /// - drag started: manual scrolling, clock suspended (a drag started on
    ///   the notation also seeks there)
    /// - drag updated: edge scrolling, and for a resolved time: loop
    ///   deactivated when the time leaves it, clock seeked
    /// - drag ended: preferential scrolling, clock resumed
    ///
    /// The subscriptions are removed by [`SyncSession::dispose`].
    pub fn install_interaction_effects(
        &mut self,
        clock: Rc<RefCell<dyn Clock>>,
        prefer_auto_scroll: bool,
    ) -> SyncResult<Vec<SubscriptionId>> {
        let loaded = self
            .loaded
            .as_mut()
            .ok_or(SyncError::Uninitialized("install_interaction_effects"))?;

        let started = {
            let scroller = Rc::clone(&self.scroller);
            let looping = Rc::clone(&loaded.looping);
            let clock = Rc::clone(&clock);
            self.bus.subscribe(EventKind::CursorDragStarted, move |event| {
                let SyncEvent::CursorDragStarted { src } = event else {
                    return;
                };
                with_mut(&scroller, "scroller", |s| s.start_manual_scrolling());
                with_mut(&clock, "clock", |c| c.suspend());
                if let PointerTarget::CursorSnapshot { time_ms } = src {
                    seek_within_loop(&looping, &clock, *time_ms);
                }
            })
        };

        let updated = {
            let scroller = Rc::clone(&self.scroller);
            let looping = Rc::clone(&loaded.looping);
            let clock = Rc::clone(&clock);
            self.bus.subscribe(EventKind::CursorDragUpdated, move |event| {
                let SyncEvent::CursorDragUpdated { dst, .. } = event else {
                    return;
                };
                with_mut(&scroller, "scroller", |s| s.update_scroll_intent(dst.position.rel_y));
                if let Some(time_ms) = dst.time_ms {
                    seek_within_loop(&looping, &clock, time_ms);
                }
            })
        };

        let ended = {
            let scroller = Rc::clone(&self.scroller);
            let cursor = Rc::clone(&loaded.cursor);
            self.bus.subscribe(EventKind::CursorDragEnded, move |_| {
                with_mut(&scroller, "scroller", |s| {
                    s.start_preferential_scrolling(prefer_auto_scroll);
                    if prefer_auto_scroll {
                        if let Some(cursor_box) = cursor.try_borrow().ok().and_then(|c| c.get_box()) {
                            s.scroll_to_cursor(cursor_box);
                        }
                    }
                });
                with_mut(&clock, "clock", |c| c.unsuspend());
            })
        };

        let ids = vec![started, updated, ended];
        loaded.effect_ids.extend(ids.iter().copied());
        log::info!("SyncSession: interaction effects installed");
        Ok(ids)
    }

    pub fn resize_started(&mut self) {
        self.bus.dispatch(SyncEvent::ResizeStarted);
    }

    /// Re-place the cursors on the re-laid-out surface
    pub fn resize_ended(&mut self) {
        if let Some(loaded) = &self.loaded {
            if let Ok(mut cursor) = loaded.cursor.try_borrow_mut() {
                let time_ms = cursor.time_ms();
                let cause = cursor.cause();
                cursor.clear();
                if let Some(time_ms) = time_ms {
                    cursor.update(time_ms, cause);
                }
            }
            if let Ok(mut looping) = loaded.looping.try_borrow_mut() {
                looping.refresh();
            }
        }
        self.bus.dispatch(SyncEvent::ResizeEnded);
    }

    pub fn bus(&self) -> &Rc<EventBus> {
        &self.bus
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn scroller(&self) -> Rc<RefCell<Scroller>> {
        Rc::clone(&self.scroller)
    }

    pub fn timeline(&self) -> Option<Rc<TimelineIndex>> {
        self.loaded.as_ref().map(|l| Rc::clone(&l.timeline))
    }

    pub fn cursor(&self) -> Option<Rc<RefCell<LerpCursor>>> {
        self.loaded.as_ref().map(|l| Rc::clone(&l.cursor))
    }

    pub fn looping(&self) -> Option<Rc<RefCell<Loop>>> {
        self.loaded.as_ref().map(|l| Rc::clone(&l.looping))
    }

    pub fn pointer_state(&self) -> PointerState {
        self.loaded
            .as_ref()
            .map(|l| l.machine.state())
            .unwrap_or_default()
    }
}

impl Drop for SyncSession {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// The main cursor element when it can be hit
fn visible_cursor(cursor: &RefCell<LerpCursor>) -> Option<CursorId> {
    let cursor = cursor.try_borrow().ok()?;
    (!cursor.is_hidden()).then(|| cursor.element())
}

fn with_mut<T: ?Sized>(cell: &RefCell<T>, name: &str, f: impl FnOnce(&mut T)) {
    match cell.try_borrow_mut() {
        Ok(mut value) => f(&mut value),
        Err(_) => log::warn!("interaction effect skipped: {} already borrowed", name),
    }
}

/// Seek the clock, leaving the loop when the target is outside it
fn seek_within_loop(looping: &RefCell<Loop>, clock: &RefCell<dyn Clock>, time_ms: f64) {
    with_mut(looping, "loop", |l| {
        if !l.range().contains(time_ms) {
            l.deactivate();
        }
    });
    with_mut(clock, "clock", |c| c.seek(time_ms));
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::headless::{HeadlessContainer, HeadlessLayout, HeadlessSurface, ScriptedScore, SimulatedClock};
    use crate::looping::LoopRange;
    use crate::pointer::RawPointerKind;
    use crate::scroller::ScrollBehavior;

    struct Fixture {
        surface: Rc<HeadlessSurface>,
        container: Rc<HeadlessContainer>,
        layout: HeadlessLayout,
        session: SyncSession,
        events: Rc<RefCell<Vec<SyncEvent>>>,
    }

    /// `positions` beats of 1000ms each, 16 per line
    fn fixture(positions: usize, viewport_height: f64) -> Fixture {
        let score = ScriptedScore::uniform(positions, 1.0, 60.0);
        let surface = Rc::new(HeadlessSurface::new(score.layout()));
        let container = Rc::new(HeadlessContainer::new(1000.0, viewport_height));
        let mut session = SyncSession::new(surface.clone(), container.clone(), EngineConfig::default());

        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        session.bus().subscribe_all(move |e| sink.borrow_mut().push(e.clone()));
        session.init(&score).unwrap();

        Fixture {
            surface,
            container,
            layout: score.layout(),
            session,
            events,
        }
    }

    fn raw(kind: RawPointerKind, x: f64, y: f64, t: f64) -> RawPointerEvent {
        RawPointerEvent::new(kind, x, y, t)
    }

    #[test]
    fn test_init_events() {
        let f = fixture(8, 400.0);
        let kinds: Vec<EventKind> = f.events.borrow().iter().map(SyncEvent::kind).collect();
        assert_eq!(
            kinds,
            vec![EventKind::LoadStarted, EventKind::NumMeasuresChanged, EventKind::LoadEnded]
        );
        assert!(f.events.borrow().contains(&SyncEvent::NumMeasuresChanged { num_measures: 2 }));
    }

    #[test]
    fn test_reinit_disposes_previous_score() {
        let mut f = fixture(8, 400.0);
        let cursors = f.surface.cursor_count();
        f.session.tick(500.0);

        f.session.init(&ScriptedScore::uniform(4, 1.0, 60.0)).unwrap();

        assert_eq!(f.surface.cursor_count(), cursors);
        assert!(f.surface.colored_noteheads().is_empty());
        assert_eq!(f.session.timeline().map(|t| t.len()), Some(4));
    }

    #[test]
    fn test_invalid_score_is_reported() {
        let mut f = fixture(4, 400.0);
        let mut entries = ScriptedScore::uniform(3, 1.0, 60.0).entries().to_vec();
        entries[2].beat = 0.5;

        let result = f.session.init(&ScriptedScore::from_entries(entries));
        assert!(matches!(result, Err(SyncError::InvalidScore { .. })));
        assert!(!f.session.is_loaded());
    }

    #[test]
    fn test_tick_before_init_is_harmless() {
        let surface = Rc::new(HeadlessSurface::new(HeadlessLayout::default()));
        let container = Rc::new(HeadlessContainer::new(100.0, 100.0));
        let mut session = SyncSession::new(surface.clone(), container, EngineConfig::default());
        session.tick(100.0);
        session.handle_pointer(raw(RawPointerKind::Down, 0.0, 0.0, 0.0));
        assert_eq!(surface.op_count(), 0);
        assert_eq!(session.pointer_state(), PointerState::Idle);
    }

    #[test]
    fn test_effects_need_a_score() {
        let surface = Rc::new(HeadlessSurface::new(HeadlessLayout::default()));
        let container = Rc::new(HeadlessContainer::new(100.0, 100.0));
        let mut session = SyncSession::new(surface, container, EngineConfig::default());
        let clock = Rc::new(RefCell::new(SimulatedClock::new()));

        let result = session.install_interaction_effects(clock, true);
        assert!(matches!(result, Err(SyncError::Uninitialized(_))));
    }

    #[test]
    fn test_tick_follows_cursor_across_lines() {
        // 4 lines of 16 beats, viewport shows about one line
        let mut f = fixture(64, 200.0);
        f.session.tick(1000.0);
        assert_eq!(f.container.scroll_top(), 0.0);

        f.session.tick(33_500.0);
        let expected = f.layout.y_for_line(2) - crate::types::CURSOR_BOX_PADDING_PX;
        assert_eq!(f.container.scroll_top(), expected);
        assert!(!f.session.on_container_scrolled(expected));
    }

    #[test]
    fn test_drag_out_of_loop_deactivates_and_seeks() {
        let mut f = fixture(8, 400.0);
        let clock = Rc::new(RefCell::new(SimulatedClock::new()));
        clock.borrow_mut().play();
        f.session.install_interaction_effects(clock.clone(), true).unwrap();

        let looping = f.session.looping().unwrap();
        looping.borrow_mut().update(LoopRange::new(0.0, 2000.0));
        looping.borrow_mut().activate();

        f.session.tick(500.0);
        let y = f.layout.y_for_line(0) + 10.0;

        f.session.handle_pointer(raw(RawPointerKind::Down, f.layout.x_for_beat(0.5) + 1.0, y, 0.0));
        assert!(matches!(
            f.session.pointer_state(),
            PointerState::Dragging {
                target: PointerTarget::Cursor,
                ..
            }
        ));
        assert!(!clock.borrow().is_playing());
        assert_eq!(f.session.scroller().borrow().behavior(), ScrollBehavior::Manual);

        f.session.handle_pointer(raw(RawPointerKind::Move, f.layout.x_for_beat(2.5), y, 50.0));

        let dst_time = f.events.borrow().iter().find_map(|e| match e {
            SyncEvent::CursorDragUpdated { dst, .. } => dst.time_ms,
            _ => None,
        });
        assert_eq!(dst_time, Some(2500.0));
        assert!(!looping.borrow().is_active());
        assert_eq!(clock.borrow().seeks(), &[2500.0]);

        let now = clock.borrow().current_time_ms();
        f.session.tick(now);
        let cursor = f.session.cursor().unwrap();
        assert_eq!(cursor.borrow().cause(), UpdateCause::Interaction);
        assert_eq!(cursor.borrow().snapshot().map(|s| s.index()), Some(2));

        f.session.handle_pointer(raw(RawPointerKind::Up, f.layout.x_for_beat(2.5), y, 60.0));
        assert_eq!(f.session.pointer_state(), PointerState::Idle);
        assert!(clock.borrow().is_playing());
        assert_eq!(f.session.scroller().borrow().behavior(), ScrollBehavior::Auto);

        f.session.tick(2600.0);
        assert_eq!(cursor.borrow().cause(), UpdateCause::Unknown);
    }

    #[test]
    fn test_drag_inside_loop_keeps_it() {
        let mut f = fixture(8, 400.0);
        let clock = Rc::new(RefCell::new(SimulatedClock::new()));
        f.session.install_interaction_effects(clock.clone(), false).unwrap();

        let looping = f.session.looping().unwrap();
        looping.borrow_mut().update(LoopRange::new(0.0, 4000.0));
        looping.borrow_mut().activate();
        f.session.tick(500.0);

        let y = f.layout.y_for_line(0) + 10.0;
        f.session.handle_pointer(raw(RawPointerKind::Down, f.layout.x_for_beat(0.5), y, 0.0));
        f.session.handle_pointer(raw(RawPointerKind::Move, f.layout.x_for_beat(3.0), y, 40.0));
        f.session.handle_pointer(raw(RawPointerKind::Up, f.layout.x_for_beat(3.0), y, 80.0));

        assert!(looping.borrow().is_active());
        assert_eq!(clock.borrow().seeks(), &[3000.0]);
        assert_eq!(f.session.scroller().borrow().behavior(), ScrollBehavior::Disabled);
    }

    #[test]
    fn test_click_on_notation_seeks() {
        let mut f = fixture(8, 400.0);
        let clock = Rc::new(RefCell::new(SimulatedClock::new()));
        f.session.install_interaction_effects(clock.clone(), true).unwrap();
        f.session.tick(500.0);

        let y = f.layout.y_for_line(0) + 10.0;
        f.session.handle_pointer(raw(RawPointerKind::Down, f.layout.x_for_beat(5.0), y, 0.0));
        f.session.handle_pointer(raw(RawPointerKind::Up, f.layout.x_for_beat(5.0), y, 10.0));

        assert_eq!(clock.borrow().seeks(), &[5000.0]);
        assert!(!clock.borrow().is_suspended());
    }

    #[test]
    fn test_dispose_removes_effects_and_elements() {
        let mut f = fixture(8, 400.0);
        let clock = Rc::new(RefCell::new(SimulatedClock::new()));
        let subscribers = f.session.bus().len();
        f.session.install_interaction_effects(clock, true).unwrap();
        assert_eq!(f.session.bus().len(), subscribers + 3);

        f.session.dispose();
        assert_eq!(f.session.bus().len(), subscribers);
        assert_eq!(f.surface.cursor_count(), 0);
        assert!(f.session.cursor().is_none());
    }

    #[test]
    fn test_resize_replaces_cursor() {
        let mut f = fixture(8, 400.0);
        f.session.tick(1500.0);
        let ops = f.surface.op_count();

        f.session.resize_started();
        f.session.resize_ended();

        assert!(f.surface.op_count() > ops);
        let cursor = f.session.cursor().unwrap();
        assert_eq!(cursor.borrow().snapshot().map(|s| s.index()), Some(1));
        assert!(!cursor.borrow().is_hidden());
        let kinds: Vec<EventKind> = f.events.borrow().iter().map(SyncEvent::kind).collect();
        assert!(kinds.contains(&EventKind::ResizeStarted));
        assert!(kinds.contains(&EventKind::ResizeEnded));
    }

    #[test]
    fn test_resize_keeps_loop_quiet() {
        let mut f = fixture(8, 400.0);
        let looping = f.session.looping().unwrap();
        looping.borrow_mut().update(LoopRange::new(1000.0, 3000.0));
        looping.borrow_mut().activate();
        f.events.borrow_mut().clear();

        f.session.resize_started();
        f.session.resize_ended();

        let kinds: Vec<EventKind> = f.events.borrow().iter().map(SyncEvent::kind).collect();
        assert_eq!(kinds, vec![EventKind::ResizeStarted, EventKind::ResizeEnded]);
        assert!(looping.borrow().is_active());
        let start = looping.borrow().start_cursor().element();
        assert!(!f.surface.cursor(start).unwrap().hidden);
    }
}
