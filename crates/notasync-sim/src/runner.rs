//! Frame loop for a scenario
//!
//! Each frame: fire due script steps, flush a throttled pointer move, tick the
//! session at the clock time, report container scrolls, wrap an active loop,
//! then advance the clock.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use anyhow::{Context, Result};

use notasync_core::config::EngineConfig;
use notasync_core::headless::{HeadlessContainer, HeadlessSurface, SimulatedClock};
use notasync_core::looping::LoopRange;
use notasync_core::pointer::{RawPointerEvent, RawPointerKind};
use notasync_core::surface::Clock;
use notasync_core::SyncSession;

use crate::scenario::{Action, Scenario};

/// What a run produced
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// Dispatch count per event name
    pub event_counts: BTreeMap<&'static str, usize>,
    pub frames: usize,
    pub final_clock_ms: f64,
    /// Pointer the main cursor ended on
    pub final_pointer: Option<usize>,
    pub final_scroll_top: f64,
    pub loop_active: bool,
    pub seeks: Vec<f64>,
}

impl RunReport {
    pub fn count(&self, name: &str) -> usize {
        self.event_counts.get(name).copied().unwrap_or(0)
    }
}

/// Play a scenario to completion
pub fn run(scenario: &Scenario, config: EngineConfig) -> Result<RunReport> {
    let score = scenario.score.build();
    let surface = Rc::new(HeadlessSurface::new(score.layout()));
    let container = Rc::new(HeadlessContainer::new(
        scenario.viewport.width,
        scenario.viewport.height,
    ));
    let prefer_auto = config.scroll.autoscroll_preferred;
    let mut session = SyncSession::new(surface.clone(), container.clone(), config);

    let counts: Rc<RefCell<BTreeMap<&'static str, usize>>> = Rc::default();
    let sink = Rc::clone(&counts);
    session.bus().subscribe_all(move |event| {
        log::debug!("event {}: {:?}", event.name(), event);
        *sink.borrow_mut().entry(event.name()).or_insert(0) += 1;
    });

    session.init(&score).context("Failed to load scenario score")?;

    let clock = Rc::new(RefCell::new(SimulatedClock::new()));
    session.install_interaction_effects(clock.clone(), prefer_auto)?;

    let looping = session.looping().context("Session has no loop after init")?;
    if let Some([start, end]) = scenario.loop_ms {
        let mut looping = looping.borrow_mut();
        looping.update(LoopRange::new(start, end));
        looping.activate();
    }

    if scenario.autoplay {
        clock.borrow_mut().play();
    }

    let mut steps = scenario.script.iter().peekable();
    let mut last_scroll_top = container.scroll_top();
    let mut frames = 0;
    let mut now = 0.0;

    while now <= scenario.run_ms {
        while let Some(step) = steps.next_if(|s| s.at_ms <= now) {
            match step.action {
                Action::Down { x, y } => session.handle_pointer(raw(RawPointerKind::Down, x, y, now)),
                Action::Move { x, y } => session.handle_pointer(raw(RawPointerKind::Move, x, y, now)),
                Action::Up { x, y } => session.handle_pointer(raw(RawPointerKind::Up, x, y, now)),
                Action::Scroll { top } => container.user_scroll(top),
            }
        }
        session.flush_pointer(now);

        let clock_ms = clock.borrow().current_time_ms();
        session.tick(clock_ms);

        let scroll_top = container.scroll_top();
        if scroll_top != last_scroll_top {
            session.on_container_scrolled(scroll_top);
            last_scroll_top = scroll_top;
        }

        // Playback wraps at the end of an active loop
        let range = {
            let looping = looping.borrow();
            looping.is_active().then(|| looping.range())
        };
        if let Some(range) = range {
            if clock_ms >= range.end_ms {
                log::debug!("loop wrap at {:.1} ms", clock_ms);
                clock.borrow_mut().seek(range.start_ms);
            }
        }

        clock.borrow_mut().advance(scenario.tick_ms);
        now += scenario.tick_ms;
        frames += 1;
    }

    let final_pointer = session
        .cursor()
        .and_then(|cursor| cursor.borrow().snapshot().map(|s| s.index()));
    let loop_active = looping.borrow().is_active();
    let clock = clock.borrow();
    let report = RunReport {
        event_counts: counts.borrow().clone(),
        frames,
        final_clock_ms: clock.current_time_ms(),
        final_pointer,
        final_scroll_top: container.scroll_top(),
        loop_active,
        seeks: clock.seeks().to_vec(),
    };

    session.dispose();
    Ok(report)
}

fn raw(kind: RawPointerKind, x: f64, y: f64, now: f64) -> RawPointerEvent {
    RawPointerEvent::new(kind, x, y, now)
}
