//! Integration tests for session chaining, persistence and mirror pushes.
//!
//! These drive the controller with a manual clock and driver so every tick
//! is deterministic.

use std::cell::RefCell;
use std::rc::Rc;

use chrono::{Duration, TimeZone, Utc};

use agendatimer_core::alerts::{NoNotifications, SilentAlerts};
use agendatimer_core::countdown::{ManualClock, ManualDriver};
use agendatimer_core::mirror::{MirrorHandle, MirrorPatch, MirrorSnapshot, MirrorSurface, NoMirror};
use agendatimer_core::storage::{BlockStore, MemoryStore};
use agendatimer_core::{
    Config, CountdownEvent, CountdownStatus, Database, EngineServices, ManualDuration,
    MirrorAction, SessionController,
};

#[derive(Debug, Default)]
struct MirrorLog {
    open: bool,
    next_control: bool,
    repaints: usize,
    patches: usize,
    closes: usize,
}

/// Mirror whose log stays readable after the controller takes ownership.
#[derive(Debug, Clone, Default)]
struct SharedMirror(Rc<RefCell<MirrorLog>>);

impl MirrorSurface for SharedMirror {
    fn open(&mut self, initial: &MirrorSnapshot) -> Option<MirrorHandle> {
        let mut log = self.0.borrow_mut();
        log.open = true;
        log.next_control = initial.structure.show_next;
        Some(MirrorHandle(7))
    }
    fn is_open(&self, _handle: MirrorHandle) -> bool {
        self.0.borrow().open
    }
    fn has_next_control(&self, _handle: MirrorHandle) -> bool {
        self.0.borrow().next_control
    }
    fn full_repaint(&mut self, _handle: MirrorHandle, snapshot: &MirrorSnapshot) {
        let mut log = self.0.borrow_mut();
        log.repaints += 1;
        log.next_control = snapshot.structure.show_next;
    }
    fn patch(&mut self, _handle: MirrorHandle, _patch: &MirrorPatch) {
        self.0.borrow_mut().patches += 1;
    }
    fn close(&mut self, _handle: MirrorHandle) {
        let mut log = self.0.borrow_mut();
        log.open = false;
        log.closes += 1;
    }
}

fn services(clock: &ManualClock, driver: &ManualDriver) -> EngineServices {
    EngineServices {
        clock: Box::new(clock.clone()),
        driver: Box::new(driver.clone()),
        alerts: Box::new(SilentAlerts),
        notifier: Box::new(NoNotifications),
    }
}

fn session<S: MirrorSurface>(clock: &ManualClock, driver: &ManualDriver, surface: S) -> SessionController<S> {
    SessionController::new(
        Box::new(MemoryStore::default()),
        services(clock, driver),
        &Config::default(),
        surface,
    )
}

fn run_for<S: MirrorSurface>(s: &mut SessionController<S>, clock: &ManualClock, ms: i64) -> Vec<CountdownEvent> {
    let mut events = Vec::new();
    let mut elapsed = 0;
    while elapsed < ms {
        clock.advance(250);
        elapsed += 250;
        events.extend(s.tick());
    }
    events
}

fn active_title<S: MirrorSurface>(s: &SessionController<S>) -> Option<String> {
    s.queue().active().map(|b| b.title.clone())
}

#[test]
fn manual_start_on_empty_queue_creates_block() {
    let clock = ManualClock::new(0);
    let driver = ManualDriver::new();
    let mut s = session(&clock, &driver, NoMirror);

    let started = s.start(Some(ManualDuration::from_ms(90_000))).unwrap();
    assert_eq!(started, 90_000);
    assert_eq!(s.queue().len(), 1);
    let block = s.queue().active().unwrap();
    assert_eq!(block.duration_minutes, 1.5);
    assert_eq!(block.title, "");
    assert_eq!(s.engine().remaining(), 90_000);
    assert_eq!(s.engine().status(), CountdownStatus::Running);
}

#[test]
fn manual_countdown_runs_for_the_recorded_block_length() {
    let clock = ManualClock::new(0);
    let driver = ManualDriver::new();
    let mut s = session(&clock, &driver, NoMirror);

    // 61s is 1.0166 minutes, recorded as 1.02.
    let started = s.start(Some(ManualDuration::from_ms(61_000))).unwrap();
    let block = s.queue().active().unwrap();
    assert_eq!(block.duration_minutes, 1.02);
    assert_eq!(started, block.duration_ms());
    assert_eq!(s.engine().duration_ms(), 61_200);
    assert_eq!(s.engine().remaining(), 61_200);
}

#[test]
fn manual_until_rounding_to_zero_is_rejected() {
    let clock = ManualClock::new(0);
    let driver = ManualDriver::new();
    let mut s = session(&clock, &driver, NoMirror);
    let now = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap() + Duration::milliseconds(800);
    let until = ManualDuration::parse_until("09:00:01").unwrap();

    assert!(s.start_at(Some(until), &now).is_err());
    assert!(s.queue().is_empty());
    assert_eq!(s.engine().status(), CountdownStatus::Stopped);
}

#[test]
fn huge_block_durations_are_clamped() {
    let clock = ManualClock::new(1_700_000_000_000);
    let driver = ManualDriver::new();
    let mut s = session(&clock, &driver, NoMirror);
    s.add_block("Huge", 1e20);
    s.add_block("Max", f64::MAX);

    let idle = s.summary(Utc::now());
    assert_eq!(idle.remaining_ms, 2 * 600_000_000_000);

    let started = s.start(None).unwrap();
    assert_eq!(started, 600_000_000_000);
    assert_eq!(s.engine().remaining(), 600_000_000_000);
    assert!(!s.engine().is_overtime());

    let live = s.summary(Utc::now());
    assert_eq!(live.remaining_ms, 2 * 600_000_000_000);
    assert!(live.finish_at > Utc::now());
}

#[test]
fn manual_start_when_all_done_creates_active_block() {
    let clock = ManualClock::new(0);
    let driver = ManualDriver::new();
    let mut s = session(&clock, &driver, NoMirror);
    let a = s.add_block("A", 1.0);
    s.toggle_done(&a);

    s.start(Some(ManualDuration::from_ms(30_000))).unwrap();
    assert_eq!(s.queue().len(), 2);
    assert_eq!(s.queue().current_index(), Some(1));
    assert_eq!(s.queue().all().iter().filter(|b| b.is_active).count(), 1);
}

#[test]
fn countdowns_chain_through_unfinished_blocks() {
    let clock = ManualClock::new(0);
    let driver = ManualDriver::new();
    let mut s = session(&clock, &driver, NoMirror);
    s.add_block("A", 0.05);
    let b = s.add_block("B", 0.05);
    s.add_block("C", 0.05);
    s.toggle_done(&b);

    s.start(None).unwrap();
    assert_eq!(active_title(&s).as_deref(), Some("A"));

    let events = run_for(&mut s, &clock, 3_000);
    assert!(events.contains(&CountdownEvent::End));
    assert!(events.contains(&CountdownEvent::Start { duration_ms: 3_000 }));
    assert_eq!(active_title(&s).as_deref(), Some("C"));
    assert!(s.queue().all()[0].is_done);
    assert_eq!(driver.live_tasks().len(), 1);

    // Last block finishes: nothing left, countdown stays in overtime.
    run_for(&mut s, &clock, 4_000);
    assert!(s.queue().active().is_none());
    assert!(s.queue().all().iter().all(|b| b.is_done));
    assert_eq!(s.engine().status(), CountdownStatus::Running);
    assert!(s.engine().remaining() < 0);
    assert_eq!(s.engine().progress_percent(), 100.0);
}

#[test]
fn auto_advance_off_leaves_overtime() {
    let clock = ManualClock::new(0);
    let driver = ManualDriver::new();
    let mut config = Config::default();
    config.auto_advance = false;
    let mut s = SessionController::new(
        Box::new(MemoryStore::default()),
        services(&clock, &driver),
        &config,
        NoMirror,
    );
    s.add_block("A", 0.05);
    s.add_block("B", 0.05);
    s.start(None).unwrap();
    run_for(&mut s, &clock, 4_000);
    assert_eq!(active_title(&s).as_deref(), Some("A"));
    assert!(!s.queue().all()[0].is_done);
    assert!(s.engine().is_overtime());
}

#[test]
fn restart_from_beginning_picks_first_unfinished() {
    let clock = ManualClock::new(0);
    let driver = ManualDriver::new();
    let mut s = session(&clock, &driver, NoMirror);
    let a = s.add_block("A", 1.0);
    s.add_block("B", 2.0);
    s.add_block("C", 3.0);
    s.set_active(2);
    s.toggle_done(&a);

    let started = s.restart_from_beginning(None).unwrap();
    assert_eq!(started, 120_000);
    assert_eq!(active_title(&s).as_deref(), Some("B"));
}

#[test]
fn restart_with_everything_done_uses_manual() {
    let clock = ManualClock::new(0);
    let driver = ManualDriver::new();
    let mut s = session(&clock, &driver, NoMirror);
    let a = s.add_block("A", 1.0);
    s.toggle_done(&a);
    assert!(s.restart_from_beginning(None).is_err());
    assert_eq!(s.restart_from_beginning(Some(ManualDuration::from_ms(6_000))).unwrap(), 6_000);
}

#[test]
fn next_block_restarts_live_countdown() {
    let clock = ManualClock::new(0);
    let driver = ManualDriver::new();
    let mut s = session(&clock, &driver, NoMirror);
    s.add_block("A", 1.0);
    s.add_block("B", 2.0);
    s.start(None).unwrap();
    clock.advance(10_000);

    assert_eq!(s.handle_mirror_action(MirrorAction::Advance), Some(1));
    assert_eq!(s.engine().remaining(), 120_000);
    assert_eq!(s.previous_block(), Some(0));
    assert_eq!(s.engine().remaining(), 60_000);
    assert_eq!(driver.live_tasks().len(), 1);
}

#[test]
fn next_block_while_stopped_only_moves_selection() {
    let clock = ManualClock::new(0);
    let driver = ManualDriver::new();
    let mut s = session(&clock, &driver, NoMirror);
    s.add_block("A", 1.0);
    s.add_block("B", 2.0);
    assert_eq!(s.next_block(), Some(1));
    assert_eq!(s.engine().status(), CountdownStatus::Stopped);
    assert!(driver.live_tasks().is_empty());
}

#[test]
fn pause_resume_through_session() {
    let clock = ManualClock::new(0);
    let driver = ManualDriver::new();
    let mut s = session(&clock, &driver, NoMirror);
    s.add_block("A", 1.0);
    s.start(None).unwrap();
    run_for(&mut s, &clock, 3_000);
    assert!(s.pause());
    clock.advance(5_000);
    assert!(s.tick().is_empty());
    assert!(s.resume());
    assert_eq!(s.engine().remaining(), 57_000);
}

#[test]
fn stale_driver_ticks_are_ignored() {
    let clock = ManualClock::new(0);
    let driver = ManualDriver::new();
    let mut s = session(&clock, &driver, NoMirror);
    s.add_block("A", 1.0);
    s.start(None).unwrap();
    let first = s.engine().driver_task().unwrap();
    s.start(None).unwrap();
    clock.advance(1_000);
    assert!(s.tick_from(first).is_empty());
    let live = s.engine().driver_task().unwrap();
    assert!(!s.tick_from(live).is_empty());
}

#[test]
fn queue_is_persisted_after_each_mutation() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("agendatimer.db");
    let clock = ManualClock::new(0);
    let driver = ManualDriver::new();

    {
        let store = Database::open_at(&path).unwrap();
        let mut s = SessionController::new(Box::new(store), services(&clock, &driver), &Config::default(), NoMirror);
        s.add_block("Intro", 5.0);
        let b = s.add_block("Review", 10.0);
        s.set_active(1);
        s.toggle_done(&b);
    }

    let store = Database::open_at(&path).unwrap();
    assert_eq!(store.load_blocks().len(), 2);
    assert_eq!(store.load_active_index(), Some(1));

    let s = SessionController::new(Box::new(store), services(&clock, &driver), &Config::default(), NoMirror);
    assert_eq!(s.queue().len(), 2);
    assert_eq!(s.queue().current_index(), Some(1));
    assert!(s.queue().all()[1].is_done);
    assert_eq!(s.queue().all()[0].title, "Intro");
}

#[test]
fn reset_all_clears_queue_and_store() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("agendatimer.db");
    let clock = ManualClock::new(0);
    let driver = ManualDriver::new();
    let store = Database::open_at(&path).unwrap();
    let mut s = SessionController::new(Box::new(store), services(&clock, &driver), &Config::default(), NoMirror);
    s.add_block("A", 1.0);
    s.start(None).unwrap();
    s.reset_all();
    assert!(s.queue().is_empty());
    assert_eq!(s.engine().status(), CountdownStatus::Stopped);
    drop(s);

    let store = Database::open_at(&path).unwrap();
    assert!(store.load_blocks().is_empty());
}

#[test]
fn mirror_follows_session_and_closes_on_stop() {
    let clock = ManualClock::new(0);
    let driver = ManualDriver::new();
    let mirror = SharedMirror::default();
    let mut s = session(&clock, &driver, mirror.clone());
    s.add_block("A", 1.0);
    s.add_block("B", 1.0);

    assert!(s.open_mirror());
    assert!(!mirror.0.borrow().next_control);

    // Starting enables the advance control: structure changed.
    s.start(None).unwrap();
    assert_eq!(mirror.0.borrow().repaints, 1);
    assert!(mirror.0.borrow().next_control);

    // Sub-second ticks inside the same second push nothing.
    clock.advance(100);
    s.tick();
    let patches = mirror.0.borrow().patches;
    clock.advance(100);
    s.tick();
    assert_eq!(mirror.0.borrow().patches, patches);

    s.stop();
    assert_eq!(mirror.0.borrow().closes, 1);
    assert!(!s.mirror().is_open());
}

#[test]
fn mirror_stays_open_on_stop_when_configured() {
    let clock = ManualClock::new(0);
    let driver = ManualDriver::new();
    let mirror = SharedMirror::default();
    let mut config = Config::default();
    config.mirror.close_on_stop = false;
    let mut s = SessionController::new(
        Box::new(MemoryStore::default()),
        services(&clock, &driver),
        &config,
        mirror.clone(),
    );
    s.add_block("A", 1.0);
    s.open_mirror();
    s.start(None).unwrap();
    s.stop();
    assert!(s.mirror().is_open());
    assert_eq!(mirror.0.borrow().closes, 0);
}

#[test]
fn caller_listeners_are_cleared_by_start_but_system_ones_survive() {
    let clock = ManualClock::new(0);
    let driver = ManualDriver::new();
    let mut s = session(&clock, &driver, NoMirror);
    s.add_block("A", 1.0);
    s.engine_mut()
        .add_listener(agendatimer_core::EventKind::Start, Box::new(|_| {}));
    s.start(None).unwrap();
    assert_eq!(s.engine().listeners().transient_count(), 0);
    // The controller still sees events after the caller's were dropped.
    clock.advance(1_000);
    assert!(!s.tick().is_empty());
}
