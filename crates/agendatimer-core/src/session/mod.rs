//! Session orchestration.
//!
//! [`SessionController`] owns the block queue, the countdown engine and the
//! mirror sync. It picks what to count down, chains to the next unfinished
//! block when a countdown ends, persists the queue after every change and
//! keeps the mirror current.
//!
//! Engine events reach the controller through a system listener that queues
//! them; every public operation drains that queue before returning.

mod manual;

pub use manual::ManualDuration;

use std::cell::RefCell;
use std::rc::Rc;

use chrono::{DateTime, Duration, Local, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::alerts::AlertPolicy;
use crate::block::{minutes_from_ms, Block, BlockQueue, QueueSummary};
use crate::countdown::{CountdownEngine, CountdownStatus, EngineServices, TaskId};
use crate::error::{Result, ValidationError};
use crate::events::{CountdownEvent, EventKind};
use crate::mirror::{MirrorAction, MirrorSurface, MirrorSync};
use crate::storage::{BlockStore, Config};

/// Behaviour switches taken from [`Config`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    pub auto_advance: bool,
    pub mark_done_on_complete: bool,
    pub close_mirror_on_stop: bool,
}

impl From<&Config> for SessionSettings {
    fn from(config: &Config) -> Self {
        Self {
            auto_advance: config.auto_advance,
            mark_done_on_complete: config.mark_done_on_complete,
            close_mirror_on_stop: config.mirror.close_on_stop,
        }
    }
}

/// Time summary for the agenda as it stands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub queue: QueueSummary,
    pub status: CountdownStatus,
    /// Time left on the running countdown plus every other unfinished block.
    pub remaining_ms: i64,
    pub finish_at: DateTime<Utc>,
}

pub struct SessionController<S: MirrorSurface> {
    queue: BlockQueue,
    engine: CountdownEngine,
    mirror: MirrorSync<S>,
    store: Box<dyn BlockStore>,
    outbox: Rc<RefCell<Vec<CountdownEvent>>>,
    settings: SessionSettings,
    paused: bool,
    saved_revision: u64,
}

impl<S: MirrorSurface> SessionController<S> {
    /// Load the queue from `store` and wire up the engine.
    pub fn new(store: Box<dyn BlockStore>, services: EngineServices, config: &Config, surface: S) -> Self {
        let queue = BlockQueue::from_parts(store.load_blocks(), store.load_active_index());
        let policy = AlertPolicy::from_config(&config.alerts, config.notifications.enabled);
        let mut engine = CountdownEngine::new(services, config.countdown.clone(), policy);

        let outbox = Rc::new(RefCell::new(Vec::new()));
        for kind in EventKind::ALL {
            let outbox = outbox.clone();
            engine.add_system_listener(
                kind,
                Box::new(move |event| outbox.borrow_mut().push(event.clone())),
            );
        }

        tracing::debug!(blocks = queue.len(), "session loaded");
        Self {
            saved_revision: queue.revision(),
            queue,
            engine,
            mirror: MirrorSync::new(surface, config.mirror.progress_threshold_pct),
            store,
            outbox,
            settings: SessionSettings::from(config),
            paused: false,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn queue(&self) -> &BlockQueue {
        &self.queue
    }

    pub fn engine(&self) -> &CountdownEngine {
        &self.engine
    }

    /// Engine access for listeners and host focus. Use the controller's own
    /// commands to start or stop countdowns so the queue stays in step.
    pub fn engine_mut(&mut self) -> &mut CountdownEngine {
        &mut self.engine
    }

    pub fn mirror(&self) -> &MirrorSync<S> {
        &self.mirror
    }

    pub fn mirror_mut(&mut self) -> &mut MirrorSync<S> {
        &mut self.mirror
    }

    pub fn settings(&self) -> SessionSettings {
        self.settings
    }

    /// Whether the pause control should read "resume".
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn summary(&self, now: DateTime<Utc>) -> SessionSummary {
        let counting = self.engine.status() != CountdownStatus::Stopped;
        let active = self.queue.current_index();
        let mut remaining_ms: i64 = self
            .queue
            .all()
            .iter()
            .enumerate()
            .filter(|(i, b)| !b.is_done && !(counting && Some(*i) == active))
            .fold(0i64, |total, (_, b)| total.saturating_add(b.duration_ms()));
        if counting {
            remaining_ms = remaining_ms.saturating_add(self.engine.remaining().max(0));
        }
        SessionSummary {
            queue: self.queue.summary(),
            status: self.engine.status(),
            remaining_ms,
            finish_at: now
                .checked_add_signed(Duration::milliseconds(remaining_ms))
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }

    // ── Countdown commands ───────────────────────────────────────────

    /// Start counting down the active block, or the first unfinished one.
    ///
    /// With nothing unfinished, `manual` supplies the length and a new
    /// untitled block is created for it. Returns the started duration.
    pub fn start(&mut self, manual: Option<ManualDuration>) -> Result<i64> {
        self.start_at(manual, &Local::now())
    }

    pub fn start_at<Tz: TimeZone>(&mut self, manual: Option<ManualDuration>, now: &DateTime<Tz>) -> Result<i64> {
        let target = self
            .queue
            .current_index()
            .filter(|&i| !self.queue.all()[i].is_done)
            .or_else(|| self.queue.first_unfinished_index());

        let duration_ms = match target {
            Some(index) => {
                let duration_ms = self.queue.all()[index].duration_ms();
                if duration_ms <= 0 {
                    return Err(ValidationError::NonPositiveDuration { duration_ms }.into());
                }
                if self.queue.current_index() != Some(index) {
                    self.queue.set_active(index);
                }
                duration_ms
            }
            None => {
                let manual = manual.ok_or(ValidationError::NoDuration)?;
                let requested_ms = manual.resolve_ms(now)?;
                let block = Block::new("", minutes_from_ms(requested_ms));
                // The countdown runs for what the block records.
                let duration_ms = block.duration_ms();
                if duration_ms <= 0 {
                    return Err(ValidationError::NonPositiveDuration {
                        duration_ms: requested_ms,
                    }
                    .into());
                }
                self.queue.add(block.title, block.duration_minutes);
                self.queue.set_active(self.queue.len() - 1);
                tracing::debug!(requested_ms, duration_ms, "created block for manual countdown");
                duration_ms
            }
        };

        self.begin_countdown(duration_ms);
        self.settle();
        Ok(duration_ms)
    }

    /// Re-activate the first unfinished block and start it. Falls back to
    /// `manual` when nothing is unfinished.
    pub fn restart_from_beginning(&mut self, manual: Option<ManualDuration>) -> Result<i64> {
        if let Some(index) = self.queue.first_unfinished_index() {
            self.queue.set_active(index);
        }
        self.start(manual)
    }

    /// Run one periodic tick. Returns the engine events it produced,
    /// including those of a chained countdown.
    pub fn tick(&mut self) -> Vec<CountdownEvent> {
        if self.engine.tick() == Some(CountdownEvent::End) {
            self.on_countdown_end();
        }
        self.settle()
    }

    /// Tick on behalf of a driver task, ignoring tasks that were cancelled.
    pub fn tick_from(&mut self, task: TaskId) -> Vec<CountdownEvent> {
        if !self.engine.accepts_tick(task) {
            return Vec::new();
        }
        self.tick()
    }

    pub fn pause(&mut self) -> bool {
        let paused = self.engine.pause();
        if paused {
            self.paused = true;
        }
        self.settle();
        paused
    }

    pub fn resume(&mut self) -> bool {
        let resumed = self.engine.resume();
        if resumed {
            self.paused = false;
        }
        self.settle();
        resumed
    }

    pub fn toggle_pause(&mut self) -> bool {
        if self.paused {
            self.resume()
        } else {
            self.pause()
        }
    }

    pub fn stop(&mut self) {
        self.engine.stop();
        self.paused = false;
        self.settle();
    }

    pub fn reset(&mut self) {
        self.engine.reset();
        self.paused = false;
        self.settle();
    }

    /// Reset the countdown and forget every block, including stored ones.
    pub fn reset_all(&mut self) {
        self.engine.reset();
        self.paused = false;
        self.queue.clear();
        self.store.clear();
        self.saved_revision = self.queue.revision();
        self.settle();
    }

    // ── Navigation ───────────────────────────────────────────────────

    /// Move to the next unfinished block. A live countdown restarts on it.
    pub fn next_block(&mut self) -> Option<usize> {
        self.navigate(BlockQueue::advance)
    }

    pub fn previous_block(&mut self) -> Option<usize> {
        self.navigate(BlockQueue::retreat)
    }

    /// Actions from the mirror go through the same path as local input.
    pub fn handle_mirror_action(&mut self, action: MirrorAction) -> Option<usize> {
        match action {
            MirrorAction::Advance => self.next_block(),
        }
    }

    // ── Queue editing ────────────────────────────────────────────────

    /// Apply an edit to the queue, then persist and refresh the mirror.
    pub fn edit_queue<R>(&mut self, edit: impl FnOnce(&mut BlockQueue) -> R) -> R {
        let result = edit(&mut self.queue);
        self.settle();
        result
    }

    pub fn add_block(&mut self, title: &str, duration_minutes: f64) -> String {
        self.edit_queue(|q| q.add(title, duration_minutes).id.clone())
    }

    pub fn remove_block(&mut self, id: &str) -> bool {
        self.edit_queue(|q| q.remove(id).is_some())
    }

    pub fn update_block(&mut self, id: &str, title: &str, duration_minutes: f64) -> bool {
        self.edit_queue(|q| q.update(id, title, duration_minutes))
    }

    pub fn toggle_done(&mut self, id: &str) -> bool {
        self.edit_queue(|q| q.toggle_done(id))
    }

    pub fn set_active(&mut self, index: usize) -> Option<usize> {
        self.edit_queue(|q| q.set_active(index))
    }

    // ── Mirror ───────────────────────────────────────────────────────

    pub fn open_mirror(&mut self) -> bool {
        let advance_enabled = self.advance_enabled();
        self.mirror.open(&self.engine, &self.queue, advance_enabled)
    }

    pub fn close_mirror(&mut self) {
        self.mirror.close();
    }

    // ── Configuration ────────────────────────────────────────────────

    pub fn apply_config(&mut self, config: &Config) {
        self.settings = SessionSettings::from(config);
        self.engine.set_settings(config.countdown.clone());
        self.engine.set_policy(AlertPolicy::from_config(
            &config.alerts,
            config.notifications.enabled,
        ));
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn begin_countdown(&mut self, duration_ms: i64) {
        let message = match self.queue.active() {
            Some(block) if !block.title.is_empty() => format!("Time is up: {}", block.title),
            _ => "Time is up".to_string(),
        };
        self.engine.set_end_message(message);
        self.engine.start(duration_ms, None);
        self.paused = false;
    }

    fn on_countdown_end(&mut self) {
        if !self.settings.auto_advance {
            return;
        }
        if self.settings.mark_done_on_complete {
            if let Some(id) = self.queue.active().map(|b| b.id.clone()) {
                self.queue.mark_done(&id);
            }
        }
        match self.queue.advance() {
            Some(index) => {
                let duration_ms = self.queue.all()[index].duration_ms();
                if duration_ms > 0 {
                    tracing::info!(index, duration_ms, "chaining to next block");
                    self.begin_countdown(duration_ms);
                } else {
                    tracing::warn!(index, "next block has no duration, staying in overtime");
                }
            }
            None => tracing::info!("no unfinished blocks left, staying in overtime"),
        }
    }

    fn navigate(&mut self, step: fn(&mut BlockQueue) -> Option<usize>) -> Option<usize> {
        if self.queue.is_empty() {
            return None;
        }
        let live = self.engine.status() != CountdownStatus::Stopped;
        let landed = step(&mut self.queue);
        if let (Some(index), true) = (landed, live) {
            let duration_ms = self.queue.all()[index].duration_ms();
            if duration_ms > 0 {
                self.begin_countdown(duration_ms);
            }
        }
        self.settle();
        landed
    }

    fn advance_enabled(&self) -> bool {
        self.engine.status() != CountdownStatus::Stopped
    }

    fn persist(&mut self) {
        if self.queue.revision() == self.saved_revision {
            return;
        }
        self.store.save_blocks(self.queue.all());
        self.store.save_active_index(self.queue.current_index());
        self.saved_revision = self.queue.revision();
    }

    /// Persist, route queued engine events, refresh the mirror.
    fn settle(&mut self) -> Vec<CountdownEvent> {
        self.persist();
        let events: Vec<CountdownEvent> = self.outbox.borrow_mut().drain(..).collect();
        if self.settings.close_mirror_on_stop && events.contains(&CountdownEvent::Stop) {
            self.mirror.close();
        }
        let advance_enabled = self.advance_enabled();
        self.mirror.sync(&self.engine, &self.queue, advance_enabled);
        events
    }
}

impl<S: MirrorSurface> std::fmt::Debug for SessionController<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("queue", &self.queue)
            .field("engine", &self.engine)
            .field("settings", &self.settings)
            .field("paused", &self.paused)
            .finish_non_exhaustive()
    }
}
