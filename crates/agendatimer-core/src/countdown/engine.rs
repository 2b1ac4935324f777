//! Countdown engine implementation.
//!
//! The engine is a wall-clock-based state machine. It does not own a thread;
//! a [`TickDriver`] task tells the host when to call `tick()`.
//!
//! ## State Transitions
//!
//! ```text
//! Stopped -> Running <-> Paused
//! Running -> Stopped, Paused -> Stopped
//! ```
//!
//! Reaching zero is not a transition. A finished countdown stays `Running`
//! with zero or negative remaining time (overtime) until it is stopped or
//! restarted.
//!
//! ## Usage
//!
//! ```ignore
//! let mut engine = CountdownEngine::new(services, CountdownConfig::default(), AlertPolicy::default());
//! engine.start(5 * 60_000, None);
//! // Whenever the driver fires:
//! engine.tick(); // Returns Some(CountdownEvent::End) on the first zero crossing
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::clock::Clock;
use super::driver::{TaskId, TickDriver};
use super::listeners::{Listener, ListenerId, Listeners};
use crate::alerts::{AlertKind, AlertPolicy, AlertService, NotificationService};
use crate::events::{CountdownEvent, EventKind};
use crate::storage::CountdownConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CountdownStatus {
    #[default]
    Stopped,
    Running,
    Paused,
}

/// Display phase, finer than [`CountdownStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CountdownPhase {
    Idle,
    Counting,
    /// Inside the warning window.
    Ending,
    Overtime,
    Paused,
}

/// Per-countdown bookkeeping. Reset on every `start`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CountdownState {
    pub status: CountdownStatus,
    pub duration_ms: i64,
    pub end_at_epoch_ms: Option<i64>,
    /// Remaining time captured by `pause`, consumed by `resume`.
    pub paused_remaining_ms: Option<i64>,
    pub warning_fired: bool,
    pub end_fired: bool,
    pub last_end_alert_at_epoch_ms: Option<i64>,
}

/// Collaborators the engine calls out to.
pub struct EngineServices {
    pub clock: Box<dyn Clock>,
    pub driver: Box<dyn TickDriver>,
    pub alerts: Box<dyn AlertService>,
    pub notifier: Box<dyn NotificationService>,
}

/// Single-countdown state machine.
pub struct CountdownEngine {
    state: CountdownState,
    settings: CountdownConfig,
    policy: AlertPolicy,
    services: EngineServices,
    listeners: Listeners,
    /// The one live driver task, if any.
    task: Option<TaskId>,
    last_tick_secs: Option<i64>,
    on_complete: Option<Box<dyn FnOnce()>>,
    host_focused: bool,
    end_message: String,
}

impl CountdownEngine {
    pub fn new(services: EngineServices, settings: CountdownConfig, policy: AlertPolicy) -> Self {
        Self {
            state: CountdownState::default(),
            settings,
            policy,
            services,
            listeners: Listeners::default(),
            task: None,
            last_tick_secs: None,
            on_complete: None,
            host_focused: true,
            end_message: "Time is up".into(),
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn status(&self) -> CountdownStatus {
        self.state.status
    }

    pub fn state(&self) -> &CountdownState {
        &self.state
    }

    pub fn duration_ms(&self) -> i64 {
        self.state.duration_ms
    }

    /// Milliseconds left. Zero with no end target, negative in overtime.
    pub fn remaining(&self) -> i64 {
        match (self.state.status, self.state.end_at_epoch_ms) {
            (CountdownStatus::Paused, _) => self.state.paused_remaining_ms.unwrap_or(0),
            (_, Some(end_at)) => end_at.saturating_sub(self.services.clock.now_ms()),
            (_, None) => 0,
        }
    }

    /// 0.0 ..= 100.0, exactly 100 once remaining reaches zero.
    pub fn progress_percent(&self) -> f64 {
        let duration = self.state.duration_ms;
        if duration <= 0 || self.state.end_at_epoch_ms.is_none() {
            return 0.0;
        }
        let remaining = self.remaining();
        if remaining <= 0 {
            return 100.0;
        }
        ((duration - remaining) as f64 / duration as f64 * 100.0).clamp(0.0, 100.0)
    }

    pub fn phase(&self) -> CountdownPhase {
        match self.state.status {
            CountdownStatus::Stopped => CountdownPhase::Idle,
            CountdownStatus::Paused => CountdownPhase::Paused,
            CountdownStatus::Running if self.remaining() <= 0 => CountdownPhase::Overtime,
            CountdownStatus::Running if self.state.warning_fired => CountdownPhase::Ending,
            CountdownStatus::Running => CountdownPhase::Counting,
        }
    }

    pub fn is_overtime(&self) -> bool {
        self.state.status != CountdownStatus::Stopped
            && self.state.end_at_epoch_ms.is_some()
            && self.remaining() <= 0
    }

    pub fn driver_task(&self) -> Option<TaskId> {
        self.task
    }

    /// Whether a tick fired by `task` belongs to the live countdown.
    pub fn accepts_tick(&self, task: TaskId) -> bool {
        self.task == Some(task)
    }

    pub fn settings(&self) -> &CountdownConfig {
        &self.settings
    }

    // ── Listeners ────────────────────────────────────────────────────

    /// Register a listener that survives every cleanup.
    pub fn add_system_listener(&mut self, kind: EventKind, listener: Listener) {
        self.listeners.add_system(kind, listener);
    }

    /// Register a caller listener. Dropped on the next `start` or `cleanup`.
    pub fn add_listener(&mut self, kind: EventKind, listener: Listener) -> ListenerId {
        self.listeners.add_transient(kind, listener)
    }

    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        self.listeners.remove_transient(id)
    }

    pub fn listeners(&self) -> &Listeners {
        &self.listeners
    }

    // ── Settings ─────────────────────────────────────────────────────

    /// Whether the host surface has focus. End notifications are only sent
    /// while it does not.
    pub fn set_host_focused(&mut self, focused: bool) {
        self.host_focused = focused;
    }

    pub fn set_end_message(&mut self, message: impl Into<String>) {
        self.end_message = message.into();
    }

    pub fn set_settings(&mut self, settings: CountdownConfig) {
        self.settings = settings;
    }

    pub fn set_policy(&mut self, policy: AlertPolicy) {
        self.policy = policy;
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Begin a new countdown, superseding any in flight.
    pub fn start(&mut self, duration_ms: i64, on_complete: Option<Box<dyn FnOnce()>>) {
        self.cancel_task();
        self.listeners.clear_transient();
        let now = self.services.clock.now_ms();
        self.state = CountdownState {
            status: CountdownStatus::Running,
            duration_ms,
            end_at_epoch_ms: Some(now.saturating_add(duration_ms)),
            ..CountdownState::default()
        };
        self.last_tick_secs = None;
        self.on_complete = on_complete;
        self.schedule_task();
        tracing::debug!(duration_ms, "countdown started");
        self.emit(CountdownEvent::Start { duration_ms });
    }

    pub fn pause(&mut self) -> bool {
        if self.state.status != CountdownStatus::Running {
            return false;
        }
        self.cancel_task();
        let remaining = self.remaining();
        self.state.paused_remaining_ms = Some(remaining);
        self.state.status = CountdownStatus::Paused;
        tracing::debug!(remaining_ms = remaining, "countdown paused");
        self.emit(CountdownEvent::Pause {
            remaining_ms: remaining,
        });
        true
    }

    /// Continue a paused countdown with the time it had left.
    pub fn resume(&mut self) -> bool {
        if self.state.status != CountdownStatus::Paused || self.state.end_at_epoch_ms.is_none() {
            return false;
        }
        let Some(remaining) = self.state.paused_remaining_ms.take() else {
            return false;
        };
        let now = self.services.clock.now_ms();
        self.state.end_at_epoch_ms = Some(now.saturating_add(remaining));
        self.state.status = CountdownStatus::Running;
        self.last_tick_secs = None;
        self.schedule_task();
        tracing::debug!(remaining_ms = remaining, "countdown resumed");
        self.emit(CountdownEvent::Start {
            duration_ms: remaining,
        });
        true
    }

    /// Stop and clear the end target. Safe from any state; only announces
    /// `Stop` when something was actually stopped.
    pub fn stop(&mut self) {
        self.cancel_task();
        self.on_complete = None;
        self.state.end_at_epoch_ms = None;
        self.state.paused_remaining_ms = None;
        if self.state.status == CountdownStatus::Stopped {
            return;
        }
        self.state.status = CountdownStatus::Stopped;
        tracing::debug!("countdown stopped");
        self.emit(CountdownEvent::Stop);
    }

    pub fn reset(&mut self) {
        self.stop();
        self.state = CountdownState::default();
        self.last_tick_secs = None;
        self.emit(CountdownEvent::Reset);
    }

    /// Stop and drop every transient listener.
    pub fn cleanup(&mut self) {
        self.stop();
        self.listeners.clear_transient();
    }

    /// Advance the countdown against the wall clock.
    ///
    /// Returns `Some(CountdownEvent::End)` on the tick that first reaches zero.
    pub fn tick(&mut self) -> Option<CountdownEvent> {
        if self.state.status != CountdownStatus::Running {
            return None;
        }
        let end_at = self.state.end_at_epoch_ms?;
        let now = self.services.clock.now_ms();
        let remaining = end_at - now;

        let secs = remaining.div_euclid(1000);
        if self.last_tick_secs != Some(secs) {
            self.last_tick_secs = Some(secs);
            self.emit(CountdownEvent::Tick {
                remaining_ms: remaining,
            });
        }

        let warning_window = self.state.duration_ms as f64 * self.settings.warning_fraction;
        if remaining > 0 && !self.state.warning_fired && remaining as f64 <= warning_window {
            self.state.warning_fired = true;
            self.play(AlertKind::Warning);
            self.emit(CountdownEvent::Warning {
                remaining_ms: remaining,
            });
        }

        if remaining > 0 {
            return None;
        }

        if !self.state.end_fired {
            self.state.end_fired = true;
            self.state.last_end_alert_at_epoch_ms = Some(now);
            self.play(AlertKind::End);
            if !self.host_focused && self.policy.notifications_enabled {
                let message = self.end_message.clone();
                self.services.notifier.notify(&message);
            }
            if let Some(callback) = self.on_complete.take() {
                callback();
            }
            tracing::info!(duration_ms = self.state.duration_ms, "countdown reached zero");
            self.emit(CountdownEvent::End);
            return Some(CountdownEvent::End);
        }

        let last = self.state.last_end_alert_at_epoch_ms.unwrap_or(now);
        if now - last >= self.settings.overtime_repeat_ms as i64 {
            self.state.last_end_alert_at_epoch_ms = Some(now);
            self.play(AlertKind::End);
            self.emit(CountdownEvent::OvertimeAlert {
                overtime_ms: -remaining,
            });
        }
        None
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn play(&mut self, kind: AlertKind) {
        if self.policy.enabled {
            let options = self.policy.options(kind);
            self.services.alerts.play_alert(kind, options);
        }
    }

    fn emit(&mut self, event: CountdownEvent) {
        self.listeners.emit(&event);
    }

    fn schedule_task(&mut self) {
        self.cancel_task();
        let period = Duration::from_millis(self.settings.tick_period_ms.max(1));
        self.task = Some(self.services.driver.schedule(period));
    }

    fn cancel_task(&mut self) {
        if let Some(task) = self.task.take() {
            self.services.driver.cancel(task);
        }
    }
}

impl Drop for CountdownEngine {
    fn drop(&mut self) {
        self.cancel_task();
    }
}

impl std::fmt::Debug for CountdownEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CountdownEngine")
            .field("state", &self.state)
            .field("task", &self.task)
            .field("listeners", &self.listeners)
            .finish_non_exhaustive()
    }
}
