//! Periodic tick sources.
//!
//! A driver owns repeating tasks; the engine owns at most one [`TaskId`] at a
//! time and cancels it before scheduling another. The driver never calls into
//! the engine. Hosts deliver each fired id back through
//! `CountdownEngine::accepts_tick` so late ticks from a cancelled task are
//! dropped.

use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::rc::Rc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(pub u64);

/// A cancellable repeating task scheduler.
pub trait TickDriver {
    fn schedule(&mut self, period: Duration) -> TaskId;
    fn cancel(&mut self, task: TaskId);
}

/// Tokio-backed driver. Each scheduled task sends its id on the channel
/// returned from [`TokioDriver::new`] once per period.
///
/// Must be used from inside a tokio runtime.
pub struct TokioDriver {
    tx: mpsc::UnboundedSender<TaskId>,
    tasks: HashMap<TaskId, JoinHandle<()>>,
    next_id: u64,
}

impl TokioDriver {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TaskId>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let driver = Self {
            tx,
            tasks: HashMap::new(),
            next_id: 1,
        };
        (driver, rx)
    }

    pub fn live_tasks(&self) -> usize {
        self.tasks.len()
    }
}

impl TickDriver for TokioDriver {
    fn schedule(&mut self, period: Duration) -> TaskId {
        let id = TaskId(self.next_id);
        self.next_id += 1;
        let tx = self.tx.clone();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The first tick completes immediately.
            interval.tick().await;
            loop {
                interval.tick().await;
                if tx.send(id).is_err() {
                    break;
                }
            }
        });
        self.tasks.insert(id, handle);
        id
    }

    fn cancel(&mut self, task: TaskId) {
        if let Some(handle) = self.tasks.remove(&task) {
            handle.abort();
        }
    }
}

impl Drop for TokioDriver {
    fn drop(&mut self) {
        for (_, handle) in self.tasks.drain() {
            handle.abort();
        }
    }
}

#[derive(Debug, Default)]
struct ManualDriverState {
    next_id: u64,
    live: BTreeSet<TaskId>,
    scheduled: u64,
    cancelled: u64,
    period: Option<Duration>,
}

/// Driver that records tasks without running them. The host calls
/// `engine.tick()` itself. Clones share state so a test can keep a handle
/// while the engine owns the boxed driver.
#[derive(Debug, Clone, Default)]
pub struct ManualDriver {
    state: Rc<RefCell<ManualDriverState>>,
}

impl ManualDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn live_tasks(&self) -> Vec<TaskId> {
        self.state.borrow().live.iter().copied().collect()
    }

    pub fn scheduled_count(&self) -> u64 {
        self.state.borrow().scheduled
    }

    pub fn cancelled_count(&self) -> u64 {
        self.state.borrow().cancelled
    }

    pub fn last_period(&self) -> Option<Duration> {
        self.state.borrow().period
    }
}

impl TickDriver for ManualDriver {
    fn schedule(&mut self, period: Duration) -> TaskId {
        let mut state = self.state.borrow_mut();
        state.next_id += 1;
        let id = TaskId(state.next_id);
        state.live.insert(id);
        state.scheduled += 1;
        state.period = Some(period);
        id
    }

    fn cancel(&mut self, task: TaskId) {
        let mut state = self.state.borrow_mut();
        if state.live.remove(&task) {
            state.cancelled += 1;
        }
    }
}
