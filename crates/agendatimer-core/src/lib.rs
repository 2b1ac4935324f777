//! # Agendatimer Core Library
//!
//! Core logic for running an agenda as a chain of timed blocks: a live
//! countdown per block, warning and end alerts, automatic advance to the next
//! unfinished block, and a mirror display kept in sync with minimal pushes.
//! The `agendatimer` CLI is a thin shell over this crate.
//!
//! ## Architecture
//!
//! - **Block Queue**: ordered blocks with skip-aware wraparound rotation
//! - **Countdown Engine**: a wall-clock-based state machine ticked by an
//!   external, cancellable periodic driver
//! - **Mirror Sync**: decides between full repaint, leaf patch, or nothing
//! - **Session Controller**: chains countdowns over the queue
//! - **Storage**: SQLite key-value persistence and TOML configuration
//!
//! Everything runs on one logical thread. Collaborators (clock, driver,
//! alerts, notifications, mirror surface, block store) are injected.

pub mod alerts;
pub mod block;
pub mod countdown;
pub mod error;
pub mod events;
pub mod mirror;
pub mod session;
pub mod storage;

pub use alerts::{AlertKind, AlertOptions, AlertPolicy, AlertService, NotificationService};
pub use block::{Block, BlockQueue, QueueSummary};
pub use countdown::{
    format_remaining, Clock, CountdownEngine, CountdownPhase, CountdownStatus, EngineServices,
    SystemClock, TickDriver, TokioDriver,
};
pub use error::{ConfigError, CoreError, DatabaseError, Result, ValidationError};
pub use events::{CountdownEvent, EventKind};
pub use mirror::{MirrorAction, MirrorSnapshot, MirrorSurface, MirrorSync};
pub use session::{ManualDuration, SessionController, SessionSummary};
pub use storage::{BlockStore, Config, Database};
