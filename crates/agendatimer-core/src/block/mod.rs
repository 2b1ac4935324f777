//! Agenda blocks and the ordered queue that rotates through them.

mod queue;

pub use queue::{BlockQueue, QueueSummary};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One timed segment of an agenda.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub id: String,
    #[serde(default)]
    pub title: String,
    /// Planned length in minutes, two-decimal precision.
    pub duration_minutes: f64,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub is_done: bool,
}

impl Block {
    pub fn new(title: impl Into<String>, duration_minutes: f64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            duration_minutes: round_minutes(duration_minutes),
            is_active: false,
            is_done: false,
        }
    }

    /// Planned length in whole milliseconds.
    ///
    /// Stored blocks may carry any value, so the minutes are clamped again here.
    pub fn duration_ms(&self) -> i64 {
        (round_minutes(self.duration_minutes) * 60_000.0).round() as i64
    }
}

/// Longest block, about 19 years. Epoch milliseconds plus this still fit in
/// an `i64` and in a chrono timestamp.
pub const MAX_DURATION_MINUTES: f64 = 10_000_000.0;

/// Clamp a minute value to two decimals within `0..=MAX_DURATION_MINUTES`.
/// Negative and non-finite input becomes zero; a zero-length block is
/// rejected when it is started.
pub fn round_minutes(minutes: f64) -> f64 {
    if !minutes.is_finite() || minutes <= 0.0 {
        return 0.0;
    }
    ((minutes * 100.0).round() / 100.0).min(MAX_DURATION_MINUTES)
}

/// Convert a millisecond span to block minutes.
pub fn minutes_from_ms(ms: i64) -> f64 {
    round_minutes(ms as f64 / 60_000.0)
}
