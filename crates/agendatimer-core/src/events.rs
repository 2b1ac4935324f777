use serde::{Deserialize, Serialize};

/// Everything the countdown engine announces.
///
/// Durations and remaining times are integer milliseconds. `remaining_ms`
/// goes negative once the countdown is in overtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CountdownEvent {
    /// A countdown began, or resumed with what was left.
    Start { duration_ms: i64 },
    /// Remaining time crossed into a new whole second.
    Tick { remaining_ms: i64 },
    /// Remaining time dropped into the warning window.
    Warning { remaining_ms: i64 },
    /// Remaining time reached zero for the first time.
    End,
    /// Still in overtime after another repeat interval.
    OvertimeAlert { overtime_ms: i64 },
    Pause { remaining_ms: i64 },
    Stop,
    /// Stopped and zeroed; displays should show 0.
    Reset,
}

impl CountdownEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            CountdownEvent::Start { .. } => EventKind::Start,
            CountdownEvent::Tick { .. } => EventKind::Tick,
            CountdownEvent::Warning { .. } => EventKind::Warning,
            CountdownEvent::End => EventKind::End,
            CountdownEvent::OvertimeAlert { .. } => EventKind::OvertimeAlert,
            CountdownEvent::Pause { .. } => EventKind::Pause,
            CountdownEvent::Stop => EventKind::Stop,
            CountdownEvent::Reset => EventKind::Reset,
        }
    }
}

/// Event name used to key listener registries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Start,
    Tick,
    Warning,
    End,
    OvertimeAlert,
    Pause,
    Stop,
    Reset,
}

impl EventKind {
    pub const ALL: [EventKind; 8] = [
        EventKind::Start,
        EventKind::Tick,
        EventKind::Warning,
        EventKind::End,
        EventKind::OvertimeAlert,
        EventKind::Pause,
        EventKind::Stop,
        EventKind::Reset,
    ];
}
