//! Ad hoc countdown lengths for when no block is queued.

use chrono::{DateTime, Duration, NaiveTime, TimeZone};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ManualDuration {
    /// Count down a fixed span.
    Span { hours: u32, minutes: u32, seconds: u32 },
    /// Count down until a wall-clock time. A time not after now means
    /// that time tomorrow.
    Until(NaiveTime),
}

impl ManualDuration {
    pub fn from_ms(ms: u64) -> Self {
        let total_secs = ms / 1000;
        Self::Span {
            hours: (total_secs / 3600) as u32,
            minutes: ((total_secs % 3600) / 60) as u32,
            seconds: (total_secs % 60) as u32,
        }
    }

    /// Parse `HH:MM` or `HH:MM:SS`.
    pub fn parse_until(text: &str) -> Result<Self> {
        let text = text.trim();
        NaiveTime::parse_from_str(text, "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M"))
            .map(Self::Until)
            .map_err(|_| ValidationError::MalformedEndTime(text.to_string()).into())
    }

    /// Milliseconds from `now` until this countdown should end.
    pub fn resolve_ms<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Result<i64> {
        let ms = match *self {
            Self::Span {
                hours,
                minutes,
                seconds,
            } => (i64::from(hours) * 3600 + i64::from(minutes) * 60 + i64::from(seconds)) * 1000,
            Self::Until(time) => {
                let today = now.date_naive().and_time(time);
                let mut target = now
                    .timezone()
                    .from_local_datetime(&today)
                    .earliest()
                    .ok_or_else(|| ValidationError::MalformedEndTime(time.to_string()))?;
                if target <= *now {
                    target = target + Duration::days(1);
                }
                (target - now.clone()).num_milliseconds()
            }
        };
        if ms <= 0 {
            return Err(ValidationError::NonPositiveDuration { duration_ms: ms }.into());
        }
        Ok(ms)
    }
}
