//! Audible alert and desktop notification collaborators.
//!
//! Both are fire-and-forget. Implementations swallow their own failures.

use serde::{Deserialize, Serialize};

use crate::storage::AlertsConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    Warning,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertOptions {
    /// 0..=100
    pub volume: u32,
    pub repeat_count: u32,
    pub repeat_interval_ms: u64,
}

pub trait AlertService {
    fn play_alert(&mut self, kind: AlertKind, options: AlertOptions);
}

pub trait NotificationService {
    fn notify(&mut self, message: &str);
}

/// Most repeats a single alert may ask for.
pub const MAX_REPEAT_COUNT: u32 = 10;

/// Alert policy derived from configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlertPolicy {
    pub enabled: bool,
    pub warning: AlertOptions,
    pub end: AlertOptions,
    pub notifications_enabled: bool,
}

impl AlertPolicy {
    pub fn from_config(alerts: &AlertsConfig, notifications_enabled: bool) -> Self {
        let volume = alerts.volume.min(100);
        Self {
            enabled: alerts.enabled,
            warning: AlertOptions {
                volume,
                repeat_count: alerts.warning_repeat_count.min(MAX_REPEAT_COUNT),
                repeat_interval_ms: alerts.repeat_interval_ms,
            },
            end: AlertOptions {
                volume,
                repeat_count: alerts.end_repeat_count.min(MAX_REPEAT_COUNT),
                repeat_interval_ms: alerts.repeat_interval_ms,
            },
            notifications_enabled,
        }
    }

    pub fn options(&self, kind: AlertKind) -> AlertOptions {
        match kind {
            AlertKind::Warning => self.warning,
            AlertKind::End => self.end,
        }
    }
}

impl Default for AlertPolicy {
    fn default() -> Self {
        Self::from_config(&AlertsConfig::default(), true)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SilentAlerts;

impl AlertService for SilentAlerts {
    fn play_alert(&mut self, _kind: AlertKind, _options: AlertOptions) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoNotifications;

impl NotificationService for NoNotifications {
    fn notify(&mut self, _message: &str) {}
}
