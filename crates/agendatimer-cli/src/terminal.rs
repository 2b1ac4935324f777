//! Alert and notification services for a terminal host.

use std::io::Write;

use agendatimer_core::alerts::MAX_REPEAT_COUNT;
use agendatimer_core::{AlertKind, AlertOptions, AlertService, NotificationService};

/// Rings the terminal bell once per repeat.
///
/// A terminal has no way to space the bells out, so every repeat is written
/// at once and `repeat_interval_ms` is ignored. The repeat count is capped by
/// [`agendatimer_core::alerts::MAX_REPEAT_COUNT`].
#[derive(Debug, Default)]
pub struct TerminalBell;

impl AlertService for TerminalBell {
    fn play_alert(&mut self, kind: AlertKind, options: AlertOptions) {
        if options.volume == 0 {
            return;
        }
        tracing::debug!(?kind, volume = options.volume, repeats = options.repeat_count, "alert");
        let repeats = options.repeat_count.clamp(1, MAX_REPEAT_COUNT);
        let bells = "\x07".repeat(repeats as usize);
        let mut err = std::io::stderr();
        let _ = err.write_all(bells.as_bytes());
        let _ = err.flush();
    }
}

/// Prints notifications to stderr.
#[derive(Debug, Default)]
pub struct StderrNotifier;

impl NotificationService for StderrNotifier {
    fn notify(&mut self, message: &str) {
        let _ = writeln!(std::io::stderr(), "{message}");
    }
}
