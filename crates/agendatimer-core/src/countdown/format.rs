/// Render remaining time as `M:SS`, or `H:MM:SS` past an hour.
///
/// Overtime gets a leading `-`. Seconds are floored on the magnitude so the
/// display reads `-0:01` one second into overtime.
pub fn format_remaining(remaining_ms: i64) -> String {
    let sign = if remaining_ms < 0 { "-" } else { "" };
    let total_secs = remaining_ms.unsigned_abs() / 1000;
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    if hours > 0 {
        format!("{sign}{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{sign}{minutes}:{seconds:02}")
    }
}
