use agendatimer_core::{format_remaining, Block, SessionSummary};
use chrono::Utc;
use serde::Serialize;

use super::{offline_session, CmdResult};

#[derive(Serialize)]
struct StatusReport<'a> {
    active_index: Option<usize>,
    next_index: Option<usize>,
    blocks: &'a [Block],
    summary: SessionSummary,
    remaining_text: String,
}

pub fn run() -> CmdResult {
    let session = offline_session()?;
    let queue = session.queue();
    let summary = session.summary(Utc::now());
    let report = StatusReport {
        active_index: queue.current_index(),
        next_index: queue.peek_next(),
        blocks: queue.all(),
        remaining_text: format_remaining(summary.remaining_ms),
        summary,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
