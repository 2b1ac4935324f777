use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

use agendatimer_core::mirror::{MirrorSurface, NoMirror};
use agendatimer_core::{
    format_remaining, Config, CountdownEvent, Database, EngineServices, EventKind,
    ManualDuration, SessionController, SystemClock, TokioDriver,
};
use clap::Args;
use tokio::io::{AsyncBufReadExt, BufReader};

use super::CmdResult;
use crate::file_mirror::FileMirror;
use crate::terminal::{StderrNotifier, TerminalBell};

#[derive(Args)]
pub struct RunArgs {
    /// Hours for a manual countdown, used when no unfinished block is queued
    #[arg(long)]
    hours: Option<u32>,
    #[arg(long)]
    minutes: Option<u32>,
    #[arg(long)]
    seconds: Option<u32>,
    /// Count down until a wall-clock time (HH:MM or HH:MM:SS)
    #[arg(long, conflicts_with_all = ["hours", "minutes", "seconds"])]
    until: Option<String>,
    /// Start again from the first unfinished block
    #[arg(long)]
    restart: bool,
    /// Write the mirror display to this file as JSON
    #[arg(long)]
    mirror_file: Option<PathBuf>,
}

impl RunArgs {
    fn manual(&self) -> agendatimer_core::Result<Option<ManualDuration>> {
        if let Some(until) = &self.until {
            return ManualDuration::parse_until(until).map(Some);
        }
        if self.hours.is_none() && self.minutes.is_none() && self.seconds.is_none() {
            return Ok(None);
        }
        Ok(Some(ManualDuration::Span {
            hours: self.hours.unwrap_or(0),
            minutes: self.minutes.unwrap_or(0),
            seconds: self.seconds.unwrap_or(0),
        }))
    }
}

const HELP: &str = "commands: p = pause/resume, n = next, b = back, s = stop, q = quit";

pub fn run(args: RunArgs) -> CmdResult {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let result = match args.mirror_file.clone() {
        Some(path) => runtime.block_on(drive(args, FileMirror::new(path))),
        None => runtime.block_on(drive(args, NoMirror)),
    };
    // The stdin reader sits on a blocking thread that never returns on its own.
    runtime.shutdown_background();
    result
}

async fn drive<S: MirrorSurface>(args: RunArgs, surface: S) -> CmdResult {
    let manual = args.manual()?;
    let config = Config::load()?;
    let db = Database::open()?;
    let (driver, mut ticks) = TokioDriver::new();
    let services = EngineServices {
        clock: Box::new(SystemClock),
        driver: Box::new(driver),
        alerts: Box::new(TerminalBell),
        notifier: Box::new(StderrNotifier),
    };
    let mut session = SessionController::new(Box::new(db), services, &config, surface);

    // A terminal cannot tell whether it has focus.
    session.engine_mut().set_host_focused(false);
    let events = Rc::new(RefCell::new(Vec::new()));
    for kind in EventKind::ALL {
        let events = events.clone();
        session
            .engine_mut()
            .add_system_listener(kind, Box::new(move |event| events.borrow_mut().push(event.clone())));
    }

    if args.restart {
        session.restart_from_beginning(manual)?;
    } else {
        session.start(manual)?;
    }
    if args.mirror_file.is_some() && !session.open_mirror() {
        tracing::warn!("mirror file unavailable, continuing without it");
    }
    eprintln!("{HELP}");
    print_events(&events)?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            Some(task) = ticks.recv() => {
                session.tick_from(task);
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match line.trim() {
                    "p" => {
                        session.toggle_pause();
                    }
                    "n" => {
                        session.next_block();
                    }
                    "b" => {
                        session.previous_block();
                    }
                    "s" => session.stop(),
                    "q" => break,
                    "" => {}
                    other => eprintln!("unknown command: {other}\n{HELP}"),
                }
            }
        }
        print_events(&events)?;
    }

    session.stop();
    session.close_mirror();
    print_events(&events)?;
    Ok(())
}

/// One JSON line per event, with the display text for time-bearing events.
fn print_events(events: &Rc<RefCell<Vec<CountdownEvent>>>) -> CmdResult {
    for event in events.borrow_mut().drain(..) {
        let mut line = serde_json::to_value(&event)?;
        let display = match event {
            CountdownEvent::Start { duration_ms } => Some(duration_ms),
            CountdownEvent::Tick { remaining_ms }
            | CountdownEvent::Warning { remaining_ms }
            | CountdownEvent::Pause { remaining_ms } => Some(remaining_ms),
            CountdownEvent::OvertimeAlert { overtime_ms } => Some(-overtime_ms),
            _ => None,
        };
        if let (Some(ms), Some(obj)) = (display, line.as_object_mut()) {
            obj.insert("display".into(), format_remaining(ms).into());
        }
        println!("{line}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Wrapper {
        #[command(flatten)]
        args: RunArgs,
    }

    fn parse(argv: &[&str]) -> RunArgs {
        Wrapper::try_parse_from(std::iter::once("run").chain(argv.iter().copied()))
            .unwrap()
            .args
    }

    #[test]
    fn no_flags_means_no_manual_duration() {
        assert_eq!(parse(&[]).manual().unwrap(), None);
    }

    #[test]
    fn span_flags_fill_missing_parts_with_zero() {
        assert_eq!(
            parse(&["--minutes", "5"]).manual().unwrap(),
            Some(ManualDuration::Span {
                hours: 0,
                minutes: 5,
                seconds: 0
            })
        );
    }

    #[test]
    fn until_is_parsed() {
        let manual = parse(&["--until", "17:30"]).manual().unwrap();
        assert!(matches!(manual, Some(ManualDuration::Until(_))));
    }

    #[test]
    fn until_conflicts_with_span() {
        let result = Wrapper::try_parse_from(["run", "--until", "17:30", "--minutes", "5"]);
        assert!(result.is_err());
    }

    #[test]
    fn malformed_until_is_an_error() {
        assert!(parse(&["--until", "soon"]).manual().is_err());
    }
}
