use clap::Subcommand;

use super::{offline_session, CmdResult};

#[derive(Subcommand)]
pub enum BlockAction {
    /// Append a block to the agenda
    Add {
        /// Block title
        title: String,
        /// Planned length in minutes
        #[arg(long, short)]
        minutes: f64,
    },
    /// List blocks
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Change a block's title and length
    Update {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long, short)]
        minutes: Option<f64>,
    },
    /// Remove a block
    Remove { id: String },
    /// Mark a block done
    Done { id: String },
    /// Mark a block not done
    Undone { id: String },
    /// Flip a block's done flag
    Toggle { id: String },
    /// Select the block at a position (0-based). Done blocks redirect to the next unfinished one.
    Activate { index: usize },
    /// Select the next unfinished block
    Next,
    /// Select the previous unfinished block
    Prev,
    /// Move a block to another position
    Move { from: usize, to: usize },
    /// Remove every block
    Clear,
}

fn not_found(id: &str) -> Box<dyn std::error::Error> {
    format!("block not found: {id}").into()
}

pub fn run(action: BlockAction) -> CmdResult {
    let mut session = offline_session()?;

    match action {
        BlockAction::Add { title, minutes } => {
            let id = session.add_block(&title, minutes);
            println!("{id}");
        }
        BlockAction::List { json } => {
            let blocks = session.queue().all();
            if json {
                println!("{}", serde_json::to_string_pretty(blocks)?);
            } else if blocks.is_empty() {
                println!("No blocks.");
            } else {
                for (i, block) in blocks.iter().enumerate() {
                    let marker = if block.is_active { '>' } else { ' ' };
                    let check = if block.is_done { 'x' } else { ' ' };
                    println!(
                        "{marker} {i:>2} [{check}] {:>7.2} min  {}  ({})",
                        block.duration_minutes, block.title, block.id
                    );
                }
            }
        }
        BlockAction::Update { id, title, minutes } => {
            let current = session.queue().get(&id).cloned().ok_or_else(|| not_found(&id))?;
            let title = title.unwrap_or(current.title);
            let minutes = minutes.unwrap_or(current.duration_minutes);
            session.update_block(&id, &title, minutes);
            println!("ok");
        }
        BlockAction::Remove { id } => {
            if !session.remove_block(&id) {
                return Err(not_found(&id));
            }
            println!("ok");
        }
        BlockAction::Done { id } => {
            if !session.edit_queue(|q| q.mark_done(&id)) {
                return Err(not_found(&id));
            }
            println!("ok");
        }
        BlockAction::Undone { id } => {
            if !session.edit_queue(|q| q.mark_not_done(&id)) {
                return Err(not_found(&id));
            }
            println!("ok");
        }
        BlockAction::Toggle { id } => {
            if !session.toggle_done(&id) {
                return Err(not_found(&id));
            }
            println!("ok");
        }
        BlockAction::Activate { index } => print_selection(session.set_active(index)),
        BlockAction::Next => print_selection(session.next_block()),
        BlockAction::Prev => print_selection(session.previous_block()),
        BlockAction::Move { from, to } => {
            if !session.edit_queue(|q| q.move_block(from, to)) {
                return Err(format!("invalid move: {from} -> {to}").into());
            }
            println!("ok");
        }
        BlockAction::Clear => {
            session.edit_queue(|q| q.clear());
            println!("ok");
        }
    }
    Ok(())
}

fn print_selection(index: Option<usize>) {
    match index {
        Some(i) => println!("{i}"),
        None => println!("no unfinished block"),
    }
}
