use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod file_mirror;
mod terminal;

#[derive(Parser)]
#[command(name = "agendatimer", version, about = "Agenda countdown timer")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Agenda block management
    Block {
        #[command(subcommand)]
        action: commands::block::BlockAction,
    },
    /// Run the agenda in the foreground
    Run(commands::run::RunArgs),
    /// Print the queue and a time summary as JSON
    Status,
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn main() {
    // stdout carries command output; diagnostics go to stderr.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .try_init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Block { action } => commands::block::run(action),
        Commands::Run(args) => commands::run::run(args),
        Commands::Status => commands::status::run(),
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
