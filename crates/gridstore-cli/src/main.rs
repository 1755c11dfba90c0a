//! Gridstore CLI
//!
//! Command-line interface for replaying edit scripts against the storage kernel

use clap::{Parser, Subcommand};

mod commands;

#[derive(Debug, Parser)]
#[command(name = "gridstore")]
#[command(about = "Gridstore - grid puzzle storage and undo/redo kernel", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Replay a JSON edit script and print the resulting stores and history
    Replay(commands::replay::ReplayArgs),
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Replay(args) => commands::replay::execute(args),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
