// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `undoable`: the daemon-lifecycle subset of the CLI surface (spec §6
//! "CLI surface (daemon subcommands)"). Instruction submission, plan
//! inspection, and interactive wizards are out-of-scope external
//! collaborators (spec §1) and are not implemented here.

mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "undoable", about = "Undoable daemon control")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Manage the undoabled daemon process.
    Daemon {
        #[command(subcommand)]
        command: commands::daemon::DaemonCommand,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let result = match cli.command {
        Command::Daemon { command } => commands::daemon::run(command).await,
    };

    match result {
        Ok(()) => std::process::exit(0),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(1);
        }
    }
}
