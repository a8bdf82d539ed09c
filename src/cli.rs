use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Command-line interface for the appointment finder.
/// Exit codes: 0=success or clean shutdown, 1=unrecoverable error, 2=configuration or startup failure
#[derive(Parser, Debug)]
#[command(name = "appointment-finder")]
#[command(about = "Watches an appointment booking site for earlier open slots")]
#[command(version)]
pub struct Cli {
    #[arg(short, long, global = true, help = "Configuration file (replaces the config/ directory lookup)")]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true, help = "Parameters document (overrides store.path)")]
    pub params: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// Run cycles forever with the configured pause between them.
    Run,

    /// Run exactly one cycle and exit.
    Once,

    /// Print the current scan state with credentials masked.
    Status,

    /// Move every checked key back to pending.
    Recycle,

    /// Forget the recorded best result.
    ResetBest,

    /// Write a template parameters document if none exists.
    Init,

    /// Send a sample event through the configured notifiers.
    TestNotify,
}

impl Cli {
    pub fn command(&self) -> Commands {
        self.command.unwrap_or(Commands::Run)
    }
}
