//! CLI definition and command handling

pub mod commands;

use clap::{Parser, Subcommand};

use commands::PublishCommand;

/// Gantry - Google Play publishing CLI
#[derive(Debug, Parser)]
#[command(name = "gantry")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output format
    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Output format for CLI
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output
    #[default]
    Text,
    /// JSON output
    Json,
}

/// Available commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Publish artifacts to Google Play
    Publish(PublishCommand),
}

impl Cli {
    /// Execute the CLI command, returning the process exit code.
    pub fn execute(self) -> i32 {
        match self.command {
            Commands::Publish(ref cmd) => cmd.execute(&self),
        }
    }
}
