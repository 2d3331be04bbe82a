//! Command-line interface

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use commands::{GraphCommand, HistoryCommand, SetupCommand, ValidateCommand};
use std::ffi::OsString;

/// Project setup for MLRun-style orchestration platforms
#[derive(Debug, Parser, Clone)]
#[command(name = "mlsetup")]
#[command(version)]
#[command(about = "Set up an ML project: image, secrets, functions and workflows", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Set up a project on the platform
    Setup(SetupCommand),

    /// Validate a project file and its workflows
    Validate(ValidateCommand),

    /// Show the steps a workflow runs for given arguments
    Graph(GraphCommand),

    /// Show setup history
    History(HistoryCommand),
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }
}
