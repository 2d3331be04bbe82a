//! CLI command definitions

use crate::core::context::parse_argument_value;
use clap::Args;
use serde_json::Value;

/// Set up a project
#[derive(Debug, Args, Clone)]
pub struct SetupCommand {
    /// Path to project YAML file
    #[arg(short, long)]
    pub file: String,

    /// Project parameter overrides (key=value)
    #[arg(long, value_parser = parse_key_value)]
    pub param: Vec<(String, Value)>,

    /// Context directory for workflow files and the written project.yaml
    /// (defaults to the project file's directory)
    #[arg(long)]
    pub context: Option<String>,

    /// Platform API endpoint (defaults to $MLRUN_DBPATH)
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Platform access token (defaults to $MLRUN_AUTH_TOKEN)
    #[arg(long)]
    pub token: Option<String>,

    /// Log platform calls instead of sending them
    #[arg(long)]
    pub dry_run: bool,

    /// Don't write project.yaml into the context directory
    #[arg(long)]
    pub no_save: bool,

    /// Don't save the run to history
    #[arg(long)]
    pub no_history: bool,
}

/// Validate a project configuration
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to project YAML file
    #[arg(short, long)]
    pub file: String,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Show the resolved graph of a workflow
#[derive(Debug, Args, Clone)]
pub struct GraphCommand {
    /// Path to project YAML file
    #[arg(short, long)]
    pub file: String,

    /// Workflow name (defaults to the first workflow)
    #[arg(short, long)]
    pub workflow: Option<String>,

    /// Workflow arguments (key=value)
    #[arg(long, value_parser = parse_key_value)]
    pub arg: Vec<(String, Value)>,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Show setup history
#[derive(Debug, Args, Clone)]
pub struct HistoryCommand {
    /// Project name to filter by
    #[arg(short, long)]
    pub project: Option<String>,

    /// Number of recent runs to show
    #[arg(short, long, default_value_t = 10)]
    pub limit: usize,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,

    /// Show a specific run
    #[arg(long)]
    pub run_id: Option<String>,
}

/// Parse key=value pairs; the value is read as a YAML scalar
pub fn parse_key_value(s: &str) -> Result<(String, Value), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), parse_argument_value(value)))
        }
        _ => Err(format!("Invalid key=value pair: {}", s)),
    }
}
