//! Project setup: option resolution and the setup sequence

pub mod engine;
pub mod resolve;

pub use engine::{EventHandler, SetupEngine, SetupEvent};
pub use resolve::{resolve_options, Resolved, ResolutionRule, SetupOptions};

use crate::core::{MissingSecrets, PipelineError, ProjectError};
use crate::platform::PlatformError;
use serde_json::Value;
use thiserror::Error;

/// Errors that abort a setup run
#[derive(Debug, Error)]
pub enum SetupError {
    #[error(transparent)]
    MissingSecrets(#[from] MissingSecrets),

    #[error("Image build failed for {image}")]
    ImageBuildFailed { image: String, log: Option<String> },

    #[error("Invalid value for parameter '{key}': expected {expected}, got {value}")]
    InvalidParam {
        key: String,
        expected: &'static str,
        value: Value,
    },

    #[error("Failed to load workflow '{workflow}' from {path}: {source}")]
    WorkflowLoad {
        workflow: String,
        path: String,
        #[source]
        source: PipelineError,
    },

    #[error(transparent)]
    Project(#[from] ProjectError),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("Failed to write project descriptor: {0}")]
    Io(#[from] std::io::Error),
}
