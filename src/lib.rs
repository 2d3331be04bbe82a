//! mlsetup - project setup for MLRun-style orchestration platforms

pub mod cli;
pub mod core;
pub mod persistence;
pub mod platform;
pub mod setup;

// Re-export commonly used types
pub use core::{PipelineDefinition, Project, ProjectConfig, SecretSet, SetupState, SetupStatus};
pub use platform::{DryRunPlatform, HttpPlatform, Platform, PlatformClientConfig, PlatformError};
pub use setup::{SetupEngine, SetupError, SetupEvent};
