//! Core domain models
//!
//! This module defines the project, its functions, image build plan and
//! secrets, and the pipeline graphs attached to it.

pub mod condition;
pub mod config;
pub mod context;
pub mod function;
pub mod image;
pub mod pipeline;
pub mod project;
pub mod secrets;
pub mod state;
pub mod step;

pub use condition::Guard;
pub use config::{ProjectConfig, WorkflowConfig};
pub use context::{ParamType, PipelineContext};
pub use function::{ExecutionKind, FunctionConfig, FunctionDescriptor, FunctionSource};
pub use image::{BuildRequest, BuildStage, ImageBuildSpec};
pub use pipeline::{ExecutionGraph, PipelineDefinition, PipelineError};
pub use project::{Project, ProjectDescriptor, ProjectError, WorkflowSpec};
pub use secrets::{MissingSecrets, SecretSet};
pub use state::{SetupState, SetupStatus};
pub use step::{InputValue, OutputBinding, StepDefinition};
