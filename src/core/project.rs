//! Project domain model and its serialized descriptor

use crate::core::{
    config::{normalize_path, ProjectConfig, WorkflowConfig},
    function::FunctionDescriptor,
    image::BuildRequest,
    pipeline::{PipelineDefinition, PipelineError},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

/// File name the descriptor is written to inside the context directory
pub const PROJECT_FILE: &str = "project.yaml";

/// Errors raised while assembling a project
#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("Workflow '{name}' is already attached")]
    DuplicateWorkflowName { name: String },

    #[error("Workflow path '{path}' is already used by '{existing}'")]
    DuplicateWorkflowPath { path: String, existing: String },

    #[error("Workflow '{workflow}': {source}")]
    InvalidWorkflow {
        workflow: String,
        #[source]
        source: PipelineError,
    },
}

/// Project source repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSource {
    pub url: String,
    /// Whether runs pull the source themselves instead of using the image
    pub pull_at_runtime: bool,
}

/// Workflow attached to the project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowSpec {
    pub name: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub engine: String,
    /// Parsed pipeline (not part of the descriptor)
    #[serde(skip)]
    pub definition: Option<PipelineDefinition>,
}

impl WorkflowSpec {
    pub fn from_config(config: &WorkflowConfig, definition: PipelineDefinition) -> Self {
        Self {
            name: config.name.clone(),
            path: config.path.clone(),
            image: config.image.clone(),
            engine: config.engine.clone(),
            definition: Some(definition),
        }
    }
}

/// Build recorded on the project after a successful image build
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildSpec {
    pub image: String,
    pub base_image: String,
    pub commands: Vec<String>,
}

impl From<&BuildRequest> for BuildSpec {
    fn from(request: &BuildRequest) -> Self {
        Self {
            image: request.image.clone(),
            base_image: request.base_image.clone(),
            commands: request.commands.clone(),
        }
    }
}

/// A project being assembled
#[derive(Debug, Clone, PartialEq)]
pub struct Project {
    pub name: String,
    pub description: Option<String>,
    pub params: BTreeMap<String, Value>,
    pub source: Option<ProjectSource>,
    pub default_image: Option<String>,
    pub build: Option<BuildSpec>,
    /// Registered functions, in registration order
    pub functions: Vec<FunctionDescriptor>,
    pub workflows: Vec<WorkflowSpec>,
    /// Names of the secrets stored for the project
    pub secret_keys: Vec<String>,
}

impl Project {
    /// Create an empty project
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            params: BTreeMap::new(),
            source: None,
            default_image: None,
            build: None,
            functions: Vec::new(),
            workflows: Vec::new(),
            secret_keys: Vec::new(),
        }
    }

    /// Create a project carrying the name, description and parameters of a config
    pub fn from_config(config: &ProjectConfig) -> Self {
        let mut project = Self::new(config.name.clone());
        project.description = config.description.clone();
        project.params = config.params.clone();
        project
    }

    pub fn set_source(&mut self, url: impl Into<String>, pull_at_runtime: bool) {
        self.source = Some(ProjectSource {
            url: url.into(),
            pull_at_runtime,
        });
    }

    pub fn set_default_image(&mut self, image: impl Into<String>) {
        self.default_image = Some(image.into());
    }

    /// Record a finished image build.
    ///
    /// With `overwrite_build_params` the build spec replaces the stored one;
    /// otherwise its commands are appended to the stored commands. With
    /// `set_as_default` the image becomes the project default.
    pub fn apply_build(&mut self, request: &BuildRequest) {
        let build = match self.build.take() {
            Some(mut existing) if !request.overwrite_build_params => {
                existing.image = request.image.clone();
                existing.base_image = request.base_image.clone();
                for command in &request.commands {
                    if !existing.commands.contains(command) {
                        existing.commands.push(command.clone());
                    }
                }
                existing
            }
            _ => BuildSpec::from(request),
        };
        self.build = Some(build);

        if request.set_as_default {
            self.set_default_image(request.image.clone());
        }
    }

    /// Register a function; an existing registration with the same name is replaced
    pub fn set_function(&mut self, function: FunctionDescriptor) -> Option<FunctionDescriptor> {
        match self.functions.iter_mut().find(|f| f.name == function.name) {
            Some(existing) => {
                warn!("Function '{}' registered again, overwriting", function.name);
                Some(std::mem::replace(existing, function))
            }
            None => {
                self.functions.push(function);
                None
            }
        }
    }

    /// Get a function by name
    pub fn function(&self, name: &str) -> Option<&FunctionDescriptor> {
        self.functions.iter().find(|f| f.name == name)
    }

    /// Get a workflow by name
    pub fn workflow(&self, name: &str) -> Option<&WorkflowSpec> {
        self.workflows.iter().find(|w| w.name == name)
    }

    /// Attach a workflow.
    ///
    /// Every step must call a function already registered in the project,
    /// and neither the workflow name nor its file may already be attached.
    pub fn set_workflow(&mut self, workflow: WorkflowSpec) -> Result<(), ProjectError> {
        if self.workflow(&workflow.name).is_some() {
            return Err(ProjectError::DuplicateWorkflowName {
                name: workflow.name,
            });
        }

        let path = normalize_path(&workflow.path);
        if let Some(existing) = self
            .workflows
            .iter()
            .find(|w| normalize_path(&w.path) == path)
        {
            return Err(ProjectError::DuplicateWorkflowPath {
                path: workflow.path,
                existing: existing.name.clone(),
            });
        }

        if let Some(definition) = &workflow.definition {
            definition
                .check_functions(|name| self.function(name).is_some())
                .map_err(|source| ProjectError::InvalidWorkflow {
                    workflow: workflow.name.clone(),
                    source,
                })?;
        }

        self.workflows.push(workflow);
        Ok(())
    }

    /// Serializable descriptor of the project
    pub fn to_descriptor(&self) -> ProjectDescriptor {
        ProjectDescriptor {
            kind: "project".to_string(),
            metadata: ProjectMetadata {
                name: self.name.clone(),
            },
            spec: ProjectSpec {
                description: self.description.clone(),
                params: self.params.clone(),
                source: self.source.as_ref().map(|s| s.url.clone()),
                load_source_on_run: self.source.as_ref().map(|s| s.pull_at_runtime),
                default_image: self.default_image.clone(),
                build: self.build.clone(),
                functions: self.functions.clone(),
                workflows: self.workflows.clone(),
                secret_keys: self.secret_keys.clone(),
            },
        }
    }

    /// Descriptor as YAML
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(&self.to_descriptor())
    }

    /// Write the descriptor to `<dir>/project.yaml`
    pub fn save_to(&self, dir: &Path) -> std::io::Result<PathBuf> {
        let yaml = self
            .to_yaml()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        let path = dir.join(PROJECT_FILE);
        std::fs::write(&path, yaml)?;
        Ok(path)
    }
}

/// Project descriptor in the platform's `kind: project` layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectDescriptor {
    pub kind: String,
    pub metadata: ProjectMetadata,
    pub spec: ProjectSpec,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectMetadata {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub params: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_source_on_run: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<BuildSpec>,
    #[serde(default)]
    pub functions: Vec<FunctionDescriptor>,
    #[serde(default)]
    pub workflows: Vec<WorkflowSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub secret_keys: Vec<String>,
}
