//! Project configuration from YAML

use crate::core::{
    function::FunctionConfig,
    image::ImageBuildSpec,
    secrets::default_required_secrets,
};
use anyhow::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// DNS-1123 label, the naming rule for projects, functions and workflows
static NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?$").expect("static regex"));

const MAX_NAME_LEN: usize = 63;

/// Check a project, function or workflow name
pub fn is_valid_name(name: &str) -> bool {
    name.len() <= MAX_NAME_LEN && NAME_PATTERN.is_match(name)
}

/// Top-level project configuration loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Project name
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    /// Project parameters (`source`, `default_image`, `build_image`, ...)
    #[serde(default)]
    pub params: BTreeMap<String, Value>,

    /// Environment variables that must be stored as project secrets
    #[serde(default = "default_required_secrets")]
    pub secrets: Vec<String>,

    /// Image build plan; the built-in plan is used when absent
    #[serde(default)]
    pub build: Option<ImageBuildSpec>,

    /// Functions to register
    #[serde(default)]
    pub functions: Vec<FunctionConfig>,

    /// Workflows to attach
    #[serde(default)]
    pub workflows: Vec<WorkflowConfig>,
}

/// Workflow entry in the project file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkflowConfig {
    /// Workflow name
    pub name: String,

    /// Pipeline file, relative to the project directory
    pub path: String,

    /// Image to run the workflow with
    #[serde(default)]
    pub image: Option<String>,

    /// Scheduler engine
    #[serde(default = "default_engine")]
    pub engine: String,
}

fn default_engine() -> String {
    "kfp".to_string()
}

impl ProjectConfig {
    /// Load project configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse project configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: ProjectConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the project configuration
    pub fn validate(&self) -> Result<()> {
        if !is_valid_name(&self.name) {
            anyhow::bail!(
                "Invalid project name '{}': use lowercase letters, digits and '-'",
                self.name
            );
        }

        for function in &self.functions {
            if !is_valid_name(&function.name) {
                anyhow::bail!(
                    "Invalid function name '{}': use lowercase letters, digits and '-'",
                    function.name
                );
            }
            if function.func.trim().is_empty() {
                anyhow::bail!("Function '{}' has an empty reference", function.name);
            }
        }

        for key in &self.secrets {
            if key.trim().is_empty() {
                anyhow::bail!("Secret keys must not be empty");
            }
        }

        // Two entries for one pipeline file (or one name) leave it unclear
        // which definition is authoritative.
        let mut names: HashMap<&str, &str> = HashMap::new();
        let mut paths: HashMap<String, &str> = HashMap::new();
        for workflow in &self.workflows {
            if !is_valid_name(&workflow.name) {
                anyhow::bail!(
                    "Invalid workflow name '{}': use lowercase letters, digits and '-'",
                    workflow.name
                );
            }
            if let Some(previous) = names.insert(&workflow.name, &workflow.path) {
                anyhow::bail!(
                    "Duplicate workflow '{}' (declared for '{}' and '{}')",
                    workflow.name,
                    previous,
                    workflow.path
                );
            }
            if let Some(previous) = paths.insert(normalize_path(&workflow.path), &workflow.name) {
                anyhow::bail!(
                    "Duplicate workflow path '{}' (declared by '{}' and '{}')",
                    workflow.path,
                    previous,
                    workflow.name
                );
            }
        }

        Ok(())
    }

    /// Get a project parameter
    pub fn get_param(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }

    /// Apply parameter overrides (later values win)
    pub fn apply_overrides(&mut self, overrides: &[(String, Value)]) {
        for (key, value) in overrides {
            self.params.insert(key.clone(), value.clone());
        }
    }

    /// The build plan to use when an image build is requested
    pub fn build_spec(&self) -> ImageBuildSpec {
        self.build.clone().unwrap_or_else(ImageBuildSpec::reference)
    }
}

/// Normalize a relative path for duplicate detection (`./a/b` == `a/b`)
pub fn normalize_path(path: &str) -> String {
    Path::new(path)
        .components()
        .filter(|c| !matches!(c, std::path::Component::CurDir))
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
