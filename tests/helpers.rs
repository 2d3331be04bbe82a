//! Test utility functions for mlsetup

use async_trait::async_trait;
use mlsetup::core::{
    BuildRequest, FunctionDescriptor, Project, ProjectConfig, ProjectDescriptor, SecretSet, SetupState,
    SetupStatus,
};
use mlsetup::platform::{BuildOutcome, Platform, PlatformError};
use mlsetup::setup::{SetupEngine, SetupError, SetupEvent};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// A call the engine made against the platform
#[derive(Debug, Clone, PartialEq)]
pub enum PlatformCall {
    BuildImage(BuildRequest),
    StoreSecrets(Vec<String>),
    StoreFunction(FunctionDescriptor),
    StoreProject(ProjectDescriptor),
}

impl PlatformCall {
    pub fn label(&self) -> String {
        match self {
            PlatformCall::BuildImage(_) => "build".to_string(),
            PlatformCall::StoreSecrets(_) => "secrets".to_string(),
            PlatformCall::StoreFunction(f) => format!("function:{}", f.name),
            PlatformCall::StoreProject(_) => "project".to_string(),
        }
    }
}

/// Mock platform that records every call
#[derive(Clone, Default)]
pub struct MockPlatform {
    calls: Arc<Mutex<Vec<PlatformCall>>>,
    build_fails: bool,
}

impl MockPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds report a failed image with a short log
    pub fn failing_builds() -> Self {
        Self {
            build_fails: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<PlatformCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: PlatformCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl Platform for MockPlatform {
    async fn build_image(&self, _project: &str, request: &BuildRequest) -> Result<BuildOutcome, PlatformError> {
        self.record(PlatformCall::BuildImage(request.clone()));
        if self.build_fails {
            Ok(BuildOutcome::failed(&request.image, Some("pip: not found".to_string())))
        } else {
            Ok(BuildOutcome::ready(&request.image))
        }
    }

    async fn store_secrets(&self, _project: &str, secrets: &SecretSet) -> Result<(), PlatformError> {
        self.record(PlatformCall::StoreSecrets(secrets.keys().map(str::to_string).collect()));
        Ok(())
    }

    async fn store_function(&self, _project: &str, function: &FunctionDescriptor) -> Result<(), PlatformError> {
        self.record(PlatformCall::StoreFunction(function.clone()));
        Ok(())
    }

    async fn store_project(&self, descriptor: &ProjectDescriptor) -> Result<(), PlatformError> {
        self.record(PlatformCall::StoreProject(descriptor.clone()));
        Ok(())
    }
}

/// Both credentials present
pub fn full_secrets() -> HashMap<String, String> {
    HashMap::from([
        ("OPENAI_API_KEY".to_string(), "sk-test".to_string()),
        ("OPENAI_API_BASE".to_string(), "https://llm.example.com/v1".to_string()),
    ])
}

/// A context directory holding workflow files
pub struct ProjectDir {
    pub dir: TempDir,
}

impl ProjectDir {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write a file relative to the context directory
    pub fn write(&self, relative: &str, content: &str) -> &Self {
        let path = self.dir.path().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
        self
    }
}

/// Result of a setup run against the mock platform
pub struct SetupTestResult {
    pub result: Result<Project, SetupError>,
    pub state: SetupState,
    pub calls: Vec<PlatformCall>,
    pub events: Vec<SetupEvent>,
}

impl SetupTestResult {
    pub fn project(&self) -> &Project {
        match &self.result {
            Ok(project) => project,
            Err(e) => panic!("setup failed: {}", e),
        }
    }

    pub fn error(&self) -> &SetupError {
        match &self.result {
            Ok(_) => panic!("setup unexpectedly succeeded"),
            Err(e) => e,
        }
    }

    pub fn call_labels(&self) -> Vec<String> {
        self.calls.iter().map(PlatformCall::label).collect()
    }

    pub fn registered_function(&self, name: &str) -> &FunctionDescriptor {
        self.calls
            .iter()
            .find_map(|c| match c {
                PlatformCall::StoreFunction(f) if f.name == name => Some(f),
                _ => None,
            })
            .unwrap_or_else(|| panic!("function {} was not registered", name))
    }

    pub fn build_request(&self) -> Option<&BuildRequest> {
        self.calls.iter().find_map(|c| match c {
            PlatformCall::BuildImage(r) => Some(r),
            _ => None,
        })
    }
}

/// Run a setup against a mock platform with the given secrets
pub async fn run_setup_with_mock(
    yaml: &str,
    dir: &ProjectDir,
    platform: MockPlatform,
    secrets: HashMap<String, String>,
) -> SetupTestResult {
    let config = ProjectConfig::from_yaml(yaml).unwrap();
    run_config_with_mock(&config, dir, platform, secrets).await
}

/// Run an already-built configuration against a mock platform
pub async fn run_config_with_mock(
    config: &ProjectConfig,
    dir: &ProjectDir,
    platform: MockPlatform,
    secrets: HashMap<String, String>,
) -> SetupTestResult {
    let events = Arc::new(Mutex::new(Vec::new()));
    let recorded = events.clone();
    let mut engine = SetupEngine::new(platform.clone(), dir.path())
        .with_secret_lookup(move |key| secrets.get(key).cloned());
    engine.add_event_handler(move |event| recorded.lock().unwrap().push(event.clone()));

    let mut state = SetupState::new();
    let result = engine.run(config, &mut state).await;

    let events = events.lock().unwrap().clone();
    SetupTestResult {
        result,
        state,
        calls: platform.calls(),
        events,
    }
}

pub fn assert_setup_completed(result: &SetupTestResult) {
    assert_eq!(
        result.state.status,
        SetupStatus::Completed,
        "setup should have completed, error: {:?}",
        result.state.error
    );
    assert!(result.result.is_ok());
}

pub fn assert_setup_failed(result: &SetupTestResult) {
    assert_eq!(result.state.status, SetupStatus::Failed, "setup should have failed");
    assert!(result.state.error.is_some());
    assert!(result.result.is_err());
}

/// Minimal workflow calling the given functions in sequence
pub fn workflow_calling(name: &str, functions: &[&str]) -> String {
    let mut yaml = format!("name: {}\nsteps:\n", name);
    for function in functions {
        yaml.push_str(&format!("  - function: {}\n", function));
    }
    yaml
}
