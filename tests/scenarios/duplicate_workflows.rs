//! Test: Duplicate Workflows - one file or name attached twice is rejected

use crate::helpers::*;
use mlsetup::core::{ProjectConfig, ProjectError};
use mlsetup::setup::SetupError;

const TWO_ENTRIES_ONE_FILE: &str = r#"
name: calls
functions:
  - name: test-image
    func: ./src/test-image.py
workflows:
  - name: main
    path: src/workflow.yaml
  - name: main-again
    path: ./src/workflow.yaml
"#;

#[test]
fn test_config_rejects_duplicate_path() {
    let err = ProjectConfig::from_yaml(TWO_ENTRIES_ONE_FILE).unwrap_err();
    assert!(err.to_string().contains("Duplicate workflow path"));
}

#[test]
fn test_config_rejects_duplicate_name() {
    let yaml = r#"
name: calls
workflows:
  - name: main
    path: src/a.yaml
  - name: main
    path: src/b.yaml
"#;
    let err = ProjectConfig::from_yaml(yaml).unwrap_err();
    assert!(err.to_string().contains("Duplicate workflow 'main'"));
}

#[tokio::test]
async fn test_engine_rejects_duplicate_path_in_unvalidated_config() {
    let config: ProjectConfig = serde_yaml::from_str(TWO_ENTRIES_ONE_FILE).unwrap();
    let dir = ProjectDir::new();
    dir.write("src/workflow.yaml", &workflow_calling("main", &["test-image"]));

    let result = run_config_with_mock(&config, &dir, MockPlatform::new(), full_secrets()).await;

    assert_setup_failed(&result);
    match result.error() {
        SetupError::Project(ProjectError::DuplicateWorkflowPath { existing, .. }) => {
            assert_eq!(existing, "main");
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert_eq!(result.state.workflows_attached, 1);
    assert!(!dir.path().join("project.yaml").exists());
}
