//! Test: Image Build - build plan, target image and failure handling

use crate::helpers::*;
use mlsetup::setup::{SetupError, SetupEvent};

#[tokio::test]
async fn test_build_uses_default_image_and_reference_plan() {
    let yaml = r#"
name: calls
params:
  default_image: registry.example.com/calls:latest
  build_image: true
functions:
  - name: test-image
    func: ./src/test-image.py
"#;
    let dir = ProjectDir::new();
    let result = run_setup_with_mock(yaml, &dir, MockPlatform::new(), full_secrets()).await;

    assert_setup_completed(&result);
    assert!(result.state.image_built);

    let request = result.build_request().expect("image should be built");
    assert_eq!(request.image, "registry.example.com/calls:latest");
    assert_eq!(request.base_image, "mlrun/mlrun-kfp");
    assert_eq!(request.commands.len(), 11);
    assert_eq!(request.commands[0], "apt-get update -y && apt-get install ffmpeg -y");
    assert_eq!(request.commands[10], "pip install protobuf");
    assert!(request.set_as_default);
    assert!(request.overwrite_build_params);

    // Build happens before secrets and function registration
    assert_eq!(
        result.call_labels(),
        vec!["build", "secrets", "function:test-image", "project"]
    );
    assert_eq!(
        result.project().default_image.as_deref(),
        Some("registry.example.com/calls:latest")
    );
}

#[tokio::test]
async fn test_build_without_default_image_uses_project_image_name() {
    let yaml = r#"
name: calls
params:
  build_image: "true"
"#;
    let dir = ProjectDir::new();
    let result = run_setup_with_mock(yaml, &dir, MockPlatform::new(), full_secrets()).await;

    assert_setup_completed(&result);
    let request = result.build_request().unwrap();
    assert_eq!(request.image, ".mlrun-project-image-calls");
    assert_eq!(
        result.project().default_image.as_deref(),
        Some(".mlrun-project-image-calls")
    );
    assert!(result.project().build.is_some());
}

#[tokio::test]
async fn test_failed_build_aborts_before_registration() {
    let yaml = r#"
name: calls
params:
  default_image: registry.example.com/calls:latest
  build_image: true
functions:
  - name: generator
    func: hub://structured_data_generator
"#;
    let dir = ProjectDir::new();
    let result = run_setup_with_mock(yaml, &dir, MockPlatform::failing_builds(), full_secrets()).await;

    assert_setup_failed(&result);
    match result.error() {
        SetupError::ImageBuildFailed { image, log } => {
            assert_eq!(image, "registry.example.com/calls:latest");
            assert_eq!(log.as_deref(), Some("pip: not found"));
        }
        other => panic!("unexpected error {:?}", other),
    }

    assert_eq!(result.call_labels(), vec!["build"]);
    assert!(!result.state.image_built);
    assert!(!result.state.secrets_stored);
    assert_eq!(result.state.functions_registered, 0);
    assert!(!dir.path().join("project.yaml").exists());
    assert!(matches!(result.events.last(), Some(SetupEvent::SetupFailed { .. })));
}

#[tokio::test]
async fn test_no_build_when_flag_absent() {
    let yaml = r#"
name: calls
build:
  base_image: python:3.11
  groups:
    - stage: system
      label: system
      commands: ["apt-get update -y"]
"#;
    let dir = ProjectDir::new();
    let result = run_setup_with_mock(yaml, &dir, MockPlatform::new(), full_secrets()).await;

    assert_setup_completed(&result);
    assert!(result.build_request().is_none());
    assert!(!result.state.image_built);
    assert_eq!(result.project().default_image, None);
}

#[tokio::test]
async fn test_custom_build_plan_is_ordered_by_stage() {
    let yaml = r#"
name: calls
params:
  build_image: true
build:
  base_image: python:3.11
  groups:
    - stage: cleanup
      label: cleanup
      commands: ["pip uninstall -y protobuf"]
    - stage: system
      label: system
      commands: ["apt-get update -y"]
    - stage: framework
      label: torch
      commands: ["pip install torch"]
"#;
    let dir = ProjectDir::new();
    let result = run_setup_with_mock(yaml, &dir, MockPlatform::new(), full_secrets()).await;

    assert_setup_completed(&result);
    let request = result.build_request().unwrap();
    assert_eq!(request.base_image, "python:3.11");
    assert_eq!(
        request.commands,
        vec!["apt-get update -y", "pip install torch", "pip uninstall -y protobuf"]
    );
}
