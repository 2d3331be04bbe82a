//! Test: Function Registration - bundle inference, image fallback, source

use crate::helpers::*;
use mlsetup::core::context::parse_argument_value;
use mlsetup::core::{ExecutionKind, ProjectConfig};
use mlsetup::setup::SetupEvent;

#[tokio::test]
async fn test_bundle_flag_inferred_from_reference() {
    let yaml = r#"
name: calls
functions:
  - name: structured-data-generator
    func: hub://structured_data_generator
  - name: test-image
    func: ./src/test-image.py
    handler: handler
  - name: pinned
    func: ./src/pinned.py
    with_repo: false
"#;
    let dir = ProjectDir::new();
    let result = run_setup_with_mock(yaml, &dir, MockPlatform::new(), full_secrets()).await;

    assert_setup_completed(&result);
    assert_eq!(result.state.functions_registered, 3);

    let hub = result.registered_function("structured-data-generator");
    assert!(!hub.with_repo);
    assert!(hub.source.is_hub());
    assert_eq!(hub.kind, ExecutionKind::Job);

    let local = result.registered_function("test-image");
    assert!(local.with_repo);
    assert_eq!(local.handler.as_deref(), Some("handler"));

    assert!(!result.registered_function("pinned").with_repo);
}

#[tokio::test]
async fn test_functions_inherit_default_image() {
    let yaml = r#"
name: calls
params:
  default_image: registry.example.com/calls:1
functions:
  - name: inherits
    func: ./src/a.py
  - name: own-image
    func: ./src/b.py
    image: mlrun/mlrun
"#;
    let dir = ProjectDir::new();
    let result = run_setup_with_mock(yaml, &dir, MockPlatform::new(), full_secrets()).await;

    assert_setup_completed(&result);
    assert_eq!(
        result.registered_function("inherits").image.as_deref(),
        Some("registry.example.com/calls:1")
    );
    assert_eq!(
        result.registered_function("own-image").image.as_deref(),
        Some("mlrun/mlrun")
    );
}

#[tokio::test]
async fn test_without_source_or_image_nothing_is_set() {
    let yaml = r#"
name: calls
functions:
  - name: generator
    func: hub://structured_data_generator
"#;
    let dir = ProjectDir::new();
    let result = run_setup_with_mock(yaml, &dir, MockPlatform::new(), full_secrets()).await;

    assert_setup_completed(&result);
    let project = result.project();
    assert_eq!(project.source, None);
    assert_eq!(project.default_image, None);
    assert_eq!(result.registered_function("generator").image, None);
    assert!(!result
        .events
        .iter()
        .any(|e| matches!(e, SetupEvent::SourceSet { .. } | SetupEvent::DefaultImageSet { .. })));
}

#[tokio::test]
async fn test_explicit_null_source_and_no_build() {
    let yaml = r#"
name: calls
params:
  source: null
  build_image: false
functions:
  - name: generator
    func: hub://structured_data_generator
  - name: test-image
    func: ./src/test-image.py
"#;
    let dir = ProjectDir::new();
    let result = run_setup_with_mock(yaml, &dir, MockPlatform::new(), full_secrets()).await;

    assert_setup_completed(&result);
    assert!(result.build_request().is_none());
    assert!(!result.state.image_built);
    assert_eq!(result.project().source, None);
    assert_eq!(result.project().default_image, None);
    assert_eq!(
        result.call_labels(),
        vec!["secrets", "function:generator", "function:test-image", "project"]
    );
    assert!(!result.registered_function("generator").with_repo);
    assert!(result.registered_function("test-image").with_repo);
}

#[tokio::test]
async fn test_null_source_override_unsets_source() {
    let yaml = r#"
name: calls
params:
  source: git://github.com/example/calls.git#main
"#;
    let mut config = ProjectConfig::from_yaml(yaml).unwrap();
    config.apply_overrides(&[("source".to_string(), parse_argument_value("null"))]);

    let dir = ProjectDir::new();
    let result = run_config_with_mock(&config, &dir, MockPlatform::new(), full_secrets()).await;

    assert_setup_completed(&result);
    assert_eq!(result.project().source, None);
    assert!(!result
        .events
        .iter()
        .any(|e| matches!(e, SetupEvent::SourceSet { .. })));
}

#[tokio::test]
async fn test_source_is_not_pulled_at_runtime() {
    let yaml = r#"
name: calls
params:
  source: git://github.com/example/calls.git#main
"#;
    let dir = ProjectDir::new();
    let result = run_setup_with_mock(yaml, &dir, MockPlatform::new(), full_secrets()).await;

    assert_setup_completed(&result);
    let source = result.project().source.as_ref().unwrap();
    assert_eq!(source.url, "git://github.com/example/calls.git#main");
    assert!(!source.pull_at_runtime);

    let saved = std::fs::read_to_string(dir.path().join("project.yaml")).unwrap();
    assert!(saved.contains("git://github.com/example/calls.git#main"));
    assert!(saved.contains("load_source_on_run: false"));
}

#[tokio::test]
async fn test_secrets_stored_before_functions() {
    let yaml = r#"
name: calls
functions:
  - name: a
    func: ./src/a.py
  - name: b
    func: hub://b
"#;
    let dir = ProjectDir::new();
    let result = run_setup_with_mock(yaml, &dir, MockPlatform::new(), full_secrets()).await;

    assert_setup_completed(&result);
    assert_eq!(
        result.call_labels(),
        vec!["secrets", "function:a", "function:b", "project"]
    );
    assert_eq!(
        result.project().secret_keys,
        vec!["OPENAI_API_BASE", "OPENAI_API_KEY"]
    );
}
