//! Test: Conditional Workflow - guarded steps, typed parameters, outputs

use crate::helpers::*;
use mlsetup::core::pipeline::ResolvedInput;
use mlsetup::setup::SetupError;
use serde_json::{json, Value};
use std::collections::BTreeMap;

const PROJECT: &str = r#"
name: calls
params:
  default_image: registry.example.com/calls:1
functions:
  - name: structured-data-generator
    func: hub://structured_data_generator
  - name: test-image
    func: ./src/test-image.py
workflows:
  - name: test-image-in-workflow
    path: src/workflow-image.yaml
"#;

const WORKFLOW: &str = r#"
name: test-image-in-workflow
parameters:
  - { name: amount, type: int }
  - { name: language, type: str }
  - { name: available_voices, type: "list[str]" }
  - { name: generate_clients_and_agents, type: bool, default: true }
steps:
  - condition:
      param: generate_clients_and_agents
    steps:
      - function: test-image
        handler: handler
      - function: structured-data-generator
        handler: generate_data
        params:
          amount: 2
          model_name: gpt-4
          language: { param: language }
          fields: ["first_name", "phone_number", "email"]
        returns: ["clients: file"]
"#;

fn args(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}

fn base_args() -> BTreeMap<String, Value> {
    args(&[
        ("amount", json!(10)),
        ("language", json!("en")),
        ("available_voices", json!(["alloy", "echo"])),
    ])
}

#[tokio::test]
async fn test_workflow_attached_with_project_image() {
    let dir = ProjectDir::new();
    dir.write("src/workflow-image.yaml", WORKFLOW);

    let result = run_setup_with_mock(PROJECT, &dir, MockPlatform::new(), full_secrets()).await;

    assert_setup_completed(&result);
    assert_eq!(result.state.workflows_attached, 1);

    let workflow = result.project().workflow("test-image-in-workflow").unwrap();
    assert_eq!(workflow.path, "src/workflow-image.yaml");
    assert_eq!(workflow.engine, "kfp");
    assert_eq!(workflow.image.as_deref(), Some("registry.example.com/calls:1"));
    assert!(workflow.definition.is_some());
}

#[tokio::test]
async fn test_guard_true_runs_both_steps() {
    let dir = ProjectDir::new();
    dir.write("src/workflow-image.yaml", WORKFLOW);
    let result = run_setup_with_mock(PROJECT, &dir, MockPlatform::new(), full_secrets()).await;

    let definition = result
        .project()
        .workflow("test-image-in-workflow")
        .and_then(|w| w.definition.clone())
        .unwrap();

    // Default of the guard is true
    let graph = definition.resolve(&base_args()).unwrap();
    assert_eq!(
        graph.execution_order(),
        vec!["test-image", "structured-data-generator"]
    );

    let generator = graph.step("structured-data-generator").unwrap();
    assert_eq!(generator.handler.as_deref(), Some("generate_data"));
    assert_eq!(generator.inputs["language"], ResolvedInput::Literal(json!("en")));
    assert_eq!(generator.inputs["amount"], ResolvedInput::Literal(json!(2)));
    assert_eq!(generator.outputs[0].name, "clients");
    assert_eq!(generator.outputs[0].kind.as_deref(), Some("file"));
}

#[tokio::test]
async fn test_guard_false_skips_generation() {
    let dir = ProjectDir::new();
    dir.write("src/workflow-image.yaml", WORKFLOW);
    let result = run_setup_with_mock(PROJECT, &dir, MockPlatform::new(), full_secrets()).await;
    let definition = result.project().workflows[0].definition.clone().unwrap();

    let mut arguments = base_args();
    arguments.insert("generate_clients_and_agents".to_string(), json!(false));
    let graph = definition.resolve(&arguments).unwrap();

    assert!(graph.steps.is_empty());
    assert!(!graph.contains("structured-data-generator"));
}

#[tokio::test]
async fn test_workflow_with_unregistered_function_fails() {
    let dir = ProjectDir::new();
    dir.write(
        "src/workflow-image.yaml",
        &workflow_calling("test-image-in-workflow", &["test-image", "data-prep"]),
    );

    let result = run_setup_with_mock(PROJECT, &dir, MockPlatform::new(), full_secrets()).await;

    assert_setup_failed(&result);
    assert!(matches!(result.error(), SetupError::Project(_)));
    assert!(result.error().to_string().contains("data-prep"));
    assert_eq!(result.state.workflows_attached, 0);
    assert!(!result.call_labels().contains(&"project".to_string()));
}

#[tokio::test]
async fn test_missing_workflow_file_fails() {
    let dir = ProjectDir::new();

    let result = run_setup_with_mock(PROJECT, &dir, MockPlatform::new(), full_secrets()).await;

    assert_setup_failed(&result);
    match result.error() {
        SetupError::WorkflowLoad { workflow, path, .. } => {
            assert_eq!(workflow, "test-image-in-workflow");
            assert!(path.ends_with("workflow-image.yaml"));
        }
        other => panic!("unexpected error {:?}", other),
    }
    // Functions were registered before workflows were loaded
    assert_eq!(result.state.functions_registered, 2);
}
