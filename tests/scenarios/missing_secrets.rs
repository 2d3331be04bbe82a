//! Test: Missing Secrets - credentials are checked before any platform call

use crate::helpers::*;
use mlsetup::setup::SetupError;
use std::collections::HashMap;

const PROJECT: &str = r#"
name: calls
params:
  build_image: true
functions:
  - name: generator
    func: hub://structured_data_generator
"#;

#[tokio::test]
async fn test_missing_both_secrets_aborts_before_platform() {
    let dir = ProjectDir::new();
    let result = run_setup_with_mock(PROJECT, &dir, MockPlatform::new(), HashMap::new()).await;

    assert_setup_failed(&result);
    match result.error() {
        SetupError::MissingSecrets(missing) => {
            assert_eq!(missing.missing, vec!["OPENAI_API_KEY", "OPENAI_API_BASE"]);
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert_eq!(
        result.error().to_string(),
        "OPENAI_API_KEY and OPENAI_API_BASE must be set"
    );

    // No build, no secrets, no functions, nothing saved
    assert!(result.calls.is_empty());
    assert!(!dir.path().join("project.yaml").exists());
}

#[tokio::test]
async fn test_blank_secret_counts_as_missing() {
    let dir = ProjectDir::new();
    let mut secrets = full_secrets();
    secrets.insert("OPENAI_API_BASE".to_string(), "   ".to_string());

    let result = run_setup_with_mock(PROJECT, &dir, MockPlatform::new(), secrets).await;

    assert_setup_failed(&result);
    match result.error() {
        SetupError::MissingSecrets(missing) => assert_eq!(missing.missing, vec!["OPENAI_API_BASE"]),
        other => panic!("unexpected error {:?}", other),
    }
    assert!(result.calls.is_empty());
}

#[tokio::test]
async fn test_custom_secret_list() {
    let yaml = r#"
name: calls
secrets: [HF_TOKEN]
"#;
    let dir = ProjectDir::new();
    let secrets = HashMap::from([("HF_TOKEN".to_string(), "hf_x".to_string())]);

    let result = run_setup_with_mock(yaml, &dir, MockPlatform::new(), secrets).await;

    assert_setup_completed(&result);
    assert_eq!(result.project().secret_keys, vec!["HF_TOKEN"]);
    assert_eq!(result.call_labels(), vec!["secrets", "project"]);
}
