//! Scenario-based tests for mlsetup

mod conditional_workflow;
mod duplicate_workflows;
mod function_registration;
mod image_build;
mod missing_secrets;
