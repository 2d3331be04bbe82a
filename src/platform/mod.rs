//! Orchestration platform access
//!
//! Every remote side effect of a setup run goes through [`Platform`]:
//! image builds, the secret store, the function registry and the project
//! store. The platform is an opaque collaborator; only request payloads
//! are modelled here.

pub mod client;
pub mod http_client;
pub mod response;

use crate::core::{BuildRequest, FunctionDescriptor, ProjectDescriptor, SecretSet};
use async_trait::async_trait;
pub use client::PlatformClientConfig;
pub use http_client::HttpPlatform;
pub use response::{BuildOutcome, BuildState, PlatformError};
use tracing::info;

/// Trait for platform access - allows for different implementations
#[async_trait]
pub trait Platform: Send + Sync {
    /// Build a container image and wait for the result
    async fn build_image(&self, project: &str, request: &BuildRequest) -> Result<BuildOutcome, PlatformError>;

    /// Store secrets in the project's secret store
    async fn store_secrets(&self, project: &str, secrets: &SecretSet) -> Result<(), PlatformError>;

    /// Store a function registration
    async fn store_function(&self, project: &str, function: &FunctionDescriptor) -> Result<(), PlatformError>;

    /// Store the project descriptor
    async fn store_project(&self, descriptor: &ProjectDescriptor) -> Result<(), PlatformError>;
}

/// Platform that only logs what would be sent
///
/// Builds always report ready, so a dry run walks the same path as a
/// successful real setup.
#[derive(Debug, Clone, Default)]
pub struct DryRunPlatform;

impl DryRunPlatform {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Platform for DryRunPlatform {
    async fn build_image(&self, project: &str, request: &BuildRequest) -> Result<BuildOutcome, PlatformError> {
        info!(
            "[dry-run] build {} for {} from {} ({} commands)",
            request.image,
            project,
            request.base_image,
            request.commands.len()
        );
        Ok(BuildOutcome::ready(&request.image))
    }

    async fn store_secrets(&self, project: &str, secrets: &SecretSet) -> Result<(), PlatformError> {
        let keys: Vec<&str> = secrets.keys().collect();
        info!("[dry-run] store secrets {:?} for {}", keys, project);
        Ok(())
    }

    async fn store_function(&self, project: &str, function: &FunctionDescriptor) -> Result<(), PlatformError> {
        info!(
            "[dry-run] store function {} ({}, {}) for {}",
            function.name, function.source, function.kind, project
        );
        Ok(())
    }

    async fn store_project(&self, descriptor: &ProjectDescriptor) -> Result<(), PlatformError> {
        info!("[dry-run] store project {}", descriptor.metadata.name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ImageBuildSpec;

    #[tokio::test]
    async fn test_dry_run_build_reports_ready() {
        let platform = DryRunPlatform::new();
        let request = ImageBuildSpec::reference().to_request("registry/calls:1");
        let outcome = platform.build_image("calls", &request).await.unwrap();
        assert!(outcome.ready);
        assert_eq!(outcome.image, "registry/calls:1");
    }
}
