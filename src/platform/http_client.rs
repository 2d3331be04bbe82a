//! HTTP client for the platform's v1 REST API

use crate::core::{BuildRequest, FunctionDescriptor, ProjectDescriptor, SecretSet};
use crate::platform::{
    client::PlatformClientConfig,
    response::{BuildOutcome, BuildState, PlatformError},
    Platform,
};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};
use url::Url;

/// Name of the function the platform builds project images with
pub const IMAGE_BUILDER_FUNCTION: &str = "mlrun--project--image--builder";

/// Header carrying the build state on status responses
const STATUS_HEADER: &str = "x-mlrun-function-status";

/// Platform reached over HTTP
#[derive(Debug, Clone)]
pub struct HttpPlatform {
    client: Client,
    base: Url,
    token: Option<String>,
    poll_interval: Duration,
    build_timeout_secs: u64,
}

impl HttpPlatform {
    /// Create a client from configuration; an endpoint is required
    pub fn new(config: PlatformClientConfig) -> Result<Self, PlatformError> {
        let endpoint = config.endpoint.ok_or(PlatformError::NotConfigured)?;
        let mut base = Url::parse(&endpoint)
            .map_err(|_| PlatformError::InvalidEndpoint(endpoint.clone()))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(PlatformError::InvalidEndpoint(endpoint));
        }
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base,
            token: config.token,
            poll_interval: Duration::from_secs(config.poll_interval_secs),
            build_timeout_secs: config.build_timeout_secs,
        })
    }

    /// Absolute URL for an API path such as `projects/demo`
    pub fn api_url(&self, path: &str) -> Result<Url, PlatformError> {
        self.base
            .join(&format!("api/v1/{}", path))
            .map_err(|_| PlatformError::InvalidEndpoint(format!("{}api/v1/{}", self.base, path)))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn check(response: Response) -> Result<Response, PlatformError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| {
                v.get("detail")
                    .map(|d| d.as_str().map(str::to_string).unwrap_or_else(|| d.to_string()))
            })
            .unwrap_or(body);
        warn!("Platform returned {}: {}", status, message);
        Err(PlatformError::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn poll_build(&self, project: &str, image: &str) -> Result<BuildOutcome, PlatformError> {
        let started = Instant::now();
        let mut offset = 0usize;
        let mut log = String::new();

        loop {
            if started.elapsed().as_secs() >= self.build_timeout_secs {
                return Err(PlatformError::Timeout(self.build_timeout_secs));
            }
            sleep(self.poll_interval).await;

            let mut url = self.api_url("build/status")?;
            url.query_pairs_mut()
                .append_pair("name", IMAGE_BUILDER_FUNCTION)
                .append_pair("project", project)
                .append_pair("logs", "true")
                .append_pair("offset", &offset.to_string());

            let response = Self::check(self.authorize(self.client.get(url)).send().await?).await?;
            let state = response
                .headers()
                .get(STATUS_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(BuildState::parse)
                .unwrap_or(BuildState::Unknown);
            let chunk = response.text().await?;
            offset += chunk.len();
            log.push_str(&chunk);

            debug!("Build state for {}: {:?}", image, state);
            match state {
                BuildState::Ready => return Ok(BuildOutcome::ready(image)),
                BuildState::Error => return Ok(BuildOutcome::failed(image, tail(&log))),
                _ => continue,
            }
        }
    }
}

/// Last lines of a build log
fn tail(log: &str) -> Option<String> {
    const LINES: usize = 20;
    if log.trim().is_empty() {
        return None;
    }
    let lines: Vec<&str> = log.lines().collect();
    let start = lines.len().saturating_sub(LINES);
    Some(lines[start..].join("\n"))
}

/// Body of a build request
///
/// `set_as_default` and `overwrite_build_params` are applied to the project
/// by the caller and are not part of the request.
pub fn build_payload(project: &str, request: &BuildRequest) -> Value {
    json!({
        "function": {
            "kind": "job",
            "metadata": {
                "name": IMAGE_BUILDER_FUNCTION,
                "project": project,
            },
            "spec": {
                "build": {
                    "image": request.image,
                    "base_image": request.base_image,
                    "commands": request.commands,
                },
            },
        },
        "with_mlrun": false,
        "skip_deployed": false,
    })
}

/// Body of a secret store request
pub fn secrets_payload(secrets: &SecretSet) -> Value {
    json!({
        "provider": "kubernetes",
        "secrets": secrets.expose(),
    })
}

/// Body of a function store request
pub fn function_payload(project: &str, function: &FunctionDescriptor) -> Value {
    let mut spec = json!({
        "function_source": function.source.url(),
        "with_repo": function.with_repo,
    });
    if let Some(image) = &function.image {
        spec["image"] = json!(image);
    }
    if let Some(handler) = &function.handler {
        spec["default_handler"] = json!(handler);
    }

    json!({
        "kind": function.kind.to_string(),
        "metadata": {
            "name": function.name,
            "project": project,
            "tag": "latest",
        },
        "spec": spec,
    })
}

#[async_trait]
impl Platform for HttpPlatform {
    async fn build_image(&self, project: &str, request: &BuildRequest) -> Result<BuildOutcome, PlatformError> {
        info!("Submitting image build for {} ({} commands)", request.image, request.commands.len());

        let url = self.api_url("build/function")?;
        let response = self
            .authorize(self.client.post(url))
            .json(&build_payload(project, request))
            .send()
            .await?;
        let text = Self::check(response).await?.text().await?;
        let body: Value = serde_json::from_str(&text)
            .map_err(|e| PlatformError::Decode(format!("build response: {}", e)))?;

        if body.get("ready").and_then(Value::as_bool).unwrap_or(false) {
            return Ok(BuildOutcome::ready(&request.image));
        }

        let state = body
            .pointer("/data/status/state")
            .and_then(Value::as_str)
            .map(BuildState::parse)
            .unwrap_or(BuildState::Unknown);
        match state {
            BuildState::Ready => Ok(BuildOutcome::ready(&request.image)),
            BuildState::Error => Ok(BuildOutcome::failed(&request.image, None)),
            _ => self.poll_build(project, &request.image).await,
        }
    }

    async fn store_secrets(&self, project: &str, secrets: &SecretSet) -> Result<(), PlatformError> {
        debug!("Storing {} secrets for {}", secrets.len(), project);
        let url = self.api_url(&format!("projects/{}/secrets", project))?;
        let response = self
            .authorize(self.client.post(url))
            .json(&secrets_payload(secrets))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn store_function(&self, project: &str, function: &FunctionDescriptor) -> Result<(), PlatformError> {
        debug!("Storing function {} for {}", function.name, project);
        let mut url = self.api_url(&format!("projects/{}/functions/{}", project, function.name))?;
        url.query_pairs_mut()
            .append_pair("tag", "latest")
            .append_pair("versioned", "false");
        let response = self
            .authorize(self.client.post(url))
            .json(&function_payload(project, function))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn store_project(&self, descriptor: &ProjectDescriptor) -> Result<(), PlatformError> {
        debug!("Storing project {}", descriptor.metadata.name);
        let url = self.api_url(&format!("projects/{}", descriptor.metadata.name))?;
        let response = self
            .authorize(self.client.put(url))
            .json(descriptor)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}
