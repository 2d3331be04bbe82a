//! Platform response types

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error types for platform operations
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("No platform endpoint configured (set MLRUN_DBPATH or pass --endpoint)")]
    NotConfigured,

    #[error("Invalid platform endpoint '{0}'")]
    InvalidEndpoint(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Timeout after {0} seconds")]
    Timeout(u64),

    #[error("Unexpected response: {0}")]
    Decode(String),
}

/// State of a container build as reported by the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildState {
    Pending,
    Deploying,
    Running,
    Ready,
    Error,
    #[serde(other)]
    Unknown,
}

impl BuildState {
    /// Parse the platform's state string
    pub fn parse(state: &str) -> Self {
        match state {
            "pending" | "created" => BuildState::Pending,
            "deploying" | "building" => BuildState::Deploying,
            "running" => BuildState::Running,
            "ready" => BuildState::Ready,
            "error" | "failed" | "unhealthy" => BuildState::Error,
            _ => BuildState::Unknown,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BuildState::Ready | BuildState::Error)
    }
}

/// Result of an image build
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildOutcome {
    /// Whether the image is ready
    pub ready: bool,

    /// Image that was built
    pub image: String,

    /// Tail of the build log, when the platform returned one
    #[serde(default)]
    pub log: Option<String>,
}

impl BuildOutcome {
    pub fn ready(image: impl Into<String>) -> Self {
        Self {
            ready: true,
            image: image.into(),
            log: None,
        }
    }

    pub fn failed(image: impl Into<String>, log: Option<String>) -> Self {
        Self {
            ready: false,
            image: image.into(),
            log,
        }
    }
}
