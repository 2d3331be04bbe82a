//! Function descriptors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix of references to functions published in the function hub
pub const HUB_PREFIX: &str = "hub://";

/// Where a function's code comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FunctionSource {
    /// Function published in the shared hub catalog (`hub://name`)
    Hub(String),
    /// Script or other reference resolved relative to the project source
    Script(String),
}

impl FunctionSource {
    /// Parse a function reference
    pub fn parse(reference: &str) -> Self {
        match reference.strip_prefix(HUB_PREFIX) {
            Some(name) => FunctionSource::Hub(name.to_string()),
            None => FunctionSource::Script(reference.to_string()),
        }
    }

    pub fn is_hub(&self) -> bool {
        matches!(self, FunctionSource::Hub(_))
    }

    /// The reference string as the platform expects it
    pub fn url(&self) -> String {
        match self {
            FunctionSource::Hub(name) => format!("{}{}", HUB_PREFIX, name),
            FunctionSource::Script(path) => path.clone(),
        }
    }
}

impl From<String> for FunctionSource {
    fn from(reference: String) -> Self {
        Self::parse(&reference)
    }
}

impl From<FunctionSource> for String {
    fn from(source: FunctionSource) -> Self {
        source.url()
    }
}

impl fmt::Display for FunctionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url())
    }
}

/// Runtime kind a function executes under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionKind {
    /// Batch job
    #[default]
    Job,
    Nuclio,
    Serving,
    Dask,
    Mpijob,
    Spark,
    Local,
    Handler,
}

impl fmt::Display for ExecutionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExecutionKind::Job => "job",
            ExecutionKind::Nuclio => "nuclio",
            ExecutionKind::Serving => "serving",
            ExecutionKind::Dask => "dask",
            ExecutionKind::Mpijob => "mpijob",
            ExecutionKind::Spark => "spark",
            ExecutionKind::Local => "local",
            ExecutionKind::Handler => "handler",
        };
        f.write_str(name)
    }
}

/// Function entry as written in the project file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FunctionConfig {
    /// Name pipelines use to call the function
    pub name: String,

    /// `hub://name` or a path to a script
    pub func: String,

    #[serde(default)]
    pub kind: ExecutionKind,

    /// Container image; falls back to the project default image
    #[serde(default)]
    pub image: Option<String>,

    /// Default handler
    #[serde(default)]
    pub handler: Option<String>,

    /// Bundle the project source with the function; inferred when absent
    #[serde(default)]
    pub with_repo: Option<bool>,
}

/// A function registered against a project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionDescriptor {
    pub name: String,

    #[serde(rename = "url")]
    pub source: FunctionSource,

    pub kind: ExecutionKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handler: Option<String>,

    pub with_repo: bool,
}
