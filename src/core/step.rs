//! Step domain model

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// `name` or `name: kind`, as written in a step's `returns` list
static OUTPUT_BINDING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([A-Za-z_][A-Za-z0-9_\-]*)\s*(?::\s*([A-Za-z_][A-Za-z0-9_]*)\s*)?$")
        .expect("static regex")
});

/// A single function invocation in a pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StepDefinition {
    /// Run name; defaults to the function name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Name of a function registered in the project
    pub function: String,

    /// Handler to invoke inside the function
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handler: Option<String>,

    /// Input parameters
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, InputValue>,

    /// Declared outputs
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub returns: Vec<OutputBinding>,
}

impl StepDefinition {
    /// Create a step invoking `function`
    pub fn new(function: impl Into<String>) -> Self {
        Self {
            name: None,
            function: function.into(),
            handler: None,
            params: BTreeMap::new(),
            returns: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Step identifier within the pipeline
    pub fn id(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.function)
    }

    /// Check whether the step declares an output with this name
    pub fn declares_output(&self, name: &str) -> bool {
        self.returns.iter().any(|o| o.name == name)
    }

    /// Output references used by this step's inputs
    pub fn output_refs(&self) -> impl Iterator<Item = &OutputRef> {
        self.params.values().filter_map(|v| match v {
            InputValue::Output(r) => Some(r),
            _ => None,
        })
    }

    /// Parameter references used by this step's inputs
    pub fn param_refs(&self) -> impl Iterator<Item = &ParamRef> {
        self.params.values().filter_map(|v| match v {
            InputValue::Param(r) => Some(r),
            _ => None,
        })
    }
}

/// Value of a step input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InputValue {
    /// `{param: name}`
    Param(ParamRef),
    /// `{output: step.name}`
    Output(OutputRef),
    /// Any literal value
    Literal(Value),
}

impl InputValue {
    pub fn param(name: impl Into<String>) -> Self {
        InputValue::Param(ParamRef { param: name.into() })
    }
}

/// Reference to a pipeline parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParamRef {
    pub param: String,
}

/// Reference to a named output of an earlier step, written `step.output`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputRef {
    pub output: String,
}

impl OutputRef {
    /// Split into `(step, output)`; `None` if the reference is malformed
    pub fn parts(&self) -> Option<(&str, &str)> {
        self.output
            .split_once('.')
            .filter(|(step, name)| !step.is_empty() && !name.is_empty())
    }
}

/// Named, optionally typed, step output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OutputBinding {
    pub name: String,
    /// Type tag such as `file` or `dataset`
    pub kind: Option<String>,
}

impl OutputBinding {
    pub fn new(name: impl Into<String>, kind: Option<&str>) -> Self {
        Self {
            name: name.into(),
            kind: kind.map(str::to_string),
        }
    }

    /// Parse `name` or `name: kind`
    pub fn parse(raw: &str) -> Option<Self> {
        let caps = OUTPUT_BINDING.captures(raw)?;
        Some(Self {
            name: caps[1].to_string(),
            kind: caps.get(2).map(|m| m.as_str().to_string()),
        })
    }
}

impl TryFrom<String> for OutputBinding {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("Invalid output binding: '{}'", value))
    }
}

impl From<OutputBinding> for String {
    fn from(binding: OutputBinding) -> Self {
        binding.to_string()
    }
}

impl fmt::Display for OutputBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            Some(kind) => write!(f, "{}: {}", self.name, kind),
            None => f.write_str(&self.name),
        }
    }
}
