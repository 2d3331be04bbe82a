//! Pipeline parameters and bound arguments

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Declared type of a pipeline parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParamType {
    #[serde(rename = "int")]
    Int,
    #[serde(rename = "float")]
    Float,
    #[serde(rename = "str")]
    Str,
    #[serde(rename = "bool")]
    Bool,
    #[serde(rename = "list[str]", alias = "List[str]")]
    StrList,
}

impl ParamType {
    /// Check whether a value is acceptable for this type
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            ParamType::Int => value.is_i64() || value.is_u64(),
            ParamType::Float => value.is_number(),
            ParamType::Str => value.is_string(),
            ParamType::Bool => value.is_boolean(),
            ParamType::StrList => value
                .as_array()
                .is_some_and(|items| items.iter().all(Value::is_string)),
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParamType::Int => "int",
            ParamType::Float => "float",
            ParamType::Str => "str",
            ParamType::Bool => "bool",
            ParamType::StrList => "list[str]",
        };
        f.write_str(name)
    }
}

/// Arguments bound to a pipeline's parameters for one resolution
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineContext {
    /// Parameter name -> bound value
    pub arguments: BTreeMap<String, Value>,
}

impl PipelineContext {
    /// Create an empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind an argument
    pub fn set_argument(&mut self, name: impl Into<String>, value: Value) {
        self.arguments.insert(name.into(), value);
    }

    /// Get a bound argument
    pub fn get_argument(&self, name: &str) -> Option<&Value> {
        self.arguments.get(name)
    }

    /// Get a bound argument as a boolean
    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.arguments.get(name).and_then(Value::as_bool)
    }
}

/// Parse a `key=value` command-line value into a typed JSON value.
///
/// Scalars and flow sequences are read as YAML (`true`, `3`, `[a, b]`,
/// `null`); an empty value and anything else stays a plain string.
pub fn parse_argument_value(raw: &str) -> Value {
    if raw.trim().is_empty() {
        return Value::String(raw.to_string());
    }
    match serde_yaml::from_str::<Value>(raw) {
        Ok(Value::Object(_)) | Err(_) => Value::String(raw.to_string()),
        Ok(value) => value,
    }
}
