//! Resolution of implicit setup defaults
//!
//! Every value a setup run depends on is resolved here, together with the
//! rule that produced it:
//!
//! | value            | explicit                    | otherwise                              |
//! |------------------|-----------------------------|----------------------------------------|
//! | `source`         | non-empty string param      | unset                                  |
//! | `default_image`  | non-empty string param      | unset                                  |
//! | `build_image`    | bool or `"true"`/`"false"`  | `false`                                |
//! | function bundle  | `with_repo` in function     | `false` for `hub://`, `true` otherwise |
//! | function image   | `image` in function         | project default image, else unset      |

use crate::core::FunctionSource;
use crate::setup::SetupError;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

pub const SOURCE_PARAM: &str = "source";
pub const DEFAULT_IMAGE_PARAM: &str = "default_image";
pub const BUILD_IMAGE_PARAM: &str = "build_image";

/// Rule that produced a resolved value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionRule {
    /// Set explicitly in the project file or on the command line
    Explicit,
    /// Not set; documented default applied
    Default,
    /// Bundle flag inferred from a `hub://` reference
    InferredFromHubReference,
    /// Bundle flag inferred from a non-hub reference
    InferredFromLocalReference,
    /// Function image taken from the project default image
    InheritedProjectImage,
}

impl fmt::Display for ResolutionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ResolutionRule::Explicit => "explicit",
            ResolutionRule::Default => "default",
            ResolutionRule::InferredFromHubReference => "inferred from hub reference",
            ResolutionRule::InferredFromLocalReference => "inferred from local reference",
            ResolutionRule::InheritedProjectImage => "inherited project image",
        };
        f.write_str(text)
    }
}

/// A value and the rule that produced it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolved<T> {
    pub value: T,
    pub rule: ResolutionRule,
}

impl<T> Resolved<T> {
    pub fn new(value: T, rule: ResolutionRule) -> Self {
        Self { value, rule }
    }
}

/// Project-level options of one setup run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SetupOptions {
    pub source: Resolved<Option<String>>,
    pub default_image: Resolved<Option<String>>,
    pub build_image: Resolved<bool>,
}

/// Resolve the project-level options from project parameters
pub fn resolve_options(params: &BTreeMap<String, Value>) -> Result<SetupOptions, SetupError> {
    let options = SetupOptions {
        source: optional_string(params, SOURCE_PARAM)?,
        default_image: optional_string(params, DEFAULT_IMAGE_PARAM)?,
        build_image: flag(params, BUILD_IMAGE_PARAM, false)?,
    };

    debug!("{} = {:?} ({})", SOURCE_PARAM, options.source.value, options.source.rule);
    debug!(
        "{} = {:?} ({})",
        DEFAULT_IMAGE_PARAM, options.default_image.value, options.default_image.rule
    );
    debug!(
        "{} = {} ({})",
        BUILD_IMAGE_PARAM, options.build_image.value, options.build_image.rule
    );

    Ok(options)
}

fn optional_string(params: &BTreeMap<String, Value>, key: &str) -> Result<Resolved<Option<String>>, SetupError> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(Resolved::new(None, ResolutionRule::Default)),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(Resolved::new(None, ResolutionRule::Default)),
        Some(Value::String(s)) => Ok(Resolved::new(Some(s.clone()), ResolutionRule::Explicit)),
        Some(other) => Err(SetupError::InvalidParam {
            key: key.to_string(),
            expected: "a string",
            value: other.clone(),
        }),
    }
}

fn flag(params: &BTreeMap<String, Value>, key: &str, default: bool) -> Result<Resolved<bool>, SetupError> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(Resolved::new(default, ResolutionRule::Default)),
        Some(Value::Bool(b)) => Ok(Resolved::new(*b, ResolutionRule::Explicit)),
        Some(Value::String(s)) if s.eq_ignore_ascii_case("true") => {
            Ok(Resolved::new(true, ResolutionRule::Explicit))
        }
        Some(Value::String(s)) if s.eq_ignore_ascii_case("false") => {
            Ok(Resolved::new(false, ResolutionRule::Explicit))
        }
        Some(other) => Err(SetupError::InvalidParam {
            key: key.to_string(),
            expected: "a bool",
            value: other.clone(),
        }),
    }
}

/// Resolve whether a function is bundled with the project source
pub fn resolve_with_repo(explicit: Option<bool>, source: &FunctionSource) -> Resolved<bool> {
    match explicit {
        Some(value) => Resolved::new(value, ResolutionRule::Explicit),
        None if source.is_hub() => Resolved::new(false, ResolutionRule::InferredFromHubReference),
        None => Resolved::new(true, ResolutionRule::InferredFromLocalReference),
    }
}

/// Resolve the image a function (or workflow) runs with
pub fn resolve_image(explicit: Option<&str>, project_default: Option<&str>) -> Resolved<Option<String>> {
    match (explicit, project_default) {
        (Some(image), _) if !image.trim().is_empty() => {
            Resolved::new(Some(image.to_string()), ResolutionRule::Explicit)
        }
        (_, Some(image)) => Resolved::new(Some(image.to_string()), ResolutionRule::InheritedProjectImage),
        _ => Resolved::new(None, ResolutionRule::Default),
    }
}
