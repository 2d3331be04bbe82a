//! Guard condition model

use crate::core::context::PipelineContext;
use crate::core::pipeline::PipelineError;
use serde::{Deserialize, Serialize};

/// Boolean guard over a pipeline parameter
///
/// Steps under a guard are part of the execution graph only when the
/// bound value of `param` equals `equals`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Guard {
    /// Name of the boolean pipeline parameter
    pub param: String,

    /// Value the parameter must have for the guarded steps to run
    #[serde(default = "default_equals")]
    pub equals: bool,
}

fn default_equals() -> bool {
    true
}

impl Guard {
    /// Guard that passes when `param` is true
    pub fn is_true(param: impl Into<String>) -> Self {
        Self {
            param: param.into(),
            equals: true,
        }
    }

    /// Evaluate the guard against bound arguments
    pub fn evaluate(&self, context: &PipelineContext) -> Result<bool, PipelineError> {
        match context.get_argument(&self.param) {
            None => Err(PipelineError::UnknownGuardParameter {
                param: self.param.clone(),
            }),
            Some(value) => value
                .as_bool()
                .map(|v| v == self.equals)
                .ok_or_else(|| PipelineError::NonBooleanGuard {
                    param: self.param.clone(),
                }),
        }
    }
}
