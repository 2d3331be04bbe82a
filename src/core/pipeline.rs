//! Pipeline domain model
//!
//! A pipeline file declares typed parameters and a list of nodes. A node is
//! either a step or a guarded block whose steps only run when a boolean
//! parameter has the expected value. Resolution binds arguments, prunes
//! guarded blocks, and yields the [`ExecutionGraph`] the external scheduler
//! would receive.

use crate::core::{
    condition::Guard,
    context::{ParamType, PipelineContext},
    step::{InputValue, OutputBinding, OutputRef, StepDefinition},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use thiserror::Error;

/// Errors raised while loading or resolving a pipeline
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Failed to read pipeline file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid pipeline YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Duplicate parameter '{name}'")]
    DuplicateParameter { name: String },

    #[error("Duplicate step '{step}'")]
    DuplicateStep { step: String },

    #[error("Default for parameter '{name}' is not a valid {expected}")]
    InvalidDefault { name: String, expected: ParamType },

    #[error("Unknown parameter '{name}'")]
    UnknownParameter { name: String },

    #[error("Missing value for required parameter '{name}'")]
    MissingArgument { name: String },

    #[error("Argument '{name}' is not a valid {expected}: {value}")]
    TypeMismatch {
        name: String,
        expected: ParamType,
        value: Value,
    },

    #[error("Guard references unknown parameter '{param}'")]
    UnknownGuardParameter { param: String },

    #[error("Guard parameter '{param}' is not a bool")]
    NonBooleanGuard { param: String },

    #[error("Step '{step}' references unknown parameter '{param}'")]
    UnknownParamReference { step: String, param: String },

    #[error("Step '{step}' has malformed output reference '{reference}' (expected step.output)")]
    MalformedOutputReference { step: String, reference: String },

    #[error("Step '{step}' references '{reference}', which is not an output of an earlier step")]
    UnknownOutputReference { step: String, reference: String },

    #[error("Step '{step}' references '{reference}' from outside the guarded block that declares it")]
    GuardedOutputReference { step: String, reference: String },

    #[error("Step '{step}' calls function '{function}', which is not registered in the project")]
    UnknownFunction { step: String, function: String },
}

/// Declared pipeline parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParameterSpec {
    pub name: String,

    #[serde(rename = "type")]
    pub param_type: ParamType,

    /// Default value; parameters without one are required
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

/// Guarded block of nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConditionalBlock {
    pub condition: Guard,
    pub steps: Vec<PipelineNode>,
}

/// A pipeline body entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PipelineNode {
    Conditional(ConditionalBlock),
    Step(StepDefinition),
}

/// A pipeline definition loaded from YAML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineDefinition {
    /// Pipeline name
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Typed parameters
    #[serde(default)]
    pub parameters: Vec<ParameterSpec>,

    /// Pipeline body
    #[serde(default)]
    pub steps: Vec<PipelineNode>,
}

impl PipelineDefinition {
    /// Load a pipeline definition from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, PipelineError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse a pipeline definition from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, PipelineError> {
        let definition: PipelineDefinition = serde_yaml::from_str(yaml)?;
        definition.validate()?;
        Ok(definition)
    }

    /// Look up a declared parameter
    pub fn parameter(&self, name: &str) -> Option<&ParameterSpec> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// All steps in declaration order, guarded or not
    pub fn all_steps(&self) -> Vec<&StepDefinition> {
        self.scoped_steps().into_iter().map(|(step, _)| step).collect()
    }

    /// Steps in declaration order, each with the chain of guarded blocks
    /// enclosing it (outermost first)
    fn scoped_steps(&self) -> Vec<(&StepDefinition, Vec<usize>)> {
        fn collect<'a>(
            nodes: &'a [PipelineNode],
            scope: &mut Vec<usize>,
            next_block: &mut usize,
            out: &mut Vec<(&'a StepDefinition, Vec<usize>)>,
        ) {
            for node in nodes {
                match node {
                    PipelineNode::Step(step) => out.push((step, scope.clone())),
                    PipelineNode::Conditional(block) => {
                        scope.push(*next_block);
                        *next_block += 1;
                        collect(&block.steps, scope, next_block, out);
                        scope.pop();
                    }
                }
            }
        }

        let mut steps = Vec::new();
        collect(&self.steps, &mut Vec::new(), &mut 0, &mut steps);
        steps
    }

    /// Validate the definition
    ///
    /// Output references must name an output of a step declared earlier in
    /// the file, so a valid definition is acyclic. A step may only consume
    /// outputs of steps whose guards also enclose it, so pruning a guarded
    /// block never leaves a step outside it with a missing input.
    pub fn validate(&self) -> Result<(), PipelineError> {
        let mut seen_params = HashSet::new();
        for param in &self.parameters {
            if !seen_params.insert(param.name.as_str()) {
                return Err(PipelineError::DuplicateParameter {
                    name: param.name.clone(),
                });
            }
            if let Some(default) = &param.default {
                if !param.param_type.accepts(default) {
                    return Err(PipelineError::InvalidDefault {
                        name: param.name.clone(),
                        expected: param.param_type,
                    });
                }
            }
        }

        self.validate_guards(&self.steps)?;

        let mut earlier: HashMap<&str, (&StepDefinition, Vec<usize>)> = HashMap::new();
        for (step, scope) in self.scoped_steps() {
            for param_ref in step.param_refs() {
                if self.parameter(&param_ref.param).is_none() {
                    return Err(PipelineError::UnknownParamReference {
                        step: step.id().to_string(),
                        param: param_ref.param.clone(),
                    });
                }
            }

            for output_ref in step.output_refs() {
                let (from, name) = parse_output_ref(step, output_ref)?;
                let source_scope = match earlier.get(from) {
                    Some((source, source_scope)) if source.declares_output(name) => source_scope,
                    _ => {
                        return Err(PipelineError::UnknownOutputReference {
                            step: step.id().to_string(),
                            reference: output_ref.output.clone(),
                        })
                    }
                };
                if !scope.starts_with(source_scope) {
                    return Err(PipelineError::GuardedOutputReference {
                        step: step.id().to_string(),
                        reference: output_ref.output.clone(),
                    });
                }
            }

            if earlier.insert(step.id(), (step, scope)).is_some() {
                return Err(PipelineError::DuplicateStep {
                    step: step.id().to_string(),
                });
            }
        }

        Ok(())
    }

    fn validate_guards(&self, nodes: &[PipelineNode]) -> Result<(), PipelineError> {
        for node in nodes {
            if let PipelineNode::Conditional(block) = node {
                match self.parameter(&block.condition.param) {
                    None => {
                        return Err(PipelineError::UnknownGuardParameter {
                            param: block.condition.param.clone(),
                        })
                    }
                    Some(spec) if spec.param_type != ParamType::Bool => {
                        return Err(PipelineError::NonBooleanGuard {
                            param: block.condition.param.clone(),
                        })
                    }
                    Some(_) => {}
                }
                self.validate_guards(&block.steps)?;
            }
        }
        Ok(())
    }

    /// Check that every step calls a function accepted by `is_registered`
    pub fn check_functions<F>(&self, is_registered: F) -> Result<(), PipelineError>
    where
        F: Fn(&str) -> bool,
    {
        for step in self.all_steps() {
            if !is_registered(&step.function) {
                return Err(PipelineError::UnknownFunction {
                    step: step.id().to_string(),
                    function: step.function.clone(),
                });
            }
        }
        Ok(())
    }

    /// Bind arguments against the declared parameters.
    ///
    /// Missing arguments fall back to defaults; arguments for undeclared
    /// parameters and values of the wrong type are rejected.
    pub fn bind(&self, arguments: &BTreeMap<String, Value>) -> Result<PipelineContext, PipelineError> {
        if let Some(unknown) = arguments.keys().find(|k| self.parameter(k).is_none()) {
            return Err(PipelineError::UnknownParameter {
                name: unknown.clone(),
            });
        }

        let mut context = PipelineContext::new();
        for param in &self.parameters {
            let value = match arguments.get(&param.name).or(param.default.as_ref()) {
                Some(value) => value.clone(),
                None => {
                    return Err(PipelineError::MissingArgument {
                        name: param.name.clone(),
                    })
                }
            };
            if !param.param_type.accepts(&value) {
                return Err(PipelineError::TypeMismatch {
                    name: param.name.clone(),
                    expected: param.param_type,
                    value,
                });
            }
            context.set_argument(param.name.clone(), value);
        }

        Ok(context)
    }

    /// Resolve the pipeline into the graph of steps that will run
    ///
    /// Steps outside a guarded block are always part of the graph.
    pub fn resolve(&self, arguments: &BTreeMap<String, Value>) -> Result<ExecutionGraph, PipelineError> {
        self.validate()?;
        let context = self.bind(arguments)?;

        let mut included = Vec::new();
        collect_active(&self.steps, &context, &mut included)?;

        let mut steps = HashMap::new();
        let mut declared_order = Vec::new();
        for step in &included {
            let mut inputs = BTreeMap::new();
            let mut depends_on = Vec::new();

            for (key, input) in &step.params {
                let resolved = match input {
                    InputValue::Literal(value) => ResolvedInput::Literal(value.clone()),
                    InputValue::Param(param_ref) => {
                        let value = context.get_argument(&param_ref.param).cloned().ok_or_else(|| {
                            PipelineError::UnknownParamReference {
                                step: step.id().to_string(),
                                param: param_ref.param.clone(),
                            }
                        })?;
                        ResolvedInput::Literal(value)
                    }
                    InputValue::Output(output_ref) => {
                        let (from, _) = parse_output_ref(step, output_ref)?;
                        if !depends_on.iter().any(|d| d == from) {
                            depends_on.push(from.to_string());
                        }
                        ResolvedInput::Output(output_ref.clone())
                    }
                };
                inputs.insert(key.clone(), resolved);
            }

            let resolved = ResolvedStep {
                id: step.id().to_string(),
                function: step.function.clone(),
                handler: step.handler.clone(),
                inputs,
                outputs: step.returns.clone(),
                depends_on,
            };
            declared_order.push(resolved.id.clone());
            steps.insert(resolved.id.clone(), resolved);
        }

        let order = topological_sort(&declared_order, &steps);
        let steps = order
            .into_iter()
            .filter_map(|id| steps.remove(&id))
            .collect();

        Ok(ExecutionGraph {
            pipeline: self.name.clone(),
            arguments: context.arguments,
            steps,
        })
    }
}

fn parse_output_ref<'a>(
    step: &StepDefinition,
    output_ref: &'a OutputRef,
) -> Result<(&'a str, &'a str), PipelineError> {
    output_ref
        .parts()
        .ok_or_else(|| PipelineError::MalformedOutputReference {
            step: step.id().to_string(),
            reference: output_ref.output.clone(),
        })
}

fn collect_active<'a>(
    nodes: &'a [PipelineNode],
    context: &PipelineContext,
    out: &mut Vec<&'a StepDefinition>,
) -> Result<(), PipelineError> {
    for node in nodes {
        match node {
            PipelineNode::Step(step) => out.push(step),
            PipelineNode::Conditional(block) => {
                if block.condition.evaluate(context)? {
                    collect_active(&block.steps, context, out)?;
                }
            }
        }
    }
    Ok(())
}

/// Depth-first topological sort, visiting roots in declaration order
fn topological_sort(declared: &[String], steps: &HashMap<String, ResolvedStep>) -> Vec<String> {
    let mut result = Vec::new();
    let mut visited = HashSet::new();

    for step_id in declared {
        visit(step_id, steps, &mut visited, &mut result);
    }

    result
}

fn visit(
    step_id: &str,
    steps: &HashMap<String, ResolvedStep>,
    visited: &mut HashSet<String>,
    result: &mut Vec<String>,
) {
    if !visited.insert(step_id.to_string()) {
        return;
    }

    if let Some(step) = steps.get(step_id) {
        for dep in &step.depends_on {
            visit(dep, steps, visited, result);
        }
    }

    result.push(step_id.to_string());
}

/// Step input after parameter substitution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResolvedInput {
    Output(OutputRef),
    Literal(Value),
}

/// A step that will run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedStep {
    pub id: String,
    pub function: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handler: Option<String>,
    pub inputs: BTreeMap<String, ResolvedInput>,
    pub outputs: Vec<OutputBinding>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
}

/// Steps that will run for a given set of arguments, in execution order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionGraph {
    pub pipeline: String,
    pub arguments: BTreeMap<String, Value>,
    pub steps: Vec<ResolvedStep>,
}

impl ExecutionGraph {
    /// Get a step by ID
    pub fn step(&self, id: &str) -> Option<&ResolvedStep> {
        self.steps.iter().find(|s| s.id == id)
    }

    /// Check whether a step is part of the graph
    pub fn contains(&self, id: &str) -> bool {
        self.step(id).is_some()
    }

    /// Step IDs in execution order
    pub fn execution_order(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.id.as_str()).collect()
    }
}
