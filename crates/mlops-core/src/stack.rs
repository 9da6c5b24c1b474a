//! Synthesized stack: the immutable result of one synthesizer call.

use std::collections::HashSet;

use serde_json::Value;

use crate::domain::digest;
use crate::domain::error::{Result, SynthError, ValidationError};
use crate::domain::expr::Expr;
use crate::domain::graph::{GraphBuilder, ResourceGraph};
use crate::domain::pipeline::PipelineDefinition;
use crate::scope::{Environment, StackScope};
use crate::template;

/// Informational output value exposed next to the graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackOutput {
    pub name: String,
    pub description: String,
    pub value: Expr,
}

impl StackOutput {
    pub fn new(name: impl Into<String>, description: impl Into<String>, value: Expr) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            value,
        }
    }
}

/// Resource graph plus outputs for one stack.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesizedStack {
    name: String,
    environment: Environment,
    graph: ResourceGraph,
    pipeline: PipelineDefinition,
    outputs: Vec<StackOutput>,
}

impl SynthesizedStack {
    /// Freeze the builder and check the result.
    ///
    /// Fails if the graph has dangling references or duplicate ids, if the
    /// pipeline is malformed or not backed by a graph descriptor, or if an
    /// output name repeats or points outside the graph.
    pub fn assemble(
        scope: &StackScope,
        builder: GraphBuilder,
        pipeline: PipelineDefinition,
        outputs: Vec<StackOutput>,
    ) -> Result<Self> {
        let stack = scope.stack_name().to_string();
        let fail = |source: ValidationError| SynthError::Validation {
            stack: stack.clone(),
            source,
        };

        let graph = builder.build().map_err(fail)?;
        pipeline.validate().map_err(fail)?;

        let mut pipeline_refs = vec![&pipeline.logical_id];
        for action in pipeline.actions() {
            pipeline_refs.extend(action.config.references());
        }
        for target in pipeline_refs {
            if !graph.contains(target) {
                return Err(fail(ValidationError::DanglingReference {
                    from: pipeline.logical_id.to_string(),
                    to: target.to_string(),
                }));
            }
        }

        let mut names = HashSet::new();
        for output in &outputs {
            if !names.insert(output.name.as_str()) {
                return Err(fail(ValidationError::DuplicateOutput {
                    name: output.name.clone(),
                }));
            }
            for target in output.value.references() {
                if !graph.contains(target) {
                    return Err(fail(ValidationError::DanglingReference {
                        from: output.name.clone(),
                        to: target.to_string(),
                    }));
                }
            }
        }

        Ok(Self {
            name: stack,
            environment: scope.environment().clone(),
            graph,
            pipeline,
            outputs,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn graph(&self) -> &ResourceGraph {
        &self.graph
    }

    pub fn pipeline(&self) -> &PipelineDefinition {
        &self.pipeline
    }

    pub fn outputs(&self) -> &[StackOutput] {
        &self.outputs
    }

    pub fn output(&self, name: &str) -> Option<&StackOutput> {
        self.outputs.iter().find(|o| o.name == name)
    }

    /// Render the deployable template.
    pub fn template(&self) -> Value {
        template::render(self)
    }

    /// Canonical SHA-256 digest of the rendered template.
    pub fn digest(&self) -> Result<String> {
        digest::template_digest(self.name(), &self.template())
    }
}
