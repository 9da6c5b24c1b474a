//! Structured observability hooks for synthesis lifecycle events.
//!
//! - `StackSpan` scopes log lines to one stack
//! - `emit_*` functions log the key lifecycle events at `info!`
//!   (validation failures at `warn!`)

use tracing::info;

/// RAII guard that enters a stack-scoped tracing span.
///
/// ```ignore
/// let _span = StackSpan::enter("BuildPipelineStack");
/// // tracing calls here carry stack = "BuildPipelineStack"
/// ```
pub struct StackSpan {
    _span: tracing::span::EnteredSpan,
}

impl StackSpan {
    pub fn enter(stack: &str) -> Self {
        let span = tracing::info_span!("mlops.stack", stack = %stack);
        Self {
            _span: span.entered(),
        }
    }
}

/// Emit event: a stack graph was built and validated.
pub fn emit_stack_synthesized(stack: &str, resources: usize, notifications: bool) {
    info!(
        event = "stack.synthesized",
        stack = %stack,
        resources = resources,
        notifications = notifications,
    );
}

/// Emit event: one template file written.
pub fn emit_template_written(path: &str, bytes: usize) {
    info!(event = "template.written", path = %path, bytes = bytes);
}

/// Emit event: the assembly manifest was written.
pub fn emit_assembly_written(out_dir: &str, stacks: usize) {
    info!(event = "assembly.written", out_dir = %out_dir, stacks = stacks);
}

/// Emit event: graph validation rejected a stack.
pub fn emit_validation_failed(stack: &str, error: &dyn std::fmt::Display) {
    tracing::warn!(event = "graph.validation_failed", stack = %stack, error = %error);
}
