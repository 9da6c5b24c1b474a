//! MLOps Core Library
//!
//! Resource graph model, validation, template rendering and assembly output
//! shared by the pipeline stacks.

pub mod assembly;
pub mod domain;
pub mod obs;
pub mod scope;
pub mod stack;
pub mod telemetry;
pub mod template;

pub use domain::{
    ActionCategory, ActionConfig, Artifact, Expr, GrantScope, GraphBuilder, LogicalId,
    PermissionGrant, PipelineAction, PipelineDefinition, PipelineStage, Pseudo,
    ResourceDescriptor, ResourceGraph, ResourceKind, Result, SynthError, ValidationError,
};

pub use assembly::{read_manifest, write_assembly, AssemblyManifest, StackArtifact};
pub use obs::{
    emit_assembly_written, emit_stack_synthesized, emit_template_written,
    emit_validation_failed, StackSpan,
};
pub use scope::{Environment, StackScope};
pub use stack::{StackOutput, SynthesizedStack};
pub use telemetry::init_tracing;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
