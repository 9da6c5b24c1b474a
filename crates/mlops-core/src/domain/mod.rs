//! Domain model for stack synthesis.
//!
//! - `Expr`: template values, literal or deploy-time resolved
//! - `ResourceDescriptor`: one declared cloud resource
//! - `PermissionGrant`: allow-rules attached to a grantee
//! - `PipelineDefinition`: ordered stages of actions
//! - `ResourceGraph`: validated set of descriptors with resolvable references

pub mod digest;
pub mod error;
pub mod expr;
pub mod graph;
pub mod pipeline;
pub mod policy;
pub mod resource;

pub use error::{Result, SynthError, ValidationError};
pub use expr::{Expr, Pseudo};
pub use graph::{GraphBuilder, ResourceGraph};
pub use pipeline::{
    ActionCategory, ActionConfig, Artifact, PipelineAction, PipelineDefinition, PipelineStage,
};
pub use policy::{GrantScope, PermissionGrant};
pub use resource::{LogicalId, ResourceDescriptor, ResourceKind};
