//! Domain-level error taxonomy for stack synthesis.

/// Errors produced by resource graph validation.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("invalid logical id '{id}': must be non-empty and alphanumeric")]
    InvalidLogicalId { id: String },

    #[error("duplicate logical id: {id}")]
    DuplicateLogicalId { id: String },

    #[error("resource {from} references {to}, which is not in the graph")]
    DanglingReference { from: String, to: String },

    #[error("resource {id} carries permission grants but no role to attach them to")]
    GrantWithoutRole { id: String },

    #[error("duplicate output name: {name}")]
    DuplicateOutput { name: String },

    #[error("invalid pipeline {pipeline}: {reason}")]
    InvalidPipeline { pipeline: String, reason: String },
}

/// Synthesis errors.
#[derive(Debug, thiserror::Error)]
pub enum SynthError {
    #[error("invalid stack name '{0}'")]
    InvalidStackName(String),

    #[error("graph validation failed for stack {stack}: {source}")]
    Validation {
        stack: String,
        #[source]
        source: ValidationError,
    },

    #[error("template for stack {stack} has no canonical form at {path}: {reason}")]
    NonCanonical {
        stack: String,
        path: String,
        reason: String,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for synthesis operations.
pub type Result<T> = std::result::Result<T, SynthError>;
