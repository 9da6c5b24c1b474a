//! MLOps Stacks - build, train and deploy pipeline synthesizers
//!
//! Each synthesizer takes a [`StackScope`] and a props record and returns an
//! immutable [`SynthesizedStack`]. Synthesizers share no state and may run
//! concurrently.

pub mod build;
pub mod constructs;
pub mod context;
pub mod deploy;
pub mod events;
pub mod permissions;
pub mod props;
pub mod train;

use std::fmt;
use std::str::FromStr;

use mlops_core::{Environment, StackScope, SynthError, SynthesizedStack};

// Re-export key types
pub use build::BuildPipelineStack;
pub use context::{Context, ContextError};
pub use deploy::DeployPipelineStack;
pub use events::StateChangeAlerts;
pub use props::{BuildPipelineProps, DeployPipelineProps, PipelineProps, TrainPipelineProps};
pub use train::TrainPipelineStack;

/// Errors from synthesizing a stack out of context.
#[derive(Debug, thiserror::Error)]
pub enum StackError {
    #[error(transparent)]
    Context(#[from] ContextError),

    #[error(transparent)]
    Synth(#[from] SynthError),

    #[error("unknown stack: {0} (expected one of: {})", StackKind::names().join(", "))]
    UnknownStack(String),
}

/// The stacks this crate can synthesize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StackKind {
    Build,
    Train,
    Deploy,
}

impl StackKind {
    pub const ALL: [StackKind; 3] = [StackKind::Build, StackKind::Train, StackKind::Deploy];

    /// Stack name used when no other is given.
    pub fn default_name(&self) -> &'static str {
        match self {
            StackKind::Build => BuildPipelineStack::DEFAULT_NAME,
            StackKind::Train => TrainPipelineStack::DEFAULT_NAME,
            StackKind::Deploy => DeployPipelineStack::DEFAULT_NAME,
        }
    }

    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(StackKind::default_name).collect()
    }

    /// Read this stack's props from `ctx` and synthesize it into `env`.
    pub fn synthesize(
        &self,
        ctx: &Context,
        env: &Environment,
    ) -> Result<SynthesizedStack, StackError> {
        let scope = StackScope::new(self.default_name(), env.clone())?;
        let stack = match self {
            StackKind::Build => {
                BuildPipelineStack::synthesize(&scope, &BuildPipelineProps::from_context(ctx)?)?
            }
            StackKind::Train => {
                TrainPipelineStack::synthesize(&scope, &TrainPipelineProps::from_context(ctx)?)?
            }
            StackKind::Deploy => {
                DeployPipelineStack::synthesize(&scope, &DeployPipelineProps::from_context(ctx)?)?
            }
        };
        Ok(stack)
    }
}

impl fmt::Display for StackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.default_name())
    }
}

impl FromStr for StackKind {
    type Err = StackError;

    /// Accepts the full stack name or the short kind, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        StackKind::ALL
            .iter()
            .copied()
            .find(|kind| {
                let full = kind.default_name().to_ascii_lowercase();
                full == wanted || full.trim_end_matches("pipelinestack") == wanted
            })
            .ok_or_else(|| StackError::UnknownStack(s.to_string()))
    }
}

/// Synthesize `kinds` in order, stopping at the first failure.
pub fn synthesize_all(
    kinds: &[StackKind],
    ctx: &Context,
    env: &Environment,
) -> Result<Vec<SynthesizedStack>, StackError> {
    kinds.iter().map(|kind| kind.synthesize(ctx, env)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stack_kind_parse() {
        assert_eq!("build".parse::<StackKind>().ok(), Some(StackKind::Build));
        assert_eq!(
            "TrainPipelineStack".parse::<StackKind>().ok(),
            Some(StackKind::Train)
        );
        assert_eq!("DEPLOY".parse::<StackKind>().ok(), Some(StackKind::Deploy));
        let err = "serve".parse::<StackKind>().expect_err("unknown");
        assert!(err.to_string().contains("BuildPipelineStack"));
    }

    #[test]
    fn test_missing_context_surfaces_key() {
        let err = StackKind::Build
            .synthesize(&Context::new(), &Environment::agnostic())
            .expect_err("empty context");
        assert!(matches!(err, StackError::Context(ContextError::Missing { .. })));
    }
}
