//! Per-stack configuration records.
//!
//! Each props struct is read from context keys named after the stack
//! (`build_*`, `train_*`, `deploy_*`). Only presence of the required names
//! is checked here; anything else is left to the provider.

use serde::{Deserialize, Serialize};

use crate::context::{Context, ContextError};

/// Inputs shared by all three pipelines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineProps {
    pub repository_name: String,
    pub branch: String,
    pub build_project_name: String,
    pub pipeline_name: String,
    /// Pipeline state-change alerts go here; `None` disables them.
    pub notifications_email: Option<String>,
}

impl PipelineProps {
    pub fn new(
        repository_name: impl Into<String>,
        branch: impl Into<String>,
        build_project_name: impl Into<String>,
        pipeline_name: impl Into<String>,
    ) -> Self {
        Self {
            repository_name: repository_name.into(),
            branch: branch.into(),
            build_project_name: build_project_name.into(),
            pipeline_name: pipeline_name.into(),
            notifications_email: None,
        }
    }

    /// Set the alert address. Blank input disables alerts.
    pub fn with_notifications_email(mut self, email: impl Into<String>) -> Self {
        let email = email.into();
        self.notifications_email = if email.trim().is_empty() {
            None
        } else {
            Some(email.trim().to_string())
        };
        self
    }

    fn from_context(ctx: &Context, prefix: &str) -> Result<Self, ContextError> {
        Ok(Self {
            repository_name: ctx.require(&format!("{}_codecommit_repo", prefix))?,
            branch: ctx.require(&format!("{}_codecommit_branch", prefix))?,
            build_project_name: ctx.require(&format!("{}_codebuild_project", prefix))?,
            pipeline_name: ctx.require(&format!("{}_codepipeline_name", prefix))?,
            notifications_email: ctx.optional(&format!("{}_notifications_email", prefix))?,
        })
    }
}

/// Build pipeline inputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildPipelineProps {
    #[serde(flatten)]
    pub pipeline: PipelineProps,
}

impl BuildPipelineProps {
    pub fn from_context(ctx: &Context) -> Result<Self, ContextError> {
        Ok(Self {
            pipeline: PipelineProps::from_context(ctx, "build")?,
        })
    }
}

/// Train pipeline inputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainPipelineProps {
    #[serde(flatten)]
    pub pipeline: PipelineProps,
    /// Name of the image registry created by the stack.
    pub image_repository_name: String,
}

impl TrainPipelineProps {
    pub fn from_context(ctx: &Context) -> Result<Self, ContextError> {
        Ok(Self {
            pipeline: PipelineProps::from_context(ctx, "train")?,
            image_repository_name: ctx.require("ecr_repo")?,
        })
    }
}

/// Deploy pipeline inputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployPipelineProps {
    #[serde(flatten)]
    pub pipeline: PipelineProps,
    /// Notified when the approval gate is reached; `None` means the gate
    /// waits silently.
    pub approval_email: Option<String>,
}

impl DeployPipelineProps {
    pub fn from_context(ctx: &Context) -> Result<Self, ContextError> {
        Ok(Self {
            pipeline: PipelineProps::from_context(ctx, "deploy")?,
            approval_email: ctx.optional("deploy_approval_email")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_context() -> Context {
        let mut ctx = Context::new();
        ctx.set("build_codecommit_repo", "foo")
            .set("build_codecommit_branch", "master")
            .set("build_codebuild_project", "foo-build")
            .set("build_codepipeline_name", "foo-pipeline");
        ctx
    }

    #[test]
    fn test_build_props_from_context() {
        let props = BuildPipelineProps::from_context(&build_context()).expect("props");
        assert_eq!(props.pipeline.repository_name, "foo");
        assert_eq!(props.pipeline.branch, "master");
        assert_eq!(props.pipeline.notifications_email, None);
    }

    #[test]
    fn test_missing_required_key_is_fatal() {
        let mut ctx = build_context();
        ctx.set("build_codepipeline_name", "");
        let err = BuildPipelineProps::from_context(&ctx).expect_err("missing");
        assert!(matches!(
            err,
            ContextError::Missing { ref key } if key == "build_codepipeline_name"
        ));
    }

    #[test]
    fn test_train_requires_registry_name() {
        let mut ctx = Context::new();
        ctx.set("train_codecommit_repo", "t")
            .set("train_codecommit_branch", "main")
            .set("train_codebuild_project", "tb")
            .set("train_codepipeline_name", "tp");
        assert!(TrainPipelineProps::from_context(&ctx).is_err());
        ctx.set("ecr_repo", "images");
        let props = TrainPipelineProps::from_context(&ctx).expect("props");
        assert_eq!(props.image_repository_name, "images");
    }

    #[test]
    fn test_blank_notification_email_disables_alerts() {
        let props = PipelineProps::new("r", "b", "p", "n").with_notifications_email("  ");
        assert_eq!(props.notifications_email, None);
        let props = props.with_notifications_email("a@b.com");
        assert_eq!(props.notifications_email.as_deref(), Some("a@b.com"));
    }
}
