//! Pipeline stages and actions.
//!
//! A [`PipelineDefinition`] is the typed view of a pipeline descriptor's
//! `Stages` property. Stage order is execution order. Actions in the same
//! stage with the same run order are started in parallel by the provider;
//! for source actions this means any one of them firing starts a run.

use std::collections::HashSet;

use serde_json::{json, Value};

use super::error::ValidationError;
use super::expr::Expr;
use super::resource::LogicalId;

/// A named pipeline artifact passed between actions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Artifact(String);

impl Artifact {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Artifact produced by `action` in `stage`.
    pub fn output_of(stage: &str, action: &str) -> Self {
        Self(format!("Artifact_{}_{}", stage, action))
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    fn to_json(&self) -> Value {
        json!({ "Name": self.0 })
    }
}

/// Category of an action, as the orchestrator sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionCategory {
    Source,
    Build,
    Approval,
}

impl ActionCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionCategory::Source => "Source",
            ActionCategory::Build => "Build",
            ActionCategory::Approval => "Approval",
        }
    }
}

/// Provider-specific action configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionConfig {
    /// Polls a CodeCommit branch.
    CodeCommitSource {
        repository: LogicalId,
        branch: String,
        output: Artifact,
    },
    /// Polls one object key in a versioned bucket.
    S3Source {
        bucket: LogicalId,
        key: String,
        output: Artifact,
    },
    /// Fires when an image tag is pushed to a registry.
    EcrSource {
        repository: LogicalId,
        tag: String,
        output: Artifact,
    },
    /// Blocks until a human approves or rejects.
    ManualApproval {
        notification_topic: Option<LogicalId>,
        notify_emails: Vec<String>,
    },
    /// Runs a build project over an input artifact.
    CodeBuild {
        project: LogicalId,
        input: Artifact,
        outputs: Vec<Artifact>,
    },
}

impl ActionConfig {
    pub fn category(&self) -> ActionCategory {
        match self {
            ActionConfig::CodeCommitSource { .. }
            | ActionConfig::S3Source { .. }
            | ActionConfig::EcrSource { .. } => ActionCategory::Source,
            ActionConfig::ManualApproval { .. } => ActionCategory::Approval,
            ActionConfig::CodeBuild { .. } => ActionCategory::Build,
        }
    }

    pub fn provider(&self) -> &'static str {
        match self {
            ActionConfig::CodeCommitSource { .. } => "CodeCommit",
            ActionConfig::S3Source { .. } => "S3",
            ActionConfig::EcrSource { .. } => "ECR",
            ActionConfig::ManualApproval { .. } => "Manual",
            ActionConfig::CodeBuild { .. } => "CodeBuild",
        }
    }

    pub fn input_artifacts(&self) -> Vec<&Artifact> {
        match self {
            ActionConfig::CodeBuild { input, .. } => vec![input],
            _ => Vec::new(),
        }
    }

    pub fn output_artifacts(&self) -> Vec<&Artifact> {
        match self {
            ActionConfig::CodeCommitSource { output, .. }
            | ActionConfig::S3Source { output, .. }
            | ActionConfig::EcrSource { output, .. } => vec![output],
            ActionConfig::CodeBuild { outputs, .. } => outputs.iter().collect(),
            ActionConfig::ManualApproval { .. } => Vec::new(),
        }
    }

    /// Graph resources the action is wired to.
    pub fn references(&self) -> Vec<&LogicalId> {
        match self {
            ActionConfig::CodeCommitSource { repository, .. }
            | ActionConfig::EcrSource { repository, .. } => vec![repository],
            ActionConfig::S3Source { bucket, .. } => vec![bucket],
            ActionConfig::CodeBuild { project, .. } => vec![project],
            ActionConfig::ManualApproval {
                notification_topic, ..
            } => notification_topic.iter().collect(),
        }
    }

    fn configuration(&self) -> Value {
        match self {
            ActionConfig::CodeCommitSource {
                repository, branch, ..
            } => json!({
                "RepositoryName": Expr::get_att(repository, "Name"),
                "BranchName": branch,
                "PollForSourceChanges": true,
            }),
            ActionConfig::S3Source { bucket, key, .. } => json!({
                "S3Bucket": Expr::reference(bucket),
                "S3ObjectKey": key,
                "PollForSourceChanges": true,
            }),
            ActionConfig::EcrSource {
                repository, tag, ..
            } => json!({
                "RepositoryName": Expr::reference(repository),
                "ImageTag": tag,
            }),
            ActionConfig::ManualApproval {
                notification_topic,
                notify_emails,
            } => {
                let mut config = json!({});
                if let Some(topic) = notification_topic {
                    config["NotificationArn"] = Expr::reference(topic).to_json();
                }
                // Shown to the reviewer in the approval request.
                if !notify_emails.is_empty() {
                    let reviewers = notify_emails.join(", ");
                    config["CustomData"] =
                        Value::String(format!("Approval requested from {}", reviewers));
                }
                config
            }
            ActionConfig::CodeBuild { project, .. } => json!({
                "ProjectName": Expr::reference(project),
            }),
        }
    }
}

/// One action within a stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineAction {
    pub name: String,
    pub config: ActionConfig,
    pub run_order: u32,
}

impl PipelineAction {
    pub fn new(name: impl Into<String>, config: ActionConfig) -> Self {
        Self {
            name: name.into(),
            config,
            run_order: 1,
        }
    }

    pub fn to_json(&self) -> Value {
        let mut action = json!({
            "Name": self.name,
            "ActionTypeId": {
                "Category": self.config.category().as_str(),
                "Owner": "AWS",
                "Provider": self.config.provider(),
                "Version": "1",
            },
            "Configuration": self.config.configuration(),
            "RunOrder": self.run_order,
        });
        let inputs = self.config.input_artifacts();
        if !inputs.is_empty() {
            action["InputArtifacts"] = inputs.iter().map(|a| a.to_json()).collect();
        }
        let outputs = self.config.output_artifacts();
        if !outputs.is_empty() {
            action["OutputArtifacts"] = outputs.iter().map(|a| a.to_json()).collect();
        }
        action
    }
}

/// An ordered phase of a pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineStage {
    pub name: String,
    pub actions: Vec<PipelineAction>,
}

impl PipelineStage {
    pub fn new(name: impl Into<String>, actions: Vec<PipelineAction>) -> Self {
        Self {
            name: name.into(),
            actions,
        }
    }

    pub fn to_json(&self) -> Value {
        json!({
            "Name": self.name,
            "Actions": self.actions.iter().map(PipelineAction::to_json).collect::<Vec<_>>(),
        })
    }
}

/// Typed pipeline layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineDefinition {
    pub logical_id: LogicalId,
    pub name: String,
    pub stages: Vec<PipelineStage>,
}

impl PipelineDefinition {
    pub fn new(logical_id: LogicalId, name: impl Into<String>) -> Self {
        Self {
            logical_id,
            name: name.into(),
            stages: Vec::new(),
        }
    }

    pub fn add_stage(&mut self, stage: PipelineStage) -> &mut Self {
        self.stages.push(stage);
        self
    }

    pub fn stage(&self, name: &str) -> Option<&PipelineStage> {
        self.stages.iter().find(|s| s.name == name)
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn actions(&self) -> impl Iterator<Item = &PipelineAction> {
        self.stages.iter().flat_map(|s| s.actions.iter())
    }

    pub fn stages_json(&self) -> Value {
        Value::Array(self.stages.iter().map(PipelineStage::to_json).collect())
    }

    /// Structural checks the orchestrator would otherwise reject at deploy
    /// time: at least two stages, sources only in (and all of) the first
    /// stage, unique names, and every input artifact produced by an earlier
    /// stage.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let invalid = |reason: String| ValidationError::InvalidPipeline {
            pipeline: self.name.clone(),
            reason,
        };

        if self.stages.len() < 2 {
            return Err(invalid("a pipeline needs at least two stages".to_string()));
        }

        let mut stage_names = HashSet::new();
        let mut action_names = HashSet::new();
        let mut produced: HashSet<&Artifact> = HashSet::new();

        for (idx, stage) in self.stages.iter().enumerate() {
            if !stage_names.insert(stage.name.as_str()) {
                return Err(invalid(format!("duplicate stage '{}'", stage.name)));
            }
            if stage.actions.is_empty() {
                return Err(invalid(format!("stage '{}' has no actions", stage.name)));
            }

            let mut stage_outputs = Vec::new();
            for action in &stage.actions {
                if !action_names.insert(action.name.as_str()) {
                    return Err(invalid(format!("duplicate action '{}'", action.name)));
                }
                let is_source = action.config.category() == ActionCategory::Source;
                if (idx == 0) != is_source {
                    return Err(invalid(format!(
                        "action '{}' in stage '{}': source actions belong only in the first stage",
                        action.name, stage.name
                    )));
                }
                for input in action.config.input_artifacts() {
                    if !produced.contains(input) {
                        return Err(invalid(format!(
                            "action '{}' consumes '{}', which no earlier stage produces",
                            action.name,
                            input.name()
                        )));
                    }
                }
                stage_outputs.extend(action.config.output_artifacts());
            }
            produced.extend(stage_outputs);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn git_source(output: &Artifact) -> PipelineAction {
        PipelineAction::new(
            "Git",
            ActionConfig::CodeCommitSource {
                repository: LogicalId::new("Repo"),
                branch: "main".to_string(),
                output: output.clone(),
            },
        )
    }

    fn build(input: &Artifact) -> PipelineAction {
        PipelineAction::new(
            "Compile",
            ActionConfig::CodeBuild {
                project: LogicalId::new("Project"),
                input: input.clone(),
                outputs: vec![Artifact::output_of("Build", "Compile")],
            },
        )
    }

    #[test]
    fn test_valid_two_stage_pipeline() {
        let src = Artifact::output_of("Source", "Git");
        let mut def = PipelineDefinition::new(LogicalId::new("Pipeline"), "p");
        def.add_stage(PipelineStage::new("Source", vec![git_source(&src)]))
            .add_stage(PipelineStage::new("Build", vec![build(&src)]));
        def.validate().expect("valid pipeline");
        assert_eq!(def.stage_names(), vec!["Source", "Build"]);
    }

    #[test]
    fn test_unknown_input_artifact_rejected() {
        let src = Artifact::output_of("Source", "Git");
        let mut def = PipelineDefinition::new(LogicalId::new("Pipeline"), "p");
        def.add_stage(PipelineStage::new("Source", vec![git_source(&src)]))
            .add_stage(PipelineStage::new(
                "Build",
                vec![build(&Artifact::new("Nowhere"))],
            ));
        let err = def.validate().expect_err("should reject");
        assert!(err.to_string().contains("Nowhere"));
    }

    #[test]
    fn test_single_stage_rejected() {
        let src = Artifact::output_of("Source", "Git");
        let mut def = PipelineDefinition::new(LogicalId::new("Pipeline"), "p");
        def.add_stage(PipelineStage::new("Source", vec![git_source(&src)]));
        assert!(def.validate().is_err());
    }

    #[test]
    fn test_source_outside_first_stage_rejected() {
        let src = Artifact::output_of("Source", "Git");
        let mut def = PipelineDefinition::new(LogicalId::new("Pipeline"), "p");
        def.add_stage(PipelineStage::new("Source", vec![git_source(&src)]))
            .add_stage(PipelineStage::new(
                "Late",
                vec![PipelineAction::new(
                    "LateGit",
                    ActionConfig::S3Source {
                        bucket: LogicalId::new("Bucket"),
                        key: "k".to_string(),
                        output: Artifact::new("late"),
                    },
                )],
            ));
        assert!(def.validate().is_err());
    }

    #[test]
    fn test_action_json_shape() {
        let src = Artifact::output_of("Source", "Git");
        let json = build(&src).to_json();
        assert_eq!(json["ActionTypeId"]["Category"], "Build");
        assert_eq!(json["ActionTypeId"]["Provider"], "CodeBuild");
        assert_eq!(json["InputArtifacts"][0]["Name"], "Artifact_Source_Git");
        assert_eq!(json["Configuration"]["ProjectName"], json!({ "Ref": "Project" }));
        assert_eq!(json["RunOrder"], 1);
    }

    #[test]
    fn test_approval_without_topic_has_empty_configuration() {
        let action = PipelineAction::new(
            "Approve",
            ActionConfig::ManualApproval {
                notification_topic: None,
                notify_emails: Vec::new(),
            },
        );
        let json = action.to_json();
        assert_eq!(json["Configuration"], json!({}));
        assert!(json.get("OutputArtifacts").is_none());
    }

    #[test]
    fn test_approval_renders_topic_and_reviewers() {
        let action = PipelineAction::new(
            "Approve",
            ActionConfig::ManualApproval {
                notification_topic: Some(LogicalId::new("ApproveTopic")),
                notify_emails: vec!["a@b.com".to_string(), "c@d.com".to_string()],
            },
        );
        assert_eq!(
            action.to_json()["Configuration"],
            json!({
                "NotificationArn": { "Ref": "ApproveTopic" },
                "CustomData": "Approval requested from a@b.com, c@d.com",
            })
        );
    }
}
