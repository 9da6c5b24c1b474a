//! Deploy pipeline: source → manual approval → endpoint rollout.

use mlops_core::{
    ActionConfig, Artifact, LogicalId, PermissionGrant, PipelineAction, PipelineDefinition,
    PipelineStage, ResourceGraph, StackScope, StackSpan, SynthError, SynthesizedStack,
};

use crate::constructs::{self, BuildProject};
use crate::events::{self, StateChangeAlerts};
use crate::permissions;
use crate::props::DeployPipelineProps;

pub const REPOSITORY_ID: &str = "MlopsDeploySourceRepo";
pub const PROJECT_ID: &str = "MlopsDeployBuild";
pub const PIPELINE_ID: &str = "MlopsDeployPipeline";

pub const SOURCE_STAGE: &str = "Source";
pub const SOURCE_ACTION: &str = "DeployOfCodeCommit";
pub const APPROVE_STAGE: &str = "Approve";
pub const APPROVE_ACTION: &str = "DeployApproval";
pub const BUILD_STAGE: &str = "Build";
pub const BUILD_ACTION: &str = "DeployBuild";

/// Synthesizer for the deploy pipeline stack.
pub struct DeployPipelineStack;

impl DeployPipelineStack {
    pub const DEFAULT_NAME: &'static str = "DeployPipelineStack";

    pub fn synthesize(
        scope: &StackScope,
        props: &DeployPipelineProps,
    ) -> Result<SynthesizedStack, SynthError> {
        let _span = StackSpan::enter(scope.stack_name());
        let env = scope.environment();
        let p = &props.pipeline;
        let mut builder = ResourceGraph::builder();

        let repository =
            constructs::source_repository(&mut builder, REPOSITORY_ID, &p.repository_name);
        let pipeline_id = LogicalId::new(PIPELINE_ID);
        let artifacts = constructs::artifacts_bucket(&mut builder, &pipeline_id);

        let project = constructs::build_project(
            &mut builder,
            env,
            BuildProject {
                id: PROJECT_ID,
                project_name: &p.build_project_name,
                artifacts_bucket: &artifacts,
                grants: vec![
                    constructs::codecommit_pull_grant(&repository),
                    PermissionGrant::on_all(permissions::SAGEMAKER_DEPLOY.iter().copied()),
                ],
            },
        );

        // Approval topic ids hang off the pipeline and action names.
        let notification_topic = props.approval_email.as_deref().map(|email| {
            let prefix = pipeline_id.child(&format!("{}{}", APPROVE_STAGE, APPROVE_ACTION));
            events::approval_topic(&mut builder, &prefix, email)
        });
        let notify_emails: Vec<String> = props.approval_email.iter().cloned().collect();

        let source_output = Artifact::output_of(SOURCE_STAGE, SOURCE_ACTION);
        let mut pipeline = PipelineDefinition::new(pipeline_id.clone(), p.pipeline_name.clone());
        pipeline
            .add_stage(PipelineStage::new(
                SOURCE_STAGE,
                vec![PipelineAction::new(
                    SOURCE_ACTION,
                    ActionConfig::CodeCommitSource {
                        repository: repository.clone(),
                        branch: p.branch.clone(),
                        output: source_output.clone(),
                    },
                )],
            ))
            .add_stage(PipelineStage::new(
                APPROVE_STAGE,
                vec![PipelineAction::new(
                    APPROVE_ACTION,
                    ActionConfig::ManualApproval {
                        notification_topic,
                        notify_emails,
                    },
                )],
            ))
            .add_stage(PipelineStage::new(
                BUILD_STAGE,
                vec![PipelineAction::new(
                    BUILD_ACTION,
                    ActionConfig::CodeBuild {
                        project,
                        input: source_output,
                        outputs: vec![Artifact::output_of(BUILD_STAGE, BUILD_ACTION)],
                    },
                )],
            ));
        constructs::pipeline(&mut builder, &pipeline, &artifacts);

        let alerts = StateChangeAlerts::add(
            &mut builder,
            env,
            &pipeline_id,
            p.notifications_email.as_deref(),
        );

        let outputs = constructs::clone_url_outputs("Deploy", &repository);
        constructs::assemble(scope, builder, pipeline, outputs, alerts.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mlops_core::Environment;

    use crate::props::PipelineProps;

    fn scope() -> StackScope {
        StackScope::new(DeployPipelineStack::DEFAULT_NAME, Environment::agnostic()).expect("scope")
    }

    #[test]
    fn test_silent_approval_without_address() {
        let props = DeployPipelineProps {
            pipeline: PipelineProps::new("d", "main", "db", "dp"),
            approval_email: None,
        };
        let stack = DeployPipelineStack::synthesize(&scope(), &props).expect("synth");
        let approve = stack.pipeline().stage(APPROVE_STAGE).expect("approve stage");
        match &approve.actions[0].config {
            ActionConfig::ManualApproval {
                notification_topic,
                notify_emails,
            } => {
                assert!(notification_topic.is_none());
                assert!(notify_emails.is_empty());
            }
            other => panic!("unexpected action: {:?}", other),
        }
        assert_eq!(stack.graph().count(mlops_core::ResourceKind::SnsTopic), 0);
    }
}
