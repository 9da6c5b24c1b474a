//! Build pipeline: source repository → container image build.

use mlops_core::{
    ActionConfig, Artifact, LogicalId, PermissionGrant, PipelineAction, PipelineDefinition,
    PipelineStage, ResourceGraph, StackScope, StackSpan, SynthError, SynthesizedStack,
};

use crate::constructs::{self, BuildProject};
use crate::events::StateChangeAlerts;
use crate::permissions;
use crate::props::BuildPipelineProps;

pub const REPOSITORY_ID: &str = "MlopsBuildSourceRepo";
pub const PROJECT_ID: &str = "MlopsBuildBuild";
pub const PIPELINE_ID: &str = "MlopsBuildPipeline";

pub const SOURCE_STAGE: &str = "GitSource";
pub const SOURCE_ACTION: &str = "MlopsBuildCodeCommit";
pub const BUILD_STAGE: &str = "Build";
pub const BUILD_ACTION: &str = "MlopsBuildBuild";

/// Synthesizer for the build pipeline stack.
pub struct BuildPipelineStack;

impl BuildPipelineStack {
    pub const DEFAULT_NAME: &'static str = "BuildPipelineStack";

    /// Build the stack graph.
    ///
    /// The build project may pull from the source repository and push
    /// images to any registry. State-change alerts are added only when
    /// `notifications_email` is set.
    pub fn synthesize(
        scope: &StackScope,
        props: &BuildPipelineProps,
    ) -> Result<SynthesizedStack, SynthError> {
        let _span = StackSpan::enter(scope.stack_name());
        let env = scope.environment();
        let p = &props.pipeline;
        let mut builder = ResourceGraph::builder();

        let repository =
            constructs::source_repository(&mut builder, REPOSITORY_ID, &p.repository_name);
        let pipeline_id = LogicalId::new(PIPELINE_ID);
        let bucket = constructs::artifacts_bucket(&mut builder, &pipeline_id);

        let project = constructs::build_project(
            &mut builder,
            env,
            BuildProject {
                id: PROJECT_ID,
                project_name: &p.build_project_name,
                artifacts_bucket: &bucket,
                grants: vec![
                    constructs::codecommit_pull_grant(&repository),
                    PermissionGrant::on_all(permissions::ECR_PUSH.iter().copied()),
                ],
            },
        );

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
        constructs::pipeline(&mut builder, &pipeline, &bucket);

        let alerts = StateChangeAlerts::add(
            &mut builder,
            env,
            &pipeline_id,
            p.notifications_email.as_deref(),
        );

        let outputs = constructs::clone_url_outputs("Build", &repository);
        constructs::assemble(scope, builder, pipeline, outputs, alerts.is_some())
    }
}
