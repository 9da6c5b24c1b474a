//! Train pipeline: code, data and image sources → SageMaker training job.

use mlops_core::domain::policy::{assume_role_policy, managed_policy_arn};
use mlops_core::{
    ActionConfig, Artifact, Expr, LogicalId, PermissionGrant, PipelineAction,
    PipelineDefinition, PipelineStage, ResourceDescriptor, ResourceGraph, ResourceKind,
    StackScope, StackSpan, SynthError, SynthesizedStack,
};
use serde_json::{json, Value};

use crate::constructs::{self, BuildProject};
use crate::events::{self, StateChangeAlerts};
use crate::permissions;
use crate::props::TrainPipelineProps;

pub const IMAGE_REPOSITORY_ID: &str = "MlopsDevOpsImageRepo";
pub const DATA_BUCKET_ID: &str = "DataLakeStarter";
pub const EXECUTION_ROLE_ID: &str = "SagemakerExecutionRole";
pub const EXECUTION_ROLE_NAME: &str = "SageMakerExecutionRole";
pub const REPOSITORY_ID: &str = "MlopsTrainSourceRepo";
pub const PROJECT_ID: &str = "MlopsTrainBuild";
pub const PIPELINE_ID: &str = "MlopsTrainPipeline";

pub const SOURCE_STAGE: &str = "Source";
pub const GIT_ACTION: &str = "TrainOfCodeCommit";
pub const DATA_ACTION: &str = "TrainOfData";
pub const IMAGE_ACTION: &str = "TrainOfImage";
pub const BUILD_STAGE: &str = "Build";
pub const BUILD_ACTION: &str = "TrainBuild";

/// Object whose new versions retrain the model.
pub const DATA_KEY: &str = "iris/input/iris.csv";
/// Image tag whose pushes retrain the model.
pub const IMAGE_TAG: &str = "latest";

/// Synthesizer for the train pipeline stack.
pub struct TrainPipelineStack;

impl TrainPipelineStack {
    pub const DEFAULT_NAME: &'static str = "TrainPipelineStack";

    /// Build the stack graph.
    ///
    /// A push to the code repository, a new version of [`DATA_KEY`] or a
    /// push of [`IMAGE_TAG`] each start the pipeline.
    pub fn synthesize(
        scope: &StackScope,
        props: &TrainPipelineProps,
    ) -> Result<SynthesizedStack, SynthError> {
        let _span = StackSpan::enter(scope.stack_name());
        let env = scope.environment();
        let p = &props.pipeline;
        let mut builder = ResourceGraph::builder();

        let images = builder.add(
            ResourceDescriptor::new(IMAGE_REPOSITORY_ID, ResourceKind::EcrRepository)
                .with_property("RepositoryName", props.image_repository_name.as_str()),
        );

        let data_bucket = builder.add(
            ResourceDescriptor::new(DATA_BUCKET_ID, ResourceKind::S3Bucket)
                .with_property("BucketName", data_bucket_name(scope))
                .with_property("VersioningConfiguration", json!({ "Status": "Enabled" })),
        );

        let managed: Vec<Value> = permissions::SAGEMAKER_EXECUTION_MANAGED_POLICIES
            .iter()
            .map(|name| managed_policy_arn(name).to_json())
            .collect();
        builder.add(
            ResourceDescriptor::new(EXECUTION_ROLE_ID, ResourceKind::IamRole)
                .with_property("RoleName", EXECUTION_ROLE_NAME)
                .with_property(
                    "AssumeRolePolicyDocument",
                    assume_role_policy("sagemaker.amazonaws.com"),
                )
                .with_property("ManagedPolicyArns", managed),
        );

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
                    PermissionGrant::on_resource(
                        Expr::get_att(&data_bucket, "Arn"),
                        permissions::S3_ALL.iter().copied(),
                    ),
                    PermissionGrant::on_all(permissions::SAGEMAKER_TRAIN.iter().copied()),
                ],
            },
        );

        let git_output = Artifact::output_of(SOURCE_STAGE, GIT_ACTION);
        let mut pipeline = PipelineDefinition::new(pipeline_id.clone(), p.pipeline_name.clone());
        pipeline
            .add_stage(PipelineStage::new(
                SOURCE_STAGE,
                vec![
                    PipelineAction::new(
                        GIT_ACTION,
                        ActionConfig::CodeCommitSource {
                            repository: repository.clone(),
                            branch: p.branch.clone(),
                            output: git_output.clone(),
                        },
                    ),
                    PipelineAction::new(
                        DATA_ACTION,
                        ActionConfig::S3Source {
                            bucket: data_bucket,
                            key: DATA_KEY.to_string(),
                            output: Artifact::output_of(SOURCE_STAGE, DATA_ACTION),
                        },
                    ),
                    PipelineAction::new(
                        IMAGE_ACTION,
                        ActionConfig::EcrSource {
                            repository: images.clone(),
                            tag: IMAGE_TAG.to_string(),
                            output: Artifact::output_of(SOURCE_STAGE, IMAGE_ACTION),
                        },
                    ),
                ],
            ))
            .add_stage(PipelineStage::new(
                BUILD_STAGE,
                vec![PipelineAction::new(
                    BUILD_ACTION,
                    ActionConfig::CodeBuild {
                        project,
                        input: git_output,
                        outputs: vec![Artifact::output_of(BUILD_STAGE, BUILD_ACTION)],
                    },
                )],
            ));
        constructs::pipeline(&mut builder, &pipeline, &artifacts);
        events::image_push_trigger(
            &mut builder,
            env,
            &pipeline_id,
            IMAGE_ACTION,
            &images,
            IMAGE_TAG,
        );

        let alerts = StateChangeAlerts::add(
            &mut builder,
            env,
            &pipeline_id,
            p.notifications_email.as_deref(),
        );

        let outputs = constructs::clone_url_outputs("Train", &repository);
        constructs::assemble(scope, builder, pipeline, outputs, alerts.is_some())
    }
}

/// `sagemaker-datalake-<region>-<account>`; unset parts resolve at deploy
/// time.
fn data_bucket_name(scope: &StackScope) -> Expr {
    let env = scope.environment();
    Expr::join([
        Expr::lit("sagemaker-datalake-"),
        env.region_expr(),
        Expr::lit("-"),
        env.account_expr(),
    ])
}
