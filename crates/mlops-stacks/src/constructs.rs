//! Building blocks shared by the three pipeline stacks.

use mlops_core::domain::policy::{assume_role_policy, policy_document};
use mlops_core::{
    emit_stack_synthesized, emit_validation_failed, ActionConfig, Environment, Expr,
    GraphBuilder, LogicalId, PermissionGrant, PipelineDefinition, ResourceDescriptor,
    ResourceKind, StackOutput, StackScope, SynthError, SynthesizedStack,
};
use serde_json::{json, Value};

use crate::permissions;

pub const BUILD_COMPUTE_TYPE: &str = "BUILD_GENERAL1_SMALL";
pub const BUILD_IMAGE: &str = "aws/codebuild/amazonlinux2-x86_64-standard:3.0";
pub const BUILD_ENVIRONMENT_TYPE: &str = "LINUX_CONTAINER";

/// `AWS::CodeCommit::Repository` named `repository_name`.
pub fn source_repository(builder: &mut GraphBuilder, id: &str, repository_name: &str) -> LogicalId {
    builder.add(
        ResourceDescriptor::new(id, ResourceKind::CodeCommitRepository)
            .with_property("RepositoryName", repository_name),
    )
}

/// Pull access to `repository` for a build project.
pub fn codecommit_pull_grant(repository: &LogicalId) -> PermissionGrant {
    PermissionGrant::on_resource(
        Expr::get_att(repository, "Arn"),
        permissions::CODECOMMIT_PULL.iter().copied(),
    )
}

/// Encrypted, private bucket holding the pipeline's artifacts.
pub fn artifacts_bucket(builder: &mut GraphBuilder, pipeline: &LogicalId) -> LogicalId {
    builder.add(
        ResourceDescriptor::new(pipeline.child("ArtifactsBucket"), ResourceKind::S3Bucket)
            .with_property(
                "BucketEncryption",
                json!({
                    "ServerSideEncryptionConfiguration": [
                        { "ServerSideEncryptionByDefault": { "SSEAlgorithm": "AES256" } }
                    ]
                }),
            )
            .with_property(
                "PublicAccessBlockConfiguration",
                json!({
                    "BlockPublicAcls": true,
                    "BlockPublicPolicy": true,
                    "IgnorePublicAcls": true,
                    "RestrictPublicBuckets": true,
                }),
            ),
    )
}

/// A build project and the service role it runs as.
pub struct BuildProject<'a> {
    pub id: &'a str,
    pub project_name: &'a str,
    pub artifacts_bucket: &'a LogicalId,
    pub grants: Vec<PermissionGrant>,
}

/// Add the project's role (`<id>Role`) and the project itself.
///
/// Logs and artifact-bucket access go on the role inline; `grants` are
/// rendered into the role's default policy.
pub fn build_project(
    builder: &mut GraphBuilder,
    env: &Environment,
    project: BuildProject<'_>,
) -> LogicalId {
    let project_id = LogicalId::new(project.id);
    let role_id = project_id.child("Role");

    let log_group = Expr::join([
        Expr::lit("arn:"),
        Expr::partition(),
        Expr::lit(":logs:"),
        env.region_expr(),
        Expr::lit(":"),
        env.account_expr(),
        Expr::lit(format!(":log-group:/aws/codebuild/{}", project.project_name)),
    ]);
    let log_streams = Expr::join([log_group.clone(), Expr::lit(":*")]);

    let role = builder.add(
        ResourceDescriptor::new(role_id, ResourceKind::IamRole)
            .with_property(
                "AssumeRolePolicyDocument",
                assume_role_policy("codebuild.amazonaws.com"),
            )
            .with_property(
                "Policies",
                json!([
                    {
                        "PolicyName": "CodeBuildLogs",
                        "PolicyDocument": policy_document(vec![statement(
                            permissions::BUILD_LOGS,
                            json!([log_group, log_streams]),
                        )]),
                    },
                    {
                        "PolicyName": "PipelineArtifacts",
                        "PolicyDocument": policy_document(vec![statement(
                            permissions::BUCKET_READ_WRITE,
                            bucket_and_objects(project.artifacts_bucket),
                        )]),
                    },
                ]),
            ),
    );

    let environment_variables = json!([
        { "Name": "AWS_ACCOUNT_ID", "Type": "PLAINTEXT", "Value": env.account_expr() },
        { "Name": "AWS_DEFAULT_REGION", "Type": "PLAINTEXT", "Value": env.region_expr() },
    ]);

    let mut descriptor = ResourceDescriptor::new(project_id, ResourceKind::CodeBuildProject)
        .with_property("Name", project.project_name)
        .with_property("ServiceRole", Expr::get_att(&role, "Arn"))
        .with_property("Source", json!({ "Type": "CODEPIPELINE" }))
        .with_property("Artifacts", json!({ "Type": "CODEPIPELINE" }))
        .with_property(
            "Environment",
            json!({
                "ComputeType": BUILD_COMPUTE_TYPE,
                "Image": BUILD_IMAGE,
                "Type": BUILD_ENVIRONMENT_TYPE,
                "PrivilegedMode": true,
                "ImagePullCredentialsType": "CODEBUILD",
                "EnvironmentVariables": environment_variables,
            }),
        )
        .with_grant_role(&role);
    for grant in project.grants {
        descriptor = descriptor.with_grant(grant);
    }
    builder.add(descriptor)
}

/// Add the pipeline's service role (`<pipeline>Role`) and the pipeline.
///
/// The role is granted exactly what the configured actions touch: the
/// artifact bucket, each source, each build project and any approval topic.
pub fn pipeline(
    builder: &mut GraphBuilder,
    definition: &PipelineDefinition,
    artifacts_bucket: &LogicalId,
) -> LogicalId {
    let role = builder.add(
        ResourceDescriptor::new(definition.logical_id.child("Role"), ResourceKind::IamRole)
            .with_property(
                "AssumeRolePolicyDocument",
                assume_role_policy("codepipeline.amazonaws.com"),
            ),
    );

    let mut descriptor =
        ResourceDescriptor::new(definition.logical_id.clone(), ResourceKind::CodePipeline)
            .with_property("Name", definition.name.as_str())
            .with_property("RoleArn", Expr::get_att(&role, "Arn"))
            .with_property(
                "ArtifactStore",
                json!({ "Type": "S3", "Location": Expr::reference(artifacts_bucket) }),
            )
            .with_property("Stages", definition.stages_json())
            .with_grant_role(&role);
    for grant in pipeline_role_grants(definition, artifacts_bucket) {
        descriptor = descriptor.with_grant(grant);
    }
    builder.add(descriptor)
}

fn pipeline_role_grants(
    definition: &PipelineDefinition,
    artifacts_bucket: &LogicalId,
) -> Vec<PermissionGrant> {
    let mut grants = bucket_grants(artifacts_bucket, permissions::BUCKET_READ_WRITE);
    for action in definition.actions() {
        match &action.config {
            ActionConfig::CodeCommitSource { repository, .. } => {
                grants.push(PermissionGrant::on_resource(
                    Expr::get_att(repository, "Arn"),
                    permissions::PIPELINE_CODECOMMIT_SOURCE.iter().copied(),
                ));
            }
            ActionConfig::S3Source { bucket, .. } => {
                grants.extend(bucket_grants(bucket, permissions::BUCKET_READ));
            }
            ActionConfig::EcrSource { repository, .. } => {
                grants.push(PermissionGrant::on_resource(
                    Expr::get_att(repository, "Arn"),
                    permissions::PIPELINE_ECR_SOURCE.iter().copied(),
                ));
            }
            ActionConfig::CodeBuild { project, .. } => {
                grants.push(PermissionGrant::on_resource(
                    Expr::get_att(project, "Arn"),
                    permissions::PIPELINE_CODEBUILD.iter().copied(),
                ));
            }
            ActionConfig::ManualApproval {
                notification_topic: Some(topic),
                ..
            } => {
                grants.push(PermissionGrant::on_resource(
                    Expr::reference(topic),
                    permissions::PIPELINE_APPROVAL_NOTIFY.iter().copied(),
                ));
            }
            ActionConfig::ManualApproval { .. } => {}
        }
    }
    grants
}

fn bucket_grants(bucket: &LogicalId, actions: &[&str]) -> Vec<PermissionGrant> {
    vec![
        PermissionGrant::on_resource(Expr::get_att(bucket, "Arn"), actions.iter().copied()),
        PermissionGrant::on_resource(
            Expr::join([Expr::get_att(bucket, "Arn"), Expr::lit("/*")]),
            actions.iter().copied(),
        ),
    ]
}

fn bucket_and_objects(bucket: &LogicalId) -> Value {
    json!([
        Expr::get_att(bucket, "Arn"),
        Expr::join([Expr::get_att(bucket, "Arn"), Expr::lit("/*")]),
    ])
}

fn statement(actions: &[&str], resource: Value) -> Value {
    json!({ "Effect": "Allow", "Action": actions, "Resource": resource })
}

/// `arn:<partition>:codepipeline:<region>:<account>:<pipeline>`
pub fn pipeline_arn(env: &Environment, pipeline: &LogicalId) -> Expr {
    Expr::join([
        Expr::lit("arn:"),
        Expr::partition(),
        Expr::lit(":codepipeline:"),
        env.region_expr(),
        Expr::lit(":"),
        env.account_expr(),
        Expr::lit(":"),
        Expr::reference(pipeline),
    ])
}

/// HTTP and SSH clone URL outputs for a stack's source repository.
pub fn clone_url_outputs(kind: &str, repository: &LogicalId) -> Vec<StackOutput> {
    vec![
        StackOutput::new(
            format!("Mlops{}CodeCommitCloneUrlHttp", kind),
            format!("MLOps: {} CodeCommit Repo CloneUrl HTTP", kind),
            Expr::get_att(repository, "CloneUrlHttp"),
        ),
        StackOutput::new(
            format!("Mlops{}CodeCommitCloneUrlSsh", kind),
            format!("MLOps: {} CodeCommit Repo CloneUrl SSH", kind),
            Expr::get_att(repository, "CloneUrlSsh"),
        ),
    ]
}

/// Validate and freeze a stack, logging the outcome.
pub(crate) fn assemble(
    scope: &StackScope,
    builder: GraphBuilder,
    pipeline: PipelineDefinition,
    outputs: Vec<StackOutput>,
    alerts: bool,
) -> Result<SynthesizedStack, SynthError> {
    match SynthesizedStack::assemble(scope, builder, pipeline, outputs) {
        Ok(stack) => {
            emit_stack_synthesized(stack.name(), stack.graph().len(), alerts);
            Ok(stack)
        }
        Err(e) => {
            emit_validation_failed(scope.stack_name(), &e);
            Err(e)
        }
    }
}
