//! IAM action sets granted by the stacks.

/// Pull access for a build project reading its source repository.
pub const CODECOMMIT_PULL: &[&str] = &[
    "codecommit:ListBranches",
    "codecommit:ListRepositories",
    "codecommit:BatchGetRepositories",
    "codecommit:GitPull",
];

/// Image build-and-push access for the build pipeline's project.
pub const ECR_PUSH: &[&str] = &[
    "ecr:GetAuthorizationToken",
    "ecr:InitiateLayerUpload",
    "ecr:UploadLayerPart",
    "ecr:CompleteLayerUpload",
    "ecr:BatchCheckLayerAvailability",
    "ecr:PutImage",
    "ecr:CreateRepository",
    "ecr:DescribeRepositories",
    "ecr-public:*",
    "sts:GetServiceBearerToken",
];

pub const S3_ALL: &[&str] = &["s3:*"];

pub const SAGEMAKER_TRAIN: &[&str] = &[
    "sagemaker:CreateTrainingJob",
    "sagemaker:CreateModel",
    "sagemaker:DescribeTrainingJob",
    "iam:PassRole",
];

pub const SAGEMAKER_DEPLOY: &[&str] = &[
    "sagemaker:CreateTransformJob",
    "sagemaker:CreateEndpointConfig",
    "sagemaker:CreateEndpoint",
    "sagemaker:UpdateEndpoint",
    "iam:PassRole",
];

/// Managed policies attached to the SageMaker execution role.
pub const SAGEMAKER_EXECUTION_MANAGED_POLICIES: &[&str] = &[
    "AmazonEC2ContainerRegistryFullAccess",
    "AmazonS3FullAccess",
    "AmazonSageMakerFullAccess",
];

// Service-role permissions below are wired by the shared constructs.

pub(crate) const BUCKET_READ_WRITE: &[&str] = &[
    "s3:GetObject*",
    "s3:GetBucket*",
    "s3:List*",
    "s3:DeleteObject*",
    "s3:PutObject*",
    "s3:Abort*",
];

pub(crate) const BUCKET_READ: &[&str] = &["s3:GetObject*", "s3:GetBucket*", "s3:List*"];

pub(crate) const BUILD_LOGS: &[&str] = &[
    "logs:CreateLogGroup",
    "logs:CreateLogStream",
    "logs:PutLogEvents",
];

pub(crate) const PIPELINE_CODECOMMIT_SOURCE: &[&str] = &[
    "codecommit:GetBranch",
    "codecommit:GetCommit",
    "codecommit:UploadArchive",
    "codecommit:GetUploadArchiveStatus",
    "codecommit:CancelUploadArchive",
];

pub(crate) const PIPELINE_ECR_SOURCE: &[&str] = &["ecr:DescribeImages"];

pub(crate) const PIPELINE_CODEBUILD: &[&str] = &[
    "codebuild:BatchGetBuilds",
    "codebuild:StartBuild",
    "codebuild:StopBuild",
];

pub(crate) const PIPELINE_APPROVAL_NOTIFY: &[&str] = &["sns:Publish"];

pub(crate) const START_PIPELINE: &[&str] = &["codepipeline:StartPipelineExecution"];
