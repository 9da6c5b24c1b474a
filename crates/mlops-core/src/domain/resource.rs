//! Resource descriptors.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::policy::PermissionGrant;

/// Identifier of a resource within one graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogicalId(String);

impl LogicalId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Logical ids must be non-empty, ASCII alphanumeric and at most 255 chars.
    pub fn is_valid(&self) -> bool {
        !self.0.is_empty()
            && self.0.len() <= 255
            && self.0.chars().all(|c| c.is_ascii_alphanumeric())
    }

    /// Derive a child id by appending a suffix.
    pub fn child(&self, suffix: &str) -> LogicalId {
        LogicalId(format!("{}{}", self.0, suffix))
    }
}

impl fmt::Display for LogicalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LogicalId {
    fn from(value: &str) -> Self {
        LogicalId::new(value)
    }
}

/// The managed service type a descriptor declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceKind {
    CodeCommitRepository,
    CodeBuildProject,
    CodePipeline,
    EcrRepository,
    S3Bucket,
    IamRole,
    IamPolicy,
    SnsTopic,
    SnsSubscription,
    SnsTopicPolicy,
    EventsRule,
}

impl ResourceKind {
    /// Template type name.
    pub fn type_name(&self) -> &'static str {
        match self {
            ResourceKind::CodeCommitRepository => "AWS::CodeCommit::Repository",
            ResourceKind::CodeBuildProject => "AWS::CodeBuild::Project",
            ResourceKind::CodePipeline => "AWS::CodePipeline::Pipeline",
            ResourceKind::EcrRepository => "AWS::ECR::Repository",
            ResourceKind::S3Bucket => "AWS::S3::Bucket",
            ResourceKind::IamRole => "AWS::IAM::Role",
            ResourceKind::IamPolicy => "AWS::IAM::Policy",
            ResourceKind::SnsTopic => "AWS::SNS::Topic",
            ResourceKind::SnsSubscription => "AWS::SNS::Subscription",
            ResourceKind::SnsTopicPolicy => "AWS::SNS::TopicPolicy",
            ResourceKind::EventsRule => "AWS::Events::Rule",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// A typed, named declaration of one cloud resource.
///
/// Built with the consuming `with_*` methods and immutable once added to a
/// graph. Grants are attached to `grant_role`; the renderer turns them into a
/// policy resource bound to that role.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceDescriptor {
    logical_id: LogicalId,
    kind: ResourceKind,
    properties: Map<String, Value>,
    depends_on: BTreeSet<LogicalId>,
    grants: Vec<PermissionGrant>,
    grant_role: Option<LogicalId>,
}

impl ResourceDescriptor {
    pub fn new(logical_id: impl Into<LogicalId>, kind: ResourceKind) -> Self {
        Self {
            logical_id: logical_id.into(),
            kind,
            properties: Map::new(),
            depends_on: BTreeSet::new(),
            grants: Vec::new(),
            grant_role: None,
        }
    }

    pub fn with_property(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }

    pub fn with_dependency(mut self, id: &LogicalId) -> Self {
        self.depends_on.insert(id.clone());
        self
    }

    pub fn with_grant_role(mut self, role: &LogicalId) -> Self {
        self.grant_role = Some(role.clone());
        self
    }

    pub fn with_grant(mut self, grant: PermissionGrant) -> Self {
        self.grants.push(grant);
        self
    }

    pub fn logical_id(&self) -> &LogicalId {
        &self.logical_id
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn properties(&self) -> &Map<String, Value> {
        &self.properties
    }

    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    pub fn depends_on(&self) -> &BTreeSet<LogicalId> {
        &self.depends_on
    }

    pub fn grants(&self) -> &[PermissionGrant] {
        &self.grants
    }

    pub fn grant_role(&self) -> Option<&LogicalId> {
        self.grant_role.as_ref()
    }
}
