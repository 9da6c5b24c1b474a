//! Permission grants and IAM policy documents.

use std::collections::BTreeSet;

use serde_json::{json, Value};

use super::expr::Expr;
use super::resource::LogicalId;

pub const POLICY_VERSION: &str = "2012-10-17";

/// What a grant may act on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrantScope {
    /// A specific resource, usually an ARN attribute of a graph resource.
    Resource(Expr),
    /// Every resource (`*`).
    Wildcard,
}

impl GrantScope {
    pub fn to_json(&self) -> Value {
        match self {
            GrantScope::Resource(arn) => arn.to_json(),
            GrantScope::Wildcard => Value::String("*".to_string()),
        }
    }

    pub fn is_wildcard(&self) -> bool {
        matches!(self, GrantScope::Wildcard)
    }
}

/// An allow-rule attached to a grantee resource.
///
/// Actions keep their declared order so rendered output is stable; repeated
/// actions are dropped on construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionGrant {
    actions: Vec<String>,
    scope: GrantScope,
}

impl PermissionGrant {
    pub fn new<I, S>(actions: I, scope: GrantScope) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = BTreeSet::new();
        let actions = actions
            .into_iter()
            .map(Into::into)
            .filter(|a: &String| seen.insert(a.clone()))
            .collect();
        Self { actions, scope }
    }

    /// Grant scoped to one resource.
    pub fn on_resource<I, S>(arn: Expr, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(actions, GrantScope::Resource(arn))
    }

    /// Grant scoped to `*`.
    pub fn on_all<I, S>(actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(actions, GrantScope::Wildcard)
    }

    pub fn actions(&self) -> &[String] {
        &self.actions
    }

    pub fn action_set(&self) -> BTreeSet<&str> {
        self.actions.iter().map(String::as_str).collect()
    }

    pub fn scope(&self) -> &GrantScope {
        &self.scope
    }

    /// Graph resources named by the scope.
    pub fn references(&self) -> Vec<&LogicalId> {
        match &self.scope {
            GrantScope::Resource(arn) => arn.references(),
            GrantScope::Wildcard => Vec::new(),
        }
    }

    /// Render as an `Allow` statement. A single action renders as a string.
    pub fn to_statement(&self) -> Value {
        let action = match self.actions.as_slice() {
            [single] => Value::String(single.clone()),
            many => json!(many),
        };
        json!({
            "Effect": "Allow",
            "Action": action,
            "Resource": self.scope.to_json(),
        })
    }
}

/// Name of the policy resource rendered for grants attached to `role`.
pub fn default_policy_id(role: &LogicalId) -> LogicalId {
    role.child("DefaultPolicy")
}

/// Wrap statements in a policy document.
pub fn policy_document(statements: Vec<Value>) -> Value {
    json!({
        "Version": POLICY_VERSION,
        "Statement": statements,
    })
}

/// Trust policy letting a service principal assume a role.
pub fn assume_role_policy(service: &str) -> Value {
    policy_document(vec![json!({
        "Effect": "Allow",
        "Principal": { "Service": service },
        "Action": "sts:AssumeRole",
    })])
}

/// ARN of an AWS-managed policy.
pub fn managed_policy_arn(name: &str) -> Expr {
    Expr::join([
        Expr::lit("arn:"),
        Expr::partition(),
        Expr::lit(format!(":iam::aws:policy/{}", name)),
    ])
}
