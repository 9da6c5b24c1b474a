//! Template rendering.
//!
//! Turns a [`SynthesizedStack`] into a CloudFormation-shaped JSON document.
//! Grants are grouped per role into one `<Role>DefaultPolicy` resource, and
//! every grantee gains a `DependsOn` on that policy so the role carries its
//! permissions before the grantee is created.

use serde_json::{json, Map, Value};

use crate::domain::policy::{default_policy_id, policy_document};
use crate::domain::resource::{LogicalId, ResourceDescriptor, ResourceKind};
use crate::stack::SynthesizedStack;

pub const TEMPLATE_FORMAT_VERSION: &str = "2010-09-09";

/// Render the full template.
pub fn render(stack: &SynthesizedStack) -> Value {
    let graph = stack.graph();
    let mut resources = Map::new();

    let by_role = graph.grantees_by_role();
    let mut extra_deps: Vec<(&LogicalId, LogicalId)> = Vec::new();

    for (role, grantees) in &by_role {
        let policy_id = default_policy_id(role);
        let statements: Vec<Value> = grantees
            .iter()
            .flat_map(|d| d.grants().iter().map(|g| g.to_statement()))
            .collect();
        resources.insert(
            policy_id.to_string(),
            json!({
                "Type": ResourceKind::IamPolicy.type_name(),
                "Properties": {
                    "PolicyName": policy_id.as_str(),
                    "PolicyDocument": policy_document(statements),
                    "Roles": [{ "Ref": role.as_str() }],
                },
            }),
        );
        for grantee in grantees {
            extra_deps.push((grantee.logical_id(), policy_id.clone()));
        }
    }

    for descriptor in graph.descriptors() {
        let extra: Vec<&LogicalId> = extra_deps
            .iter()
            .filter(|(grantee, _)| *grantee == descriptor.logical_id())
            .map(|(_, policy)| policy)
            .collect();
        resources.insert(
            descriptor.logical_id().to_string(),
            render_resource(descriptor, &extra),
        );
    }

    let mut outputs = Map::new();
    for output in stack.outputs() {
        outputs.insert(
            output.name.clone(),
            json!({
                "Description": output.description,
                "Value": output.value.to_json(),
            }),
        );
    }

    let mut template = json!({
        "AWSTemplateFormatVersion": TEMPLATE_FORMAT_VERSION,
        "Resources": resources,
    });
    if !outputs.is_empty() {
        template["Outputs"] = Value::Object(outputs);
    }
    template
}

fn render_resource(descriptor: &ResourceDescriptor, extra_deps: &[&LogicalId]) -> Value {
    let mut resource = json!({ "Type": descriptor.kind().type_name() });
    if !descriptor.properties().is_empty() {
        resource["Properties"] = Value::Object(descriptor.properties().clone());
    }

    let mut deps: Vec<&str> = descriptor
        .depends_on()
        .iter()
        .chain(extra_deps.iter().copied())
        .map(LogicalId::as_str)
        .collect();
    deps.sort_unstable();
    deps.dedup();
    if !deps.is_empty() {
        resource["DependsOn"] = json!(deps);
    }
    resource
}
