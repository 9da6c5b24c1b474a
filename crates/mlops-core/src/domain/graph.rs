//! Resource graph and reference validation.
//!
//! Descriptors are stored by logical id, so iteration order (and therefore
//! rendered output) is independent of insertion order. An edge `A → B` means
//! A refers to B through a property (`Ref` / `Fn::GetAtt`), an explicit
//! dependency, a grant scope, or its grant role.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;

use super::error::ValidationError;
use super::policy::{default_policy_id, PermissionGrant};
use super::resource::{LogicalId, ResourceDescriptor, ResourceKind};

/// Accumulates descriptors; [`GraphBuilder::build`] validates and freezes them.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    descriptors: Vec<ResourceDescriptor>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a descriptor and return its logical id for wiring.
    pub fn add(&mut self, descriptor: ResourceDescriptor) -> LogicalId {
        let id = descriptor.logical_id().clone();
        self.descriptors.push(descriptor);
        id
    }

    pub fn build(self) -> Result<ResourceGraph, ValidationError> {
        let mut resources = BTreeMap::new();
        for descriptor in self.descriptors {
            let id = descriptor.logical_id().clone();
            if !id.is_valid() {
                return Err(ValidationError::InvalidLogicalId {
                    id: id.to_string(),
                });
            }
            if resources.insert(id.clone(), descriptor).is_some() {
                return Err(ValidationError::DuplicateLogicalId { id: id.to_string() });
            }
        }

        let graph = ResourceGraph { resources };
        graph.validate()?;
        Ok(graph)
    }
}

/// An immutable, validated set of descriptors.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceGraph {
    resources: BTreeMap<LogicalId, ResourceDescriptor>,
}

impl ResourceGraph {
    pub fn builder() -> GraphBuilder {
        GraphBuilder::new()
    }

    pub fn get(&self, id: &LogicalId) -> Option<&ResourceDescriptor> {
        self.resources.get(id)
    }

    pub fn contains(&self, id: &LogicalId) -> bool {
        self.resources.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &ResourceDescriptor> {
        self.resources.values()
    }

    pub fn of_kind(&self, kind: ResourceKind) -> impl Iterator<Item = &ResourceDescriptor> {
        self.resources.values().filter(move |d| d.kind() == kind)
    }

    pub fn count(&self, kind: ResourceKind) -> usize {
        self.of_kind(kind).count()
    }

    /// Every grant in the graph with its grantee.
    pub fn grants(&self) -> impl Iterator<Item = (&LogicalId, &PermissionGrant)> {
        self.resources
            .values()
            .flat_map(|d| d.grants().iter().map(move |g| (d.logical_id(), g)))
    }

    /// Grantees grouped by the role their grants attach to.
    pub fn grantees_by_role(&self) -> BTreeMap<&LogicalId, Vec<&ResourceDescriptor>> {
        let mut by_role: BTreeMap<&LogicalId, Vec<&ResourceDescriptor>> = BTreeMap::new();
        for descriptor in self.resources.values() {
            if descriptor.grants().is_empty() {
                continue;
            }
            if let Some(role) = descriptor.grant_role() {
                by_role.entry(role).or_default().push(descriptor);
            }
        }
        by_role
    }

    /// All outgoing references of one descriptor, deduplicated and sorted.
    pub fn references_of(descriptor: &ResourceDescriptor) -> BTreeSet<LogicalId> {
        let mut refs = BTreeSet::new();
        for value in descriptor.properties().values() {
            collect_references(value, &mut refs);
        }
        refs.extend(descriptor.depends_on().iter().cloned());
        for grant in descriptor.grants() {
            refs.extend(grant.references().into_iter().cloned());
        }
        if let Some(role) = descriptor.grant_role() {
            refs.insert(role.clone());
        }
        refs
    }

    /// Directed edges `(from, to)` across the whole graph.
    pub fn edges(&self) -> Vec<(LogicalId, LogicalId)> {
        self.resources
            .values()
            .flat_map(|d| {
                Self::references_of(d)
                    .into_iter()
                    .map(move |to| (d.logical_id().clone(), to))
            })
            .collect()
    }

    fn validate(&self) -> Result<(), ValidationError> {
        for descriptor in self.resources.values() {
            if !descriptor.grants().is_empty() && descriptor.grant_role().is_none() {
                return Err(ValidationError::GrantWithoutRole {
                    id: descriptor.logical_id().to_string(),
                });
            }
            for target in Self::references_of(descriptor) {
                if !self.contains(&target) {
                    return Err(ValidationError::DanglingReference {
                        from: descriptor.logical_id().to_string(),
                        to: target.to_string(),
                    });
                }
            }
        }

        // Rendered grant policies must not shadow a declared resource.
        for role in self.grantees_by_role().keys() {
            let policy_id = default_policy_id(role);
            if self.contains(&policy_id) {
                return Err(ValidationError::DuplicateLogicalId {
                    id: policy_id.to_string(),
                });
            }
        }

        Ok(())
    }
}

/// Collect `Ref` / `Fn::GetAtt` targets from a JSON property tree.
///
/// Pseudo parameters (`AWS::*`) are skipped.
pub fn collect_references(value: &Value, out: &mut BTreeSet<LogicalId>) {
    match value {
        Value::Object(map) => {
            if map.len() == 1 {
                if let Some(Value::String(target)) = map.get("Ref") {
                    if !target.starts_with("AWS::") {
                        out.insert(LogicalId::new(target.as_str()));
                    }
                    return;
                }
                match map.get("Fn::GetAtt") {
                    Some(Value::Array(parts)) => {
                        if let Some(Value::String(target)) = parts.first() {
                            out.insert(LogicalId::new(target.as_str()));
                        }
                        return;
                    }
                    Some(Value::String(dotted)) => {
                        if let Some((target, _)) = dotted.split_once('.') {
                            out.insert(LogicalId::new(target));
                        }
                        return;
                    }
                    _ => {}
                }
            }
            for v in map.values() {
                collect_references(v, out);
            }
        }
        Value::Array(items) => {
            for v in items {
                collect_references(v, out);
            }
        }
        _ => {}
    }
}
