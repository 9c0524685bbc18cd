//! # Resolver
//!
//! Pure eligibility checks over a [`Snapshot`]. Nothing here talks to the
//! cluster or the platform.

use crate::controller::dependency::{
    DependencyEdge, DependencyError, DependencyTable, Relation, Snapshot, Strength,
};
use crate::crd::{DeploymentState, DesiredResource, ResourceKind, ResourceRef};
use std::collections::BTreeSet;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockReason {
    /// The prerequisite is not declared
    Missing,
    NotReady(DeploymentState),
    /// Ready at an older generation; the new spec has not been applied yet
    Outdated,
    Deleting,
    /// A dependent still holds a hard reference (teardown only)
    DependentPresent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blocker {
    pub kind: ResourceKind,
    /// `None` when a kind-wide prerequisite has no instance at all
    pub name: Option<String>,
    pub reason: BlockReason,
}

impl Blocker {
    #[must_use]
    pub fn is_missing(&self) -> bool {
        self.reason == BlockReason::Missing
    }
}

impl fmt::Display for Blocker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{}/{name}", self.kind)?,
            None => write!(f, "{}", self.kind)?,
        }
        match &self.reason {
            BlockReason::Missing if self.name.is_none() => f.write_str(" (none declared)"),
            BlockReason::Missing => f.write_str(" (missing)"),
            BlockReason::NotReady(state) => write!(f, " (not ready: {state})"),
            BlockReason::Outdated => f.write_str(" (status not current)"),
            BlockReason::Deleting => f.write_str(" (deleting)"),
            BlockReason::DependentPresent => f.write_str(" (still depends on this resource)"),
        }
    }
}

/// A Ready upstream instance
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ReadyDependency {
    pub upstream: ResourceRef,
    pub platform_id: Option<String>,
    pub hard: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Eligibility {
    Eligible { dependencies: Vec<ReadyDependency> },
    Blocked { blockers: Vec<Blocker> },
}

/// Decide whether `resource` may be applied now
///
/// # Errors
/// Returns [`DependencyError::Cycle`] when `resource` sits on a cycle of hard
/// instance references.
pub fn eligible(
    table: &DependencyTable,
    resource: &DesiredResource,
    snapshot: &Snapshot,
) -> Result<Eligibility, DependencyError> {
    if let Some(path) = find_cycle(table, resource, snapshot) {
        return Err(DependencyError::Cycle(path));
    }

    let mut blockers = Vec::new();
    let mut dependencies = Vec::new();

    for edge in table.edges_into(resource.key.kind) {
        let hard = edge.strength == Strength::Hard;
        for (name, upstream) in upstream_instances(edge, resource, snapshot) {
            match upstream.map_or(Err(BlockReason::Missing), readiness) {
                Ok(ready) => dependencies.push(ReadyDependency {
                    upstream: ResourceRef::new(edge.prerequisite, name),
                    platform_id: ready.status.platform_id.clone(),
                    hard,
                }),
                Err(reason) if hard => blockers.push(Blocker {
                    kind: edge.prerequisite,
                    name: Some(name),
                    reason,
                }),
                Err(_) => {}
            }
        }
        if hard
            && edge.relation == Relation::KindWide
            && snapshot.of_kind(edge.prerequisite).next().is_none()
        {
            blockers.push(Blocker {
                kind: edge.prerequisite,
                name: None,
                reason: BlockReason::Missing,
            });
        }
    }

    if blockers.is_empty() {
        dependencies.sort();
        dependencies.dedup_by(|a, b| a.upstream == b.upstream);
        Ok(Eligibility::Eligible { dependencies })
    } else {
        Ok(Eligibility::Blocked { blockers })
    }
}

/// Upstream instances regardless of readiness that already have a platform id
///
/// Used on the teardown path where the prerequisites may be mid-change but
/// their platform identifiers are still needed to locate the entity.
#[must_use]
pub fn known_dependencies(
    table: &DependencyTable,
    resource: &DesiredResource,
    snapshot: &Snapshot,
) -> Vec<ReadyDependency> {
    let mut known: Vec<ReadyDependency> = table
        .edges_into(resource.key.kind)
        .flat_map(|edge| {
            upstream_instances(edge, resource, snapshot)
                .into_iter()
                .filter_map(move |(name, upstream)| {
                    let platform_id = upstream?.status.platform_id.clone()?;
                    Some(ReadyDependency {
                        upstream: ResourceRef::new(edge.prerequisite, name),
                        platform_id: Some(platform_id),
                        hard: edge.strength == Strength::Hard,
                    })
                })
        })
        .collect();
    known.sort();
    known.dedup_by(|a, b| a.upstream == b.upstream);
    known
}

/// Dependents that must be gone before `resource` may be torn down
#[must_use]
pub fn teardown_blockers(
    table: &DependencyTable,
    resource: &DesiredResource,
    snapshot: &Snapshot,
) -> Vec<Blocker> {
    let mut blockers = Vec::new();
    for edge in table
        .edges_from(resource.key.kind)
        .filter(|e| e.strength == Strength::Hard)
    {
        for dependent in snapshot.of_kind(edge.dependent) {
            if dependent.key == resource.key {
                continue;
            }
            let holds = edge.relation == Relation::KindWide
                || dependent
                    .spec
                    .referenced_names(resource.key.kind)
                    .contains(&resource.key.name.as_str());
            if holds {
                blockers.push(Blocker {
                    kind: dependent.key.kind,
                    name: Some(dependent.key.name.clone()),
                    reason: BlockReason::DependentPresent,
                });
            }
        }
    }
    blockers
}

/// Find a cycle of hard instance references passing through `resource`
#[must_use]
pub fn find_cycle(
    table: &DependencyTable,
    resource: &DesiredResource,
    snapshot: &Snapshot,
) -> Option<Vec<ResourceRef>> {
    let start = resource.key.to_ref();
    let mut visited = BTreeSet::new();
    let mut path = vec![start.clone()];
    let first_hops = hard_references(table, resource);
    if walk(table, snapshot, &start, first_hops, &mut visited, &mut path) {
        Some(path)
    } else {
        None
    }
}

fn walk(
    table: &DependencyTable,
    snapshot: &Snapshot,
    start: &ResourceRef,
    next: Vec<ResourceRef>,
    visited: &mut BTreeSet<ResourceRef>,
    path: &mut Vec<ResourceRef>,
) -> bool {
    for hop in next {
        if hop == *start {
            path.push(hop);
            return true;
        }
        if !visited.insert(hop.clone()) {
            continue;
        }
        let Some(upstream) = snapshot.get(hop.kind, &hop.name) else {
            continue;
        };
        path.push(hop);
        if walk(
            table,
            snapshot,
            start,
            hard_references(table, upstream),
            visited,
            path,
        ) {
            return true;
        }
        path.pop();
    }
    false
}

fn hard_references(table: &DependencyTable, resource: &DesiredResource) -> Vec<ResourceRef> {
    table
        .edges_into(resource.key.kind)
        .filter(|e| e.is_hard_instance_edge())
        .flat_map(|edge| {
            resource
                .spec
                .referenced_names(edge.prerequisite)
                .into_iter()
                .map(move |name| ResourceRef::new(edge.prerequisite, name))
        })
        .collect()
}

fn upstream_instances<'a>(
    edge: &DependencyEdge,
    resource: &DesiredResource,
    snapshot: &'a Snapshot,
) -> Vec<(String, Option<&'a DesiredResource>)> {
    match edge.relation {
        Relation::KindWide => snapshot
            .of_kind(edge.prerequisite)
            .map(|r| (r.key.name.clone(), Some(r)))
            .collect(),
        Relation::Owner | Relation::Reference => resource
            .spec
            .referenced_names(edge.prerequisite)
            .into_iter()
            .map(|name| (name.to_string(), snapshot.get(edge.prerequisite, name)))
            .collect(),
    }
}

fn readiness(upstream: &DesiredResource) -> Result<&DesiredResource, BlockReason> {
    if upstream.deletion_requested {
        return Err(BlockReason::Deleting);
    }
    if upstream.status.deployment_state != DeploymentState::Ready {
        return Err(BlockReason::NotReady(upstream.status.deployment_state));
    }
    if upstream.status.observed_generation != Some(upstream.generation) {
        return Err(BlockReason::Outdated);
    }
    Ok(upstream)
}
