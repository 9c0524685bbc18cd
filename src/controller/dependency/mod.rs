//! # Dependency Resolution
//!
//! Ordering between resources. The static [`DependencyTable`] relates kinds;
//! the [`resolver`] turns it into a per-instance answer over a [`Snapshot`] of
//! the current desired resources and their statuses.

pub mod resolver;
pub mod table;

pub use resolver::{BlockReason, Blocker, Eligibility, ReadyDependency};
pub use table::{DependencyEdge, DependencyTable, Relation, Strength};

use crate::crd::{DesiredResource, ResourceKind, ResourceRef};
use crate::store::{ResourceStore, StoreError};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DependencyError {
    /// Resources reference each other over hard edges
    #[error("dependency cycle: {}", format_path(.0))]
    Cycle(Vec<ResourceRef>),
    #[error("invalid dependency table: {0}")]
    InvalidTable(String),
}

fn format_path(path: &[ResourceRef]) -> String {
    path.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Point-in-time view of the desired resources of a namespace
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    resources: BTreeMap<ResourceKind, BTreeMap<String, DesiredResource>>,
}

impl Snapshot {
    /// Load every resource of `kinds` in `namespace`
    pub async fn load(
        store: &dyn ResourceStore,
        kinds: impl IntoIterator<Item = ResourceKind>,
        namespace: &str,
    ) -> Result<Self, StoreError> {
        let mut snapshot = Self::default();
        for kind in kinds {
            for resource in store.list(kind, namespace).await? {
                snapshot.insert(resource);
            }
        }
        Ok(snapshot)
    }

    pub fn from_resources(resources: impl IntoIterator<Item = DesiredResource>) -> Self {
        let mut snapshot = Self::default();
        for resource in resources {
            snapshot.insert(resource);
        }
        snapshot
    }

    pub fn insert(&mut self, resource: DesiredResource) {
        self.resources
            .entry(resource.key.kind)
            .or_default()
            .insert(resource.key.name.clone(), resource);
    }

    #[must_use]
    pub fn get(&self, kind: ResourceKind, name: &str) -> Option<&DesiredResource> {
        self.resources.get(&kind).and_then(|by_name| by_name.get(name))
    }

    pub fn of_kind(&self, kind: ResourceKind) -> impl Iterator<Item = &DesiredResource> + '_ {
        self.resources
            .get(&kind)
            .into_iter()
            .flat_map(BTreeMap::values)
    }
}
