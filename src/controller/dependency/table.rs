//! # Dependency Table
//!
//! Static ordering relations between resource kinds. The table is built once
//! and only read afterwards; [`DependencyTable::validate`] runs at startup and
//! refuses a table whose kind graph has a cycle (edges from a kind to itself
//! are allowed and resolved per instance).

use crate::controller::dependency::DependencyError;
use crate::crd::ResourceKind;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::LazyLock;

/// How a dependent finds the instances it depends on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    /// The dependent names its owner in its spec
    Owner,
    /// The dependent names the prerequisite in its spec
    Reference,
    /// The dependent depends on every instance of the prerequisite kind
    KindWide,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strength {
    /// Blocks the dependent until the prerequisite is Ready
    Hard,
    /// Ordering hint only, never blocks
    Soft,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DependencyEdge {
    pub prerequisite: ResourceKind,
    pub dependent: ResourceKind,
    pub relation: Relation,
    pub strength: Strength,
}

impl DependencyEdge {
    const fn new(
        prerequisite: ResourceKind,
        dependent: ResourceKind,
        relation: Relation,
        strength: Strength,
    ) -> Self {
        Self {
            prerequisite,
            dependent,
            relation,
            strength,
        }
    }

    /// Hard edge resolved to specific named instances
    #[must_use]
    pub fn is_hard_instance_edge(&self) -> bool {
        self.strength == Strength::Hard && self.relation != Relation::KindWide
    }
}

const STANDARD_EDGES: [DependencyEdge; 13] = {
    use Relation::{KindWide, Owner, Reference};
    use ResourceKind as K;
    use Strength::{Hard, Soft};
    [
        DependencyEdge::new(K::System, K::Host, KindWide, Hard),
        DependencyEdge::new(K::System, K::PlatformNetwork, KindWide, Hard),
        DependencyEdge::new(K::System, K::DataNetwork, KindWide, Hard),
        DependencyEdge::new(K::System, K::StorageBackend, KindWide, Hard),
        DependencyEdge::new(K::System, K::PtpInstance, KindWide, Hard),
        DependencyEdge::new(K::PtpInstance, K::Host, Reference, Soft),
        DependencyEdge::new(K::Host, K::Interface, Owner, Hard),
        DependencyEdge::new(K::Interface, K::Interface, Reference, Hard),
        DependencyEdge::new(K::PlatformNetwork, K::Interface, Reference, Hard),
        DependencyEdge::new(K::DataNetwork, K::Interface, Reference, Hard),
        DependencyEdge::new(K::Host, K::StorageBackend, KindWide, Soft),
        DependencyEdge::new(K::PtpInstance, K::PtpInterface, Owner, Hard),
        DependencyEdge::new(K::Interface, K::PtpInterface, Reference, Soft),
    ]
};

static STANDARD: LazyLock<DependencyTable> =
    LazyLock::new(|| DependencyTable::from_edges(STANDARD_EDGES.to_vec()));

#[derive(Debug, Clone)]
pub struct DependencyTable {
    edges: Vec<DependencyEdge>,
}

impl DependencyTable {
    /// The table the controller runs with
    #[must_use]
    pub fn standard() -> &'static DependencyTable {
        &STANDARD
    }

    #[must_use]
    pub fn from_edges(edges: Vec<DependencyEdge>) -> Self {
        Self { edges }
    }

    pub fn edges(&self) -> &[DependencyEdge] {
        &self.edges
    }

    /// Edges whose dependent is `kind`
    pub fn edges_into(&self, kind: ResourceKind) -> impl Iterator<Item = &DependencyEdge> + '_ {
        self.edges.iter().filter(move |e| e.dependent == kind)
    }

    /// Edges whose prerequisite is `kind`
    pub fn edges_from(&self, kind: ResourceKind) -> impl Iterator<Item = &DependencyEdge> + '_ {
        self.edges.iter().filter(move |e| e.prerequisite == kind)
    }

    /// Every kind `kind` transitively depends on, including itself when it has a self-edge
    #[must_use]
    pub fn prerequisite_closure(&self, kind: ResourceKind) -> BTreeSet<ResourceKind> {
        self.closure(kind, |e| (e.dependent, e.prerequisite))
    }

    /// Every kind transitively depending on `kind`, including itself when it has a self-edge
    #[must_use]
    pub fn dependent_closure(&self, kind: ResourceKind) -> BTreeSet<ResourceKind> {
        self.closure(kind, |e| (e.prerequisite, e.dependent))
    }

    fn closure(
        &self,
        kind: ResourceKind,
        direction: impl Fn(&DependencyEdge) -> (ResourceKind, ResourceKind),
    ) -> BTreeSet<ResourceKind> {
        let mut seen = BTreeSet::new();
        let mut queue = VecDeque::from([kind]);
        while let Some(current) = queue.pop_front() {
            for edge in &self.edges {
                let (from, to) = direction(edge);
                if from == current && seen.insert(to) {
                    queue.push_back(to);
                }
            }
        }
        seen
    }

    /// Check the kind graph is acyclic and return a prerequisite-first order
    pub fn validate(&self) -> Result<Vec<ResourceKind>, DependencyError> {
        let mut indegree: BTreeMap<ResourceKind, usize> =
            ResourceKind::ALL.iter().map(|k| (*k, 0)).collect();
        for edge in self.edges.iter().filter(|e| e.prerequisite != e.dependent) {
            *indegree.entry(edge.dependent).or_default() += 1;
        }

        let mut ready: VecDeque<ResourceKind> = indegree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(kind, _)| *kind)
            .collect();
        let mut order = Vec::with_capacity(indegree.len());

        while let Some(kind) = ready.pop_front() {
            order.push(kind);
            for edge in self.edges_from(kind).filter(|e| e.dependent != kind) {
                if let Some(degree) = indegree.get_mut(&edge.dependent) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.push_back(edge.dependent);
                    }
                }
            }
        }

        if order.len() == indegree.len() {
            Ok(order)
        } else {
            let stuck: Vec<String> = indegree
                .into_iter()
                .filter(|(kind, _)| !order.contains(kind))
                .map(|(kind, _)| kind.to_string())
                .collect();
            Err(DependencyError::InvalidTable(format!(
                "kind-level cycle among {}",
                stuck.join(", ")
            )))
        }
    }
}
