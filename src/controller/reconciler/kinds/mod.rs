//! # Kind Reconcilers
//!
//! One [`KindReconciler`] per resource kind. A kind reconciler is a pure
//! planner: given the desired resource, its Ready dependencies and the
//! platform entity as last read, it returns the next [`Step`]. The dispatcher
//! executes at most one mutating step per attempt and re-plans from a fresh
//! read, so every step must be recognisable as done from the entity alone.

mod host;
mod interface;
mod network;
mod ptp;
mod storage;
mod system;

use crate::controller::dependency::{DependencyTable, ReadyDependency};
use crate::controller::retry::ErrorClass;
use crate::crd::{DesiredResource, ResourceKind, ResourceRef, ResourceSpec};
use crate::platform::{LookupKey, PlatformEntity, StrategyAction};
use serde_json::{Map, Value};
use thiserror::Error;

/// Next action towards the desired state
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Converged,
    /// The platform is busy with the entity; poll again later
    Wait(String),
    Create(Map<String, Value>),
    Update {
        id: String,
        changes: Map<String, Value>,
    },
    Strategy {
        action: StrategyAction,
        target: String,
    },
}

impl Step {
    /// Stable name of the step, part of the client request id
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Step::Converged => "converged".to_string(),
            Step::Wait(_) => "wait".to_string(),
            Step::Create(_) => "create".to_string(),
            Step::Update { changes, .. } => {
                let fields: Vec<&str> = changes.keys().map(String::as_str).collect();
                format!("update:{}", fields.join(","))
            }
            Step::Strategy { action, target } => format!("strategy:{}:{target}", action.as_str()),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlanError {
    #[error("invalid spec: {0}")]
    Invalid(String),
    #[error("field '{field}' cannot change once created (platform has {current}, spec wants {desired})")]
    Immutable {
        field: String,
        current: String,
        desired: String,
    },
    #[error("prerequisite {0} has no platform id yet")]
    UpstreamUnresolved(ResourceRef),
}

impl PlanError {
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            PlanError::Invalid(_) | PlanError::Immutable { .. } => ErrorClass::Configuration,
            PlanError::UpstreamUnresolved(_) => ErrorClass::Transient,
        }
    }

    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            PlanError::Invalid(_) => "InvalidSpec",
            PlanError::Immutable { .. } => "ImmutableFieldChanged",
            PlanError::UpstreamUnresolved(_) => "UpstreamUnresolved",
        }
    }
}

/// Inputs of a plan
#[derive(Debug, Clone, Copy)]
pub struct PlanContext<'a> {
    pub resource: &'a DesiredResource,
    pub dependencies: &'a [ReadyDependency],
}

impl<'a> PlanContext<'a> {
    #[must_use]
    pub fn new(resource: &'a DesiredResource, dependencies: &'a [ReadyDependency]) -> Self {
        Self {
            resource,
            dependencies,
        }
    }

    #[must_use]
    pub fn spec(&self) -> &'a ResourceSpec {
        &self.resource.spec
    }

    fn dependency(&self, kind: ResourceKind, name: &str) -> Option<&'a ReadyDependency> {
        self.dependencies
            .iter()
            .find(|d| d.upstream.kind == kind && d.upstream.name == name)
    }

    #[must_use]
    pub fn platform_id(&self, kind: ResourceKind, name: &str) -> Option<&'a str> {
        self.dependency(kind, name)
            .and_then(|d| d.platform_id.as_deref())
    }

    /// Platform id of a hard prerequisite; a soft one never satisfies it
    pub fn required_id(&self, kind: ResourceKind, name: &str) -> Result<String, PlanError> {
        self.dependency(kind, name)
            .filter(|d| d.hard)
            .and_then(|d| d.platform_id.clone())
            .ok_or_else(|| PlanError::UpstreamUnresolved(ResourceRef::new(kind, name)))
    }

    /// Sorted platform ids of hard prerequisites
    pub fn required_ids(&self, kind: ResourceKind, names: &[String]) -> Result<Vec<String>, PlanError> {
        let mut ids = names
            .iter()
            .map(|name| self.required_id(kind, name))
            .collect::<Result<Vec<_>, _>>()?;
        ids.sort();
        Ok(ids)
    }

    /// Sorted platform ids of whichever soft prerequisites are Ready
    #[must_use]
    pub fn ready_ids(&self, kind: ResourceKind, names: &[String]) -> Vec<String> {
        let mut ids: Vec<String> = names
            .iter()
            .filter_map(|name| self.platform_id(kind, name).map(str::to_string))
            .collect();
        ids.sort();
        ids
    }
}

/// Per-kind create/update/delete planning
pub trait KindReconciler: Send + Sync {
    fn kind(&self) -> ResourceKind;

    /// Static checks that need no platform state
    fn validate(&self, _spec: &ResourceSpec) -> Result<(), PlanError> {
        Ok(())
    }

    /// Resources the spec refers to, per the dependency table
    fn references(&self, spec: &ResourceSpec) -> Vec<ResourceRef> {
        DependencyTable::standard()
            .edges_into(self.kind())
            .flat_map(|edge| {
                spec.referenced_names(edge.prerequisite)
                    .into_iter()
                    .map(move |name| ResourceRef::new(edge.prerequisite, name))
            })
            .collect()
    }

    /// Attributes locating the platform entity
    fn lookup_key(&self, ctx: &PlanContext<'_>) -> Result<LookupKey, PlanError>;

    /// Attributes the platform entity must carry
    fn desired_attributes(&self, ctx: &PlanContext<'_>) -> Result<Map<String, Value>, PlanError>;

    /// Whether a missing entity is created or waited for
    fn allows_create(&self) -> bool {
        true
    }

    /// Attributes that cannot change once the entity exists
    fn immutable_fields(&self) -> &'static [&'static str] {
        &[]
    }

    fn plan(
        &self,
        ctx: &PlanContext<'_>,
        entity: Option<&PlatformEntity>,
    ) -> Result<Step, PlanError> {
        generic_plan(self, ctx, entity)
    }
}

/// Absent: create (or wait); busy: wait; immutable change: error; differing: update
pub fn generic_plan<R: KindReconciler + ?Sized>(
    reconciler: &R,
    ctx: &PlanContext<'_>,
    entity: Option<&PlatformEntity>,
) -> Result<Step, PlanError> {
    let desired = reconciler.desired_attributes(ctx)?;
    let Some(entity) = entity else {
        return Ok(if reconciler.allows_create() {
            Step::Create(desired)
        } else {
            Step::Wait(format!("{} record not provisioned yet", reconciler.kind()))
        });
    };
    if let Some(task) = &entity.task {
        return Ok(Step::Wait(task.clone()));
    }
    check_immutable(reconciler.immutable_fields(), &desired, entity)?;
    let changes = diff(&desired, entity);
    if changes.is_empty() {
        Ok(Step::Converged)
    } else {
        Ok(Step::Update {
            id: entity.id.clone(),
            changes,
        })
    }
}

/// Desired attributes whose platform value differs
#[must_use]
pub fn diff(desired: &Map<String, Value>, entity: &PlatformEntity) -> Map<String, Value> {
    desired
        .iter()
        .filter(|(field, value)| entity.attribute(field) != Some(*value))
        .map(|(field, value)| (field.clone(), value.clone()))
        .collect()
}

pub(crate) fn check_immutable(
    fields: &[&str],
    desired: &Map<String, Value>,
    entity: &PlatformEntity,
) -> Result<(), PlanError> {
    for field in fields {
        if let (Some(want), Some(have)) = (desired.get(*field), entity.attribute(field)) {
            if want != have {
                return Err(PlanError::Immutable {
                    field: (*field).to_string(),
                    current: have.to_string(),
                    desired: want.to_string(),
                });
            }
        }
    }
    Ok(())
}

/// Insert `value` when present
pub(crate) fn put_opt<T: Into<Value>>(attrs: &mut Map<String, Value>, field: &str, value: Option<T>) {
    if let Some(value) = value {
        attrs.insert(field.to_string(), value.into());
    }
}

/// Insert a list when it is not empty
pub(crate) fn put_list(attrs: &mut Map<String, Value>, field: &str, values: &[String]) {
    if !values.is_empty() {
        attrs.insert(field.to_string(), Value::from(values.to_vec()));
    }
}

pub(crate) fn spec_mismatch(kind: ResourceKind) -> PlanError {
    PlanError::Invalid(format!("resource does not carry a {kind} spec"))
}

static SYSTEM: system::SystemReconciler = system::SystemReconciler;
static HOST: host::HostReconciler = host::HostReconciler;
static PLATFORM_NETWORK: network::PlatformNetworkReconciler = network::PlatformNetworkReconciler;
static DATA_NETWORK: network::DataNetworkReconciler = network::DataNetworkReconciler;
static INTERFACE: interface::InterfaceReconciler = interface::InterfaceReconciler;
static STORAGE_BACKEND: storage::StorageBackendReconciler = storage::StorageBackendReconciler;
static PTP_INSTANCE: ptp::PtpInstanceReconciler = ptp::PtpInstanceReconciler;
static PTP_INTERFACE: ptp::PtpInterfaceReconciler = ptp::PtpInterfaceReconciler;

#[must_use]
pub fn for_kind(kind: ResourceKind) -> &'static dyn KindReconciler {
    match kind {
        ResourceKind::System => &SYSTEM,
        ResourceKind::Host => &HOST,
        ResourceKind::PlatformNetwork => &PLATFORM_NETWORK,
        ResourceKind::DataNetwork => &DATA_NETWORK,
        ResourceKind::Interface => &INTERFACE,
        ResourceKind::StorageBackend => &STORAGE_BACKEND,
        ResourceKind::PtpInstance => &PTP_INSTANCE,
        ResourceKind::PtpInterface => &PTP_INTERFACE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    pub(super) fn entity(id: &str, attributes: Value) -> PlatformEntity {
        let Value::Object(attributes) = attributes else {
            panic!("attributes must be an object");
        };
        PlatformEntity {
            id: id.to_string(),
            attributes,
            task: None,
        }
    }

    #[test]
    fn diff_only_reports_changed_fields() {
        let desired: Map<String, Value> =
            serde_json::from_value(json!({"name": "mgmt", "mtu": 1500})).unwrap();
        let current = entity("n1", json!({"uuid": "n1", "name": "mgmt", "mtu": 9000}));
        let changes = diff(&desired, &current);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes["mtu"], json!(1500));
    }

    #[test]
    fn every_kind_has_a_reconciler() {
        for kind in ResourceKind::ALL {
            assert_eq!(for_kind(kind).kind(), kind);
        }
    }

    #[test]
    fn soft_dependency_does_not_resolve_a_required_id() {
        let resource = DesiredResource::new(
            crate::crd::ResourceKey::new(ResourceKind::System, "deployment", "default"),
            ResourceSpec::System(crate::crd::SystemSpec::default()),
        );
        let deps = vec![ReadyDependency {
            upstream: ResourceRef::new(ResourceKind::Interface, "if-a"),
            platform_id: Some("i1".to_string()),
            hard: false,
        }];
        let ctx = PlanContext::new(&resource, &deps);
        assert_eq!(ctx.platform_id(ResourceKind::Interface, "if-a"), Some("i1"));
        assert!(matches!(
            ctx.required_id(ResourceKind::Interface, "if-a"),
            Err(PlanError::UpstreamUnresolved(_))
        ));
    }

    #[test]
    fn update_label_names_fields() {
        let step = Step::Update {
            id: "x".to_string(),
            changes: serde_json::from_value(json!({"imtu": 9000, "ifclass": "data"})).unwrap(),
        };
        assert_eq!(step.label(), "update:ifclass,imtu");
    }
}
