//! # Desired Resources
//!
//! Kind-independent view of a deployment resource. Every per-kind custom
//! resource is converted into a [`DesiredResource`] before it reaches the
//! reconciliation engine, so the engine never needs to know the concrete type.

use crate::constants::{
    DELETION_POLICY_ANNOTATION, FINALIZER, RETRIGGER_ANNOTATION, SUSPEND_ANNOTATION,
};
use crate::crd::{
    DataNetwork, DataNetworkSpec, Host, HostSpec, Interface, InterfaceSpec, PlatformNetwork,
    PlatformNetworkSpec, PtpInstance, PtpInstanceSpec, PtpInterface, PtpInterfaceSpec,
    ResourceKind, ResourceStatus, StorageBackend, StorageBackendSpec, System, SystemSpec,
};
use k8s_openapi::NamespaceResourceScope;
use kube::{Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a resource: kind, namespace and name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceKey {
    pub kind: ResourceKind,
    pub namespace: String,
    pub name: String,
}

impl ResourceKey {
    pub fn new(kind: ResourceKind, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind,
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Reference to this resource from within its namespace
    #[must_use]
    pub fn to_ref(&self) -> ResourceRef {
        ResourceRef::new(self.kind, self.name.clone())
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.kind, self.namespace, self.name)
    }
}

/// Namespace-relative reference to another resource
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceRef {
    pub kind: ResourceKind,
    pub name: String,
}

impl ResourceRef {
    pub fn new(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.name)
    }
}

/// Spec of any resource kind
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResourceSpec {
    System(SystemSpec),
    Host(HostSpec),
    PlatformNetwork(PlatformNetworkSpec),
    DataNetwork(DataNetworkSpec),
    Interface(InterfaceSpec),
    StorageBackend(StorageBackendSpec),
    PtpInstance(PtpInstanceSpec),
    PtpInterface(PtpInterfaceSpec),
}

impl ResourceSpec {
    #[must_use]
    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourceSpec::System(_) => ResourceKind::System,
            ResourceSpec::Host(_) => ResourceKind::Host,
            ResourceSpec::PlatformNetwork(_) => ResourceKind::PlatformNetwork,
            ResourceSpec::DataNetwork(_) => ResourceKind::DataNetwork,
            ResourceSpec::Interface(_) => ResourceKind::Interface,
            ResourceSpec::StorageBackend(_) => ResourceKind::StorageBackend,
            ResourceSpec::PtpInstance(_) => ResourceKind::PtpInstance,
            ResourceSpec::PtpInterface(_) => ResourceKind::PtpInterface,
        }
    }

    /// Names of the `prerequisite` resources this spec refers to by name
    #[must_use]
    pub fn referenced_names(&self, prerequisite: ResourceKind) -> Vec<&str> {
        match (self, prerequisite) {
            (ResourceSpec::Host(spec), ResourceKind::PtpInstance) => {
                spec.ptp_instances.iter().map(String::as_str).collect()
            }
            (ResourceSpec::Interface(spec), ResourceKind::Host) => vec![spec.host.as_str()],
            (ResourceSpec::Interface(spec), ResourceKind::Interface) => {
                spec.lower_interfaces.iter().map(String::as_str).collect()
            }
            (ResourceSpec::Interface(spec), ResourceKind::PlatformNetwork) => {
                spec.platform_networks.iter().map(String::as_str).collect()
            }
            (ResourceSpec::Interface(spec), ResourceKind::DataNetwork) => {
                spec.data_networks.iter().map(String::as_str).collect()
            }
            (ResourceSpec::PtpInterface(spec), ResourceKind::PtpInstance) => {
                vec![spec.ptp_instance.as_str()]
            }
            (ResourceSpec::PtpInterface(spec), ResourceKind::Interface) => {
                spec.interfaces.iter().map(String::as_str).collect()
            }
            _ => Vec::new(),
        }
    }
}

/// What happens to the platform entity when the resource is deleted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DeletionPolicy {
    #[default]
    Delete,
    /// Leave the platform entity in place and only release the finalizer
    Orphan,
}

/// A resource as seen by the reconciliation engine
#[derive(Debug, Clone, PartialEq)]
pub struct DesiredResource {
    pub key: ResourceKey,
    pub spec: ResourceSpec,
    pub generation: i64,
    pub deletion_requested: bool,
    pub finalizers: Vec<String>,
    pub resource_version: Option<String>,
    pub status: ResourceStatus,
    /// Value of the re-trigger annotation, if set
    pub retrigger: Option<String>,
    pub suspended: bool,
    pub deletion_policy: DeletionPolicy,
}

impl DesiredResource {
    /// A freshly created resource at generation 1
    #[must_use]
    pub fn new(key: ResourceKey, spec: ResourceSpec) -> Self {
        Self {
            key,
            spec,
            generation: 1,
            deletion_requested: false,
            finalizers: Vec::new(),
            resource_version: None,
            status: ResourceStatus::default(),
            retrigger: None,
            suspended: false,
            deletion_policy: DeletionPolicy::Delete,
        }
    }

    /// Convert a typed custom resource
    pub fn from_object<K: DeploymentResource>(obj: &K) -> Self {
        let annotations = obj.annotations();
        let deletion_policy = match annotations.get(DELETION_POLICY_ANNOTATION).map(String::as_str) {
            Some("orphan") => DeletionPolicy::Orphan,
            _ => DeletionPolicy::Delete,
        };
        Self {
            key: obj.resource_key(),
            spec: obj.resource_spec(),
            generation: obj.meta().generation.unwrap_or(1),
            deletion_requested: obj.meta().deletion_timestamp.is_some(),
            finalizers: obj.finalizers().to_vec(),
            resource_version: obj.resource_version(),
            status: obj.resource_status().cloned().unwrap_or_default(),
            retrigger: annotations.get(RETRIGGER_ANNOTATION).cloned(),
            suspended: annotations
                .get(SUSPEND_ANNOTATION)
                .is_some_and(|v| v.eq_ignore_ascii_case("true")),
            deletion_policy,
        }
    }

    #[must_use]
    pub fn has_finalizer(&self) -> bool {
        self.finalizers.iter().any(|f| f == FINALIZER)
    }

    /// Whether the status reflects a Ready resource at its current generation
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.status.deployment_state == crate::crd::DeploymentState::Ready
            && self.status.observed_generation == Some(self.generation)
    }
}

/// Typed custom resources the controller reconciles
pub trait DeploymentResource:
    Resource<Scope = NamespaceResourceScope, DynamicType = ()>
    + Clone
    + DeserializeOwned
    + Serialize
    + fmt::Debug
    + Send
    + Sync
    + 'static
{
    const KIND: ResourceKind;

    fn resource_spec(&self) -> ResourceSpec;

    fn resource_status(&self) -> Option<&ResourceStatus>;

    fn resource_key(&self) -> ResourceKey {
        ResourceKey::new(
            Self::KIND,
            self.namespace().unwrap_or_else(|| "default".to_string()),
            self.name_any(),
        )
    }
}

macro_rules! deployment_resource {
    ($ty:ty, $kind:ident) => {
        impl DeploymentResource for $ty {
            const KIND: ResourceKind = ResourceKind::$kind;

            fn resource_spec(&self) -> ResourceSpec {
                ResourceSpec::$kind(self.spec.clone())
            }

            fn resource_status(&self) -> Option<&ResourceStatus> {
                self.status.as_ref()
            }
        }
    };
}

deployment_resource!(System, System);
deployment_resource!(Host, Host);
deployment_resource!(PlatformNetwork, PlatformNetwork);
deployment_resource!(DataNetwork, DataNetwork);
deployment_resource!(Interface, Interface);
deployment_resource!(StorageBackend, StorageBackend);
deployment_resource!(PtpInstance, PtpInstance);
deployment_resource!(PtpInterface, PtpInterface);

/// Run `$body` with `$alias` bound to the custom resource type of `$kind`
///
/// ```ignore
/// let count = with_kind!(kind, K => list_typed::<K>(&client).await?);
/// ```
#[macro_export]
macro_rules! with_kind {
    ($kind:expr, $alias:ident => $body:expr) => {
        match $kind {
            $crate::crd::ResourceKind::System => {
                type $alias = $crate::crd::System;
                $body
            }
            $crate::crd::ResourceKind::Host => {
                type $alias = $crate::crd::Host;
                $body
            }
            $crate::crd::ResourceKind::PlatformNetwork => {
                type $alias = $crate::crd::PlatformNetwork;
                $body
            }
            $crate::crd::ResourceKind::DataNetwork => {
                type $alias = $crate::crd::DataNetwork;
                $body
            }
            $crate::crd::ResourceKind::Interface => {
                type $alias = $crate::crd::Interface;
                $body
            }
            $crate::crd::ResourceKind::StorageBackend => {
                type $alias = $crate::crd::StorageBackend;
                $body
            }
            $crate::crd::ResourceKind::PtpInstance => {
                type $alias = $crate::crd::PtpInstance;
                $body
            }
            $crate::crd::ResourceKind::PtpInterface => {
                type $alias = $crate::crd::PtpInterface;
                $body
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{InterfaceClass, InterfaceType};
    use std::collections::BTreeMap;

    fn interface_spec() -> InterfaceSpec {
        InterfaceSpec {
            host: "controller-0".to_string(),
            interface_name: "mgmt0".to_string(),
            interface_class: InterfaceClass::Platform,
            interface_type: InterfaceType::Vlan,
            port: None,
            vlan_id: Some(10),
            lower_interfaces: vec!["controller-0-enp0s8".to_string()],
            platform_networks: vec!["mgmt".to_string()],
            data_networks: Vec::new(),
            mtu: None,
        }
    }

    #[test]
    fn interface_references_resolve_per_prerequisite_kind() {
        let spec = ResourceSpec::Interface(interface_spec());
        assert_eq!(spec.referenced_names(ResourceKind::Host), vec!["controller-0"]);
        assert_eq!(
            spec.referenced_names(ResourceKind::Interface),
            vec!["controller-0-enp0s8"]
        );
        assert_eq!(spec.referenced_names(ResourceKind::PlatformNetwork), vec!["mgmt"]);
        assert!(spec.referenced_names(ResourceKind::DataNetwork).is_empty());
        assert!(spec.referenced_names(ResourceKind::System).is_empty());
    }

    #[test]
    fn annotations_map_onto_desired_resource() {
        let mut obj = Interface::new("controller-0-mgmt0", interface_spec());
        obj.metadata.namespace = Some("deployment".to_string());
        obj.metadata.generation = Some(3);
        obj.metadata.annotations = Some(BTreeMap::from([
            (DELETION_POLICY_ANNOTATION.to_string(), "orphan".to_string()),
            (SUSPEND_ANNOTATION.to_string(), "True".to_string()),
            (RETRIGGER_ANNOTATION.to_string(), "1718000000".to_string()),
        ]));

        let desired = DesiredResource::from_object(&obj);

        assert_eq!(
            desired.key,
            ResourceKey::new(ResourceKind::Interface, "deployment", "controller-0-mgmt0")
        );
        assert_eq!(desired.generation, 3);
        assert_eq!(desired.deletion_policy, DeletionPolicy::Orphan);
        assert!(desired.suspended);
        assert_eq!(desired.retrigger.as_deref(), Some("1718000000"));
        assert!(!desired.deletion_requested);
        assert!(!desired.has_finalizer());
    }

    #[test]
    fn readiness_requires_current_generation() {
        let mut desired = DesiredResource::new(
            ResourceKey::new(ResourceKind::System, "deployment", "default"),
            ResourceSpec::System(SystemSpec::default()),
        );
        desired.status.deployment_state = crate::crd::DeploymentState::Ready;
        desired.status.observed_generation = Some(1);
        assert!(desired.is_ready());

        desired.generation = 2;
        assert!(!desired.is_ready(), "stale Ready must not count as Ready");
    }
}
