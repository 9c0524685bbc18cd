//! # Custom Resource Definitions
//!
//! CRD types for the Deployment Manager Controller.
//!
//! ## Module Structure
//!
//! - `kind.rs` - The closed set of resource kinds
//! - `status.rs` - Status subresource shared by every kind
//! - `resource.rs` - Kind-independent view used by the reconciliation engine
//! - `system.rs`, `host.rs`, `network.rs`, `interface.rs`, `storage.rs`, `ptp.rs` - Per-kind specs

mod host;
mod interface;
mod kind;
mod network;
mod ptp;
mod resource;
mod status;
mod storage;
mod system;

pub use host::{AdministrativeState, Host, HostSpec, Personality};
pub use interface::{Interface, InterfaceClass, InterfaceSpec, InterfaceType};
pub use kind::{ResourceKind, UnknownKind};
pub use network::{DataNetwork, DataNetworkSpec, DataNetworkType, PlatformNetwork, PlatformNetworkSpec};
pub use ptp::{PtpInstance, PtpInstanceSpec, PtpInterface, PtpInterfaceSpec, PtpService};
pub use resource::{
    DeletionPolicy, DeploymentResource, DesiredResource, ResourceKey, ResourceRef, ResourceSpec,
};
pub use status::{Condition, ConvergencePhase, DeploymentState, ResourceStatus};
pub use storage::{BackendType, StorageBackend, StorageBackendSpec};
pub use system::{System, SystemSpec};

#[must_use]
pub fn default_true() -> bool {
    true
}

/// CRD manifests for every kind, in dependency order
#[must_use]
pub fn all_crds() -> Vec<k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition>
{
    use kube::CustomResourceExt;
    vec![
        System::crd(),
        Host::crd(),
        PlatformNetwork::crd(),
        DataNetwork::crd(),
        Interface::crd(),
        StorageBackend::crd(),
        PtpInstance::crd(),
        PtpInterface::crd(),
    ]
}
