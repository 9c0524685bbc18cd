//! # Networks
//!
//! Platform networks (management, OAM, cluster-host, ...) and data networks
//! used by tenant workloads.

use serde::{Deserialize, Serialize};

/// PlatformNetwork Custom Resource Definition
///
/// The network type and address space cannot change once the network exists
/// on the platform.
#[derive(
    kube::CustomResource, Debug, Clone, PartialEq, Deserialize, Serialize, schemars::JsonSchema,
)]
#[kube(
    kind = "PlatformNetwork",
    group = "deployment-manager.starlingx.io",
    version = "v1",
    namespaced,
    status = "crate::crd::ResourceStatus",
    shortname = "dmpnet",
    printcolumn = r#"{"name":"Type", "type":"string", "jsonPath":".spec.networkType"}, {"name":"Subnet", "type":"string", "jsonPath":".spec.subnet"}, {"name":"State", "type":"string", "jsonPath":".status.deploymentState"}, {"name":"Ready", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct PlatformNetworkSpec {
    /// Platform network type, e.g. `mgmt`, `oam`, `cluster-host`, `pxeboot`
    pub network_type: String,
    pub subnet: String,
    pub prefix: u8,
    #[serde(default)]
    pub gateway: Option<String>,
    #[serde(default)]
    pub range_start: Option<String>,
    #[serde(default)]
    pub range_end: Option<String>,
    #[serde(default = "crate::crd::default_true")]
    pub dynamic: bool,
}

/// DataNetwork Custom Resource Definition
#[derive(
    kube::CustomResource, Debug, Clone, PartialEq, Deserialize, Serialize, schemars::JsonSchema,
)]
#[kube(
    kind = "DataNetwork",
    group = "deployment-manager.starlingx.io",
    version = "v1",
    namespaced,
    status = "crate::crd::ResourceStatus",
    shortname = "dmdnet",
    printcolumn = r#"{"name":"Type", "type":"string", "jsonPath":".spec.networkType"}, {"name":"State", "type":"string", "jsonPath":".status.deploymentState"}, {"name":"Ready", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct DataNetworkSpec {
    pub network_type: DataNetworkType,
    #[serde(default)]
    pub mtu: Option<u32>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum DataNetworkType {
    Flat,
    Vlan,
    Vxlan,
}

impl DataNetworkType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            DataNetworkType::Flat => "flat",
            DataNetworkType::Vlan => "vlan",
            DataNetworkType::Vxlan => "vxlan",
        }
    }
}
