//! # Interface
//!
//! A network interface of a host: ethernet port, VLAN or aggregated bond.

use serde::{Deserialize, Serialize};

/// Interface Custom Resource Definition
///
/// # Example
///
/// ```yaml
/// apiVersion: deployment-manager.starlingx.io/v1
/// kind: Interface
/// metadata:
///   name: controller-0-mgmt0
///   namespace: deployment
/// spec:
///   host: controller-0
///   interfaceName: mgmt0
///   interfaceClass: platform
///   interfaceType: vlan
///   vlanId: 10
///   lowerInterfaces: [controller-0-enp0s8]
///   platformNetworks: [mgmt]
/// ```
#[derive(
    kube::CustomResource, Debug, Clone, PartialEq, Deserialize, Serialize, schemars::JsonSchema,
)]
#[kube(
    kind = "Interface",
    group = "deployment-manager.starlingx.io",
    version = "v1",
    namespaced,
    status = "crate::crd::ResourceStatus",
    shortname = "dmif",
    printcolumn = r#"{"name":"Host", "type":"string", "jsonPath":".spec.host"}, {"name":"Name", "type":"string", "jsonPath":".spec.interfaceName"}, {"name":"State", "type":"string", "jsonPath":".status.deploymentState"}, {"name":"Ready", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct InterfaceSpec {
    /// Name of the owning Host resource
    pub host: String,
    pub interface_name: String,
    #[serde(default)]
    pub interface_class: InterfaceClass,
    #[serde(default)]
    pub interface_type: InterfaceType,
    /// Physical port name for ethernet interfaces
    #[serde(default)]
    pub port: Option<String>,
    #[serde(default)]
    pub vlan_id: Option<u16>,
    /// Interface resources this interface is stacked on
    #[serde(default)]
    pub lower_interfaces: Vec<String>,
    #[serde(default)]
    pub platform_networks: Vec<String>,
    #[serde(default)]
    pub data_networks: Vec<String>,
    #[serde(default)]
    pub mtu: Option<u32>,
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema,
)]
#[serde(rename_all = "kebab-case")]
pub enum InterfaceClass {
    #[default]
    None,
    Platform,
    Data,
    PciSriov,
    PciPassthrough,
}

impl InterfaceClass {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            InterfaceClass::None => "none",
            InterfaceClass::Platform => "platform",
            InterfaceClass::Data => "data",
            InterfaceClass::PciSriov => "pci-sriov",
            InterfaceClass::PciPassthrough => "pci-passthrough",
        }
    }
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum InterfaceType {
    #[default]
    Ethernet,
    Vlan,
    Ae,
}

impl InterfaceType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            InterfaceType::Ethernet => "ethernet",
            InterfaceType::Vlan => "vlan",
            InterfaceType::Ae => "ae",
        }
    }
}
