//! # Host
//!
//! A physical node of the platform.

use serde::{Deserialize, Serialize};

/// Host Custom Resource Definition
///
/// # Example
///
/// ```yaml
/// apiVersion: deployment-manager.starlingx.io/v1
/// kind: Host
/// metadata:
///   name: controller-0
///   namespace: deployment
/// spec:
///   personality: controller
///   bootMac: "08:00:27:4a:11:90"
///   administrativeState: unlocked
/// ```
#[derive(
    kube::CustomResource, Debug, Clone, PartialEq, Deserialize, Serialize, schemars::JsonSchema,
)]
#[kube(
    kind = "Host",
    group = "deployment-manager.starlingx.io",
    version = "v1",
    namespaced,
    status = "crate::crd::ResourceStatus",
    shortname = "dmhost",
    printcolumn = r#"{"name":"Personality", "type":"string", "jsonPath":".spec.personality"}, {"name":"State", "type":"string", "jsonPath":".status.deploymentState"}, {"name":"Phase", "type":"string", "jsonPath":".status.phase"}, {"name":"Ready", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct HostSpec {
    /// Hostname on the platform, defaults to the resource name
    #[serde(default)]
    pub hostname: Option<String>,
    pub personality: Personality,
    /// MAC address of the boot interface, used to match a discovered node
    pub boot_mac: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub install_device: Option<String>,
    #[serde(default)]
    pub console: Option<String>,
    #[serde(default)]
    pub administrative_state: AdministrativeState,
    /// PTP instances to attach once they are Ready
    #[serde(default)]
    pub ptp_instances: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Personality {
    Controller,
    Worker,
    Storage,
}

impl Personality {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Personality::Controller => "controller",
            Personality::Worker => "worker",
            Personality::Storage => "storage",
        }
    }
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum AdministrativeState {
    Locked,
    #[default]
    Unlocked,
}

impl AdministrativeState {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            AdministrativeState::Locked => "locked",
            AdministrativeState::Unlocked => "unlocked",
        }
    }
}
