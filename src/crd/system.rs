//! # System
//!
//! The system record of the platform. There is exactly one per platform; the
//! controller only adjusts its attributes, it never creates or removes it.

use serde::{Deserialize, Serialize};

/// System Custom Resource Definition
///
/// # Example
///
/// ```yaml
/// apiVersion: deployment-manager.starlingx.io/v1
/// kind: System
/// metadata:
///   name: default
///   namespace: deployment
/// spec:
///   description: edge site 14
///   timezone: UTC
///   dnsServers: ["8.8.8.8"]
/// ```
#[derive(
    kube::CustomResource, Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema,
)]
#[kube(
    kind = "System",
    group = "deployment-manager.starlingx.io",
    version = "v1",
    namespaced,
    status = "crate::crd::ResourceStatus",
    shortname = "dmsys",
    printcolumn = r#"{"name":"State", "type":"string", "jsonPath":".status.deploymentState"}, {"name":"Phase", "type":"string", "jsonPath":".status.phase"}, {"name":"Ready", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct SystemSpec {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub contact: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub dns_servers: Vec<String>,
    #[serde(default)]
    pub ntp_servers: Vec<String>,
}
