//! # Storage Backend

use serde::{Deserialize, Serialize};

/// StorageBackend Custom Resource Definition
#[derive(
    kube::CustomResource, Debug, Clone, PartialEq, Deserialize, Serialize, schemars::JsonSchema,
)]
#[kube(
    kind = "StorageBackend",
    group = "deployment-manager.starlingx.io",
    version = "v1",
    namespaced,
    status = "crate::crd::ResourceStatus",
    shortname = "dmsb",
    printcolumn = r#"{"name":"Backend", "type":"string", "jsonPath":".spec.backend"}, {"name":"State", "type":"string", "jsonPath":".status.deploymentState"}, {"name":"Ready", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct StorageBackendSpec {
    pub backend: BackendType,
    /// Services served by the backend, e.g. `glance`, `cinder`
    #[serde(default)]
    pub services: Vec<String>,
    #[serde(default)]
    pub replication: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum BackendType {
    Ceph,
    Lvm,
    External,
}

impl BackendType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendType::Ceph => "ceph",
            BackendType::Lvm => "lvm",
            BackendType::External => "external",
        }
    }
}
