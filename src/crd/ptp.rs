//! # PTP
//!
//! Precision time protocol instances and the interfaces bound to them.

use serde::{Deserialize, Serialize};

/// PtpInstance Custom Resource Definition
#[derive(
    kube::CustomResource, Debug, Clone, PartialEq, Deserialize, Serialize, schemars::JsonSchema,
)]
#[kube(
    kind = "PtpInstance",
    group = "deployment-manager.starlingx.io",
    version = "v1",
    namespaced,
    status = "crate::crd::ResourceStatus",
    shortname = "dmptpi",
    printcolumn = r#"{"name":"Service", "type":"string", "jsonPath":".spec.service"}, {"name":"State", "type":"string", "jsonPath":".status.deploymentState"}, {"name":"Ready", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct PtpInstanceSpec {
    pub service: PtpService,
    /// `key=value` parameters passed to the service
    #[serde(default)]
    pub parameters: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum PtpService {
    Ptp4l,
    Phc2sys,
    Ts2phc,
    Clock,
}

impl PtpService {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            PtpService::Ptp4l => "ptp4l",
            PtpService::Phc2sys => "phc2sys",
            PtpService::Ts2phc => "ts2phc",
            PtpService::Clock => "clock",
        }
    }
}

/// PtpInterface Custom Resource Definition
#[derive(
    kube::CustomResource, Debug, Clone, PartialEq, Deserialize, Serialize, schemars::JsonSchema,
)]
#[kube(
    kind = "PtpInterface",
    group = "deployment-manager.starlingx.io",
    version = "v1",
    namespaced,
    status = "crate::crd::ResourceStatus",
    shortname = "dmptpif",
    printcolumn = r#"{"name":"Instance", "type":"string", "jsonPath":".spec.ptpInstance"}, {"name":"State", "type":"string", "jsonPath":".status.deploymentState"}, {"name":"Ready", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct PtpInterfaceSpec {
    /// Name of the owning PtpInstance resource
    pub ptp_instance: String,
    /// Interface resources bound once they are Ready
    #[serde(default)]
    pub interfaces: Vec<String>,
    #[serde(default)]
    pub parameters: Vec<String>,
}
