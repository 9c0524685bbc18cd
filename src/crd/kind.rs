//! # Resource Kinds
//!
//! The closed set of resource kinds the controller reconciles.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of a deployment resource
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum ResourceKind {
    System,
    Host,
    PlatformNetwork,
    DataNetwork,
    Interface,
    StorageBackend,
    PtpInstance,
    PtpInterface,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 8] = [
        ResourceKind::System,
        ResourceKind::Host,
        ResourceKind::PlatformNetwork,
        ResourceKind::DataNetwork,
        ResourceKind::Interface,
        ResourceKind::StorageBackend,
        ResourceKind::PtpInstance,
        ResourceKind::PtpInterface,
    ];

    /// Kubernetes kind name
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::System => "System",
            ResourceKind::Host => "Host",
            ResourceKind::PlatformNetwork => "PlatformNetwork",
            ResourceKind::DataNetwork => "DataNetwork",
            ResourceKind::Interface => "Interface",
            ResourceKind::StorageBackend => "StorageBackend",
            ResourceKind::PtpInstance => "PtpInstance",
            ResourceKind::PtpInterface => "PtpInterface",
        }
    }

    /// Collection name of the matching entity on the platform inventory API
    #[must_use]
    pub fn collection(&self) -> &'static str {
        match self {
            ResourceKind::System => "isystems",
            ResourceKind::Host => "ihosts",
            ResourceKind::PlatformNetwork => "networks",
            ResourceKind::DataNetwork => "datanetworks",
            ResourceKind::Interface => "iinterfaces",
            ResourceKind::StorageBackend => "storage_backend",
            ResourceKind::PtpInstance => "ptp_instances",
            ResourceKind::PtpInterface => "ptp_interfaces",
        }
    }

    /// Lower-case name used in metric labels and CLI output
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            ResourceKind::System => "system",
            ResourceKind::Host => "host",
            ResourceKind::PlatformNetwork => "platformnetwork",
            ResourceKind::DataNetwork => "datanetwork",
            ResourceKind::Interface => "interface",
            ResourceKind::StorageBackend => "storagebackend",
            ResourceKind::PtpInstance => "ptpinstance",
            ResourceKind::PtpInterface => "ptpinterface",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown resource kind '{0}'")]
pub struct UnknownKind(pub String);

impl FromStr for ResourceKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.to_ascii_lowercase();
        ResourceKind::ALL
            .into_iter()
            .find(|kind| kind.label() == wanted || kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownKind(s.to_string()))
    }
}
