//! # Resource Status
//!
//! Status subresource shared by every deployment resource kind.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse deployment state surfaced to users
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema,
)]
pub enum DeploymentState {
    #[default]
    Pending,
    InProgress,
    Ready,
    Failed,
}

impl DeploymentState {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentState::Pending => "Pending",
            DeploymentState::InProgress => "InProgress",
            DeploymentState::Ready => "Ready",
            DeploymentState::Failed => "Failed",
        }
    }
}

impl fmt::Display for DeploymentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fine-grained convergence phase of a single resource
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema,
)]
pub enum ConvergencePhase {
    #[default]
    Unknown,
    Pending,
    Applying,
    Converged,
    Failed,
    Deleting,
    Deleted,
}

impl ConvergencePhase {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ConvergencePhase::Unknown => "Unknown",
            ConvergencePhase::Pending => "Pending",
            ConvergencePhase::Applying => "Applying",
            ConvergencePhase::Converged => "Converged",
            ConvergencePhase::Failed => "Failed",
            ConvergencePhase::Deleting => "Deleting",
            ConvergencePhase::Deleted => "Deleted",
        }
    }
}

impl fmt::Display for ConvergencePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a deployment resource
///
/// Written only by the controller.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResourceStatus {
    /// Conditions represent the latest available observations
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// Generation the conditions were computed from
    #[serde(default)]
    pub observed_generation: Option<i64>,
    #[serde(default)]
    pub deployment_state: DeploymentState,
    #[serde(default)]
    pub phase: ConvergencePhase,
    /// Fingerprint of the spec and dependencies last applied to the platform
    #[serde(default)]
    pub applied_fingerprint: Option<String>,
    /// Identifier of the matched platform entity
    #[serde(default)]
    pub platform_id: Option<String>,
    /// Prerequisites currently holding this resource back
    #[serde(default)]
    pub blocked_by: Vec<String>,
    /// Failed attempts since the last success
    #[serde(default)]
    pub consecutive_failures: u32,
    /// Last reconciliation time (RFC3339)
    #[serde(default)]
    pub last_reconcile_time: Option<String>,
}

impl ResourceStatus {
    #[must_use]
    pub fn condition(&self, condition_type: &str) -> Option<&Condition> {
        self.conditions.iter().find(|c| c.r#type == condition_type)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    pub r#type: String,
    pub status: String,
    #[serde(default)]
    pub last_transition_time: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl Condition {
    #[must_use]
    pub fn new(condition_type: &str, status: bool, reason: &str, message: impl Into<String>) -> Self {
        Self {
            r#type: condition_type.to_string(),
            status: if status { "True" } else { "False" }.to_string(),
            last_transition_time: None,
            reason: Some(reason.to_string()),
            message: Some(message.into()),
        }
    }

    #[must_use]
    pub fn is_true(&self) -> bool {
        self.status == "True"
    }
}
