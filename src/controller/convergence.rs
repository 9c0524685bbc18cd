//! # Convergence
//!
//! Per-resource lifecycle tracking and spec fingerprints.
//!
//! ```text
//! Unknown -> Pending -> Applying -> Converged
//!              ^  \________________/    |
//!              |_________ drift ________|
//! any live phase -> Failed (fatal)      any phase but Deleted -> Deleting -> Deleted
//! ```

use crate::controller::dependency::ReadyDependency;
use crate::crd::{ConvergencePhase, DeploymentState, ResourceSpec};
use sha2::{Digest, Sha256};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvergenceEvent {
    Observed,
    BeganApply,
    /// The platform entity was re-read and matches the desired state
    ConfirmedConverged,
    TransientFailure,
    DriftDetected,
    Blocked,
    Retriggered,
    FatalFailure,
    DeletionRequested,
    TeardownConfirmed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid convergence transition from {from} on {event:?}")]
pub struct TransitionError {
    pub from: ConvergencePhase,
    pub event: ConvergenceEvent,
}

/// Next phase for `event` in `from`
///
/// # Errors
/// Returns [`TransitionError`] when the event is not valid in `from`.
pub fn transition(
    from: ConvergencePhase,
    event: ConvergenceEvent,
) -> Result<ConvergencePhase, TransitionError> {
    use ConvergenceEvent as E;
    use ConvergencePhase as P;

    let to = match (from, event) {
        (P::Unknown, E::Observed) => P::Pending,
        (P::Pending | P::Applying, E::BeganApply) => P::Applying,
        // Pending -> Converged covers a crash between the remote call and the status write
        (P::Pending | P::Applying, E::ConfirmedConverged) => P::Converged,
        (P::Pending | P::Applying, E::TransientFailure) => P::Pending,
        (P::Converged, E::DriftDetected) => P::Pending,
        (P::Pending | P::Applying | P::Converged, E::Blocked) => P::Pending,
        (P::Failed, E::Retriggered) => P::Pending,
        (phase, E::FatalFailure) if phase != P::Deleted => P::Failed,
        (phase, E::DeletionRequested) if phase != P::Deleted => P::Deleting,
        (P::Deleting, E::TeardownConfirmed) => P::Deleted,
        _ => return Err(TransitionError { from, event }),
    };
    Ok(to)
}

/// Deployment state reported for a phase
#[must_use]
pub fn deployment_state(phase: ConvergencePhase) -> DeploymentState {
    match phase {
        ConvergencePhase::Unknown | ConvergencePhase::Pending | ConvergencePhase::Deleted => {
            DeploymentState::Pending
        }
        ConvergencePhase::Applying | ConvergencePhase::Deleting => DeploymentState::InProgress,
        ConvergencePhase::Converged => DeploymentState::Ready,
        ConvergencePhase::Failed => DeploymentState::Failed,
    }
}

/// Phase of one resource during a single attempt, with the transitions taken
#[derive(Debug, Clone)]
pub struct Convergence {
    phase: ConvergencePhase,
    transitions: Vec<ConvergencePhase>,
}

impl Convergence {
    #[must_use]
    pub fn new(phase: ConvergencePhase) -> Self {
        Self {
            phase,
            transitions: Vec::new(),
        }
    }

    #[must_use]
    pub fn phase(&self) -> ConvergencePhase {
        self.phase
    }

    /// Phases entered during this attempt, in order
    #[must_use]
    pub fn transitions(&self) -> &[ConvergencePhase] {
        &self.transitions
    }

    pub fn apply(&mut self, event: ConvergenceEvent) -> Result<ConvergencePhase, TransitionError> {
        let next = transition(self.phase, event)?;
        if next != self.phase {
            self.transitions.push(next);
        }
        self.phase = next;
        Ok(next)
    }
}

/// Content hash of a spec together with the Ready dependencies it was applied against
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    #[must_use]
    pub fn compute(spec: &ResourceSpec, dependencies: &[ReadyDependency]) -> Self {
        let mut upstream: Vec<String> = dependencies
            .iter()
            .map(|d| {
                format!(
                    "{}@{}",
                    d.upstream,
                    d.platform_id.as_deref().unwrap_or_default()
                )
            })
            .collect();
        upstream.sort();
        upstream.dedup();

        // serde_json maps serialize with sorted keys, which keeps the encoding canonical
        let canonical = serde_json::json!({
            "kind": spec.kind().as_str(),
            "spec": spec,
            "dependencies": upstream,
        });

        let digest = Sha256::digest(canonical.to_string().as_bytes());
        Self(digest.iter().map(|b| format!("{b:02x}")).collect())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{DataNetworkSpec, DataNetworkType, ResourceKind, ResourceRef};
    use ConvergenceEvent as E;
    use ConvergencePhase as P;

    #[test]
    fn happy_path_reaches_converged() {
        let mut convergence = Convergence::new(P::Unknown);
        convergence.apply(E::Observed).unwrap();
        convergence.apply(E::BeganApply).unwrap();
        convergence.apply(E::ConfirmedConverged).unwrap();
        assert_eq!(convergence.phase(), P::Converged);
        assert_eq!(convergence.transitions(), &[P::Pending, P::Applying, P::Converged]);
    }

    #[test]
    fn invalid_transitions_are_rejected() {
        assert!(transition(P::Unknown, E::ConfirmedConverged).is_err());
        assert!(transition(P::Converged, E::BeganApply).is_err());
        assert!(transition(P::Failed, E::BeganApply).is_err());
        assert!(transition(P::Deleted, E::FatalFailure).is_err());
        assert!(transition(P::Deleted, E::DeletionRequested).is_err());
        assert!(transition(P::Applying, E::TeardownConfirmed).is_err());
    }

    #[test]
    fn failure_and_deletion_reach_from_live_phases() {
        for phase in [P::Unknown, P::Pending, P::Applying, P::Converged, P::Deleting] {
            assert_eq!(transition(phase, E::FatalFailure), Ok(P::Failed));
        }
        for phase in [P::Unknown, P::Pending, P::Applying, P::Converged, P::Failed] {
            assert_eq!(transition(phase, E::DeletionRequested), Ok(P::Deleting));
        }
        assert_eq!(transition(P::Deleting, E::TeardownConfirmed), Ok(P::Deleted));
    }

    #[test]
    fn phases_map_to_deployment_states() {
        assert_eq!(deployment_state(P::Applying), DeploymentState::InProgress);
        assert_eq!(deployment_state(P::Deleting), DeploymentState::InProgress);
        assert_eq!(deployment_state(P::Converged), DeploymentState::Ready);
        assert_eq!(deployment_state(P::Failed), DeploymentState::Failed);
        assert_eq!(deployment_state(P::Unknown), DeploymentState::Pending);
    }

    #[test]
    fn fingerprint_tracks_spec_and_ready_dependencies() {
        let spec = ResourceSpec::DataNetwork(DataNetworkSpec {
            network_type: DataNetworkType::Vlan,
            mtu: Some(1500),
            description: None,
        });
        let system = ReadyDependency {
            upstream: ResourceRef::new(ResourceKind::System, "default"),
            platform_id: Some("sys-1".to_string()),
            hard: true,
        };

        let base = Fingerprint::compute(&spec, std::slice::from_ref(&system));
        assert_eq!(base, Fingerprint::compute(&spec, std::slice::from_ref(&system)));
        assert_eq!(base.as_str().len(), 64);

        let mut replaced = system.clone();
        replaced.platform_id = Some("sys-2".to_string());
        assert_ne!(base, Fingerprint::compute(&spec, &[replaced]));

        let ResourceSpec::DataNetwork(mut changed) = spec.clone() else {
            unreachable!()
        };
        changed.mtu = Some(9000);
        assert_ne!(
            base,
            Fingerprint::compute(&ResourceSpec::DataNetwork(changed), &[system])
        );
    }
}
