//! # Outcome
//!
//! Result of one reconcile attempt: what to publish and when to run again.

use crate::controller::convergence::deployment_state;
use crate::controller::retry::ErrorClass;
use crate::crd::{Condition, ConvergencePhase, DeploymentState, ResourceKey};
use std::time::Duration;

pub const CONDITION_READY: &str = "Ready";
pub const CONDITION_DEPENDENCIES_SATISFIED: &str = "DependenciesSatisfied";
pub const CONDITION_RECONCILING: &str = "Reconciling";

/// Condition types written by the controller; any other type is left alone
pub const OWNED_CONDITIONS: [&str; 3] = [
    CONDITION_READY,
    CONDITION_DEPENDENCIES_SATISFIED,
    CONDITION_RECONCILING,
];

pub const REASON_DEPENDENCY_CYCLE: &str = "DependencyCycle";
pub const REASON_TEARDOWN_REJECTED: &str = "TeardownRejected";
pub const REASON_ENTITY_NOT_FOUND: &str = "EntityNotFound";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDirective {
    /// Wait for a change
    None,
    Immediate,
    /// Fixed delay, attempt counter untouched
    After(Duration),
    /// Exponential backoff on the per-key counter
    Backoff,
}

impl RetryDirective {
    /// Metric label for the requeue reason
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            RetryDirective::None => "none",
            RetryDirective::Immediate => "immediate",
            RetryDirective::After(_) => "fixed",
            RetryDirective::Backoff => "backoff",
        }
    }
}

/// A classified failure of the current attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub class: ErrorClass,
    pub reason: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub key: ResourceKey,
    /// Generation the attempt evaluated
    pub generation: i64,
    pub phase: ConvergencePhase,
    pub deployment_state: DeploymentState,
    pub conditions: Vec<Condition>,
    pub applied_fingerprint: Option<String>,
    pub platform_id: Option<String>,
    pub blocked_by: Vec<String>,
    pub retry: RetryDirective,
    pub error: Option<ErrorClass>,
    /// Phases entered during the attempt
    pub transitions: Vec<ConvergencePhase>,
    /// Mutating platform calls issued
    pub remote_mutations: u32,
    /// The finalizer was released or the object is gone; nothing to publish
    pub finalized: bool,
    pub publish: bool,
    /// Re-trigger token acted upon, to be cleared after publishing
    pub retrigger_consumed: Option<String>,
}

impl Outcome {
    #[must_use]
    pub fn new(key: ResourceKey, generation: i64, phase: ConvergencePhase) -> Self {
        Self {
            key,
            generation,
            phase,
            deployment_state: deployment_state(phase),
            conditions: Vec::new(),
            applied_fingerprint: None,
            platform_id: None,
            blocked_by: Vec::new(),
            retry: RetryDirective::None,
            error: None,
            transitions: Vec::new(),
            remote_mutations: 0,
            finalized: false,
            publish: true,
            retrigger_consumed: None,
        }
    }

    /// The resource no longer exists
    #[must_use]
    pub fn gone(key: ResourceKey) -> Self {
        Self {
            finalized: true,
            publish: false,
            ..Self::new(key, 0, ConvergencePhase::Deleted)
        }
    }

    /// Nothing to do and nothing to publish
    #[must_use]
    pub fn skipped(key: ResourceKey, generation: i64, phase: ConvergencePhase) -> Self {
        Self {
            publish: false,
            ..Self::new(key, generation, phase)
        }
    }

    /// Metric label for the result of the attempt
    #[must_use]
    pub fn result_label(&self) -> &'static str {
        if self.finalized {
            return "deleted";
        }
        if !self.publish {
            return "skipped";
        }
        match (self.phase, self.error) {
            (ConvergencePhase::Converged, _) => "converged",
            (ConvergencePhase::Failed, _) => "failed",
            (_, Some(_)) => "error",
            _ if !self.blocked_by.is_empty() => "blocked",
            _ => "progressing",
        }
    }
}

/// Conditions owned by the controller for a finished attempt
#[must_use]
pub fn build_conditions(
    phase: ConvergencePhase,
    blocked_by: &[String],
    waiting_on_dependents: bool,
    failure: Option<&Failure>,
) -> Vec<Condition> {
    let ready = match (phase, failure) {
        (ConvergencePhase::Converged, _) => Condition::new(
            CONDITION_READY,
            true,
            "Converged",
            "Platform state matches the desired spec",
        ),
        (_, Some(failure)) => {
            Condition::new(CONDITION_READY, false, &failure.reason, failure.message.clone())
        }
        (ConvergencePhase::Deleting, None) if waiting_on_dependents => Condition::new(
            CONDITION_READY,
            false,
            "DependentsPresent",
            format!("Waiting for dependents: {}", blocked_by.join(", ")),
        ),
        (ConvergencePhase::Deleting | ConvergencePhase::Deleted, None) => Condition::new(
            CONDITION_READY,
            false,
            "Deleting",
            "Removing the platform entity",
        ),
        (_, None) if !blocked_by.is_empty() => Condition::new(
            CONDITION_READY,
            false,
            "DependenciesNotReady",
            format!("Waiting for: {}", blocked_by.join(", ")),
        ),
        (ConvergencePhase::Applying, None) => Condition::new(
            CONDITION_READY,
            false,
            "Applying",
            "Changes are being applied to the platform",
        ),
        (_, None) => Condition::new(CONDITION_READY, false, "Pending", "Awaiting reconciliation"),
    };

    let cycle = failure.filter(|f| f.reason == REASON_DEPENDENCY_CYCLE);
    let dependencies = if let Some(failure) = cycle {
        Condition::new(
            CONDITION_DEPENDENCIES_SATISFIED,
            false,
            REASON_DEPENDENCY_CYCLE,
            failure.message.clone(),
        )
    } else if !blocked_by.is_empty() && !waiting_on_dependents {
        Condition::new(
            CONDITION_DEPENDENCIES_SATISFIED,
            false,
            "DependenciesNotReady",
            blocked_by.join(", "),
        )
    } else {
        Condition::new(
            CONDITION_DEPENDENCIES_SATISFIED,
            true,
            "DependenciesReady",
            "All hard prerequisites are Ready",
        )
    };

    let reconciling = match phase {
        ConvergencePhase::Unknown
        | ConvergencePhase::Pending
        | ConvergencePhase::Applying
        | ConvergencePhase::Deleting => Condition::new(
            CONDITION_RECONCILING,
            true,
            phase.as_str(),
            "Reconciliation in progress",
        ),
        ConvergencePhase::Converged | ConvergencePhase::Failed | ConvergencePhase::Deleted => {
            Condition::new(CONDITION_RECONCILING, false, "Settled", "No reconciliation in progress")
        }
    };

    vec![ready, dependencies, reconciling]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocked_resource_lists_prerequisites() {
        let conditions = build_conditions(
            ConvergencePhase::Pending,
            &["Host/controller-0 (not ready: Failed)".to_string()],
            false,
            None,
        );
        assert_eq!(conditions[0].reason.as_deref(), Some("DependenciesNotReady"));
        assert!(!conditions[1].is_true());
        assert!(conditions[2].is_true());
    }

    #[test]
    fn failure_reason_wins_over_phase() {
        let failure = Failure {
            class: ErrorClass::Configuration,
            reason: REASON_DEPENDENCY_CYCLE.to_string(),
            message: "dependency cycle: Interface/a -> Interface/b -> Interface/a".to_string(),
        };
        let conditions = build_conditions(ConvergencePhase::Failed, &[], false, Some(&failure));
        assert_eq!(conditions[0].reason.as_deref(), Some(REASON_DEPENDENCY_CYCLE));
        assert_eq!(conditions[1].reason.as_deref(), Some(REASON_DEPENDENCY_CYCLE));
        assert!(!conditions[2].is_true());
    }

    #[test]
    fn converged_is_ready() {
        let conditions = build_conditions(ConvergencePhase::Converged, &[], false, None);
        assert!(conditions[0].is_true());
        assert!(conditions[1].is_true());
    }
}
