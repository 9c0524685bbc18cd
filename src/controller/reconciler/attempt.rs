//! # Attempt
//!
//! Ephemeral state of one reconcile attempt. Never persisted; the published
//! status is derived from it when the attempt finishes.
//!
//! The remote part of an attempt runs under a deadline and borrows the
//! attempt mutably, so everything recorded before the deadline fired survives.

use crate::controller::convergence::{Convergence, ConvergenceEvent, Fingerprint, TransitionError};
use crate::controller::reconciler::outcome::{
    build_conditions, Failure, Outcome, RetryDirective, CONDITION_READY,
};
use crate::controller::retry::ErrorClass;
use crate::crd::{ConvergencePhase, DesiredResource, ResourceKey};
use tracing::debug;

#[derive(Debug)]
pub struct Attempt {
    key: ResourceKey,
    generation: i64,
    convergence: Convergence,
    fingerprint: Option<Fingerprint>,
    applied_fingerprint: Option<String>,
    platform_id: Option<String>,
    blocked_by: Vec<String>,
    waiting_on_dependents: bool,
    failure: Option<Failure>,
    /// Ready reason published by the previous attempt, if it was not Ready
    previous_reason: Option<String>,
    remote_mutations: u32,
    finalized: bool,
    retrigger_consumed: Option<String>,
}

impl Attempt {
    /// Start from the phase and identifiers recorded in the resource status
    #[must_use]
    pub fn new(resource: &DesiredResource) -> Self {
        Self {
            key: resource.key.clone(),
            generation: resource.generation,
            convergence: Convergence::new(resource.status.phase),
            fingerprint: None,
            applied_fingerprint: resource.status.applied_fingerprint.clone(),
            platform_id: resource.status.platform_id.clone(),
            blocked_by: Vec::new(),
            waiting_on_dependents: false,
            failure: None,
            previous_reason: resource
                .status
                .condition(CONDITION_READY)
                .filter(|c| !c.is_true())
                .and_then(|c| c.reason.clone()),
            remote_mutations: 0,
            finalized: false,
            retrigger_consumed: None,
        }
    }

    #[must_use]
    pub fn phase(&self) -> ConvergencePhase {
        self.convergence.phase()
    }

    pub fn event(&mut self, event: ConvergenceEvent) -> Result<ConvergencePhase, TransitionError> {
        let from = self.convergence.phase();
        let to = self.convergence.apply(event)?;
        if from != to {
            debug!(resource = %self.key, %from, %to, ?event, "Phase transition");
        }
        Ok(to)
    }

    /// Fatal or configuration failure: the resource parks in Failed
    pub fn fail(
        &mut self,
        class: ErrorClass,
        reason: &str,
        message: impl Into<String>,
    ) -> Result<(), TransitionError> {
        self.event(ConvergenceEvent::FatalFailure)?;
        self.record_failure(class, reason, message);
        Ok(())
    }

    /// Retryable failure: back to Pending, or stay in Deleting during teardown
    pub fn transient(
        &mut self,
        class: ErrorClass,
        reason: &str,
        message: impl Into<String>,
    ) -> Result<(), TransitionError> {
        if matches!(
            self.phase(),
            ConvergencePhase::Pending | ConvergencePhase::Applying
        ) {
            self.event(ConvergenceEvent::TransientFailure)?;
        }
        self.record_failure(class, reason, message);
        Ok(())
    }

    fn record_failure(&mut self, class: ErrorClass, reason: &str, message: impl Into<String>) {
        self.failure = Some(Failure {
            class,
            reason: reason.to_string(),
            message: message.into(),
        });
    }

    /// Prerequisites are not Ready
    pub fn block(&mut self, blocked_by: Vec<String>) -> Result<(), TransitionError> {
        self.event(ConvergenceEvent::Blocked)?;
        self.blocked_by = blocked_by;
        Ok(())
    }

    /// Dependents still reference the resource being torn down
    pub fn wait_for_dependents(&mut self, dependents: Vec<String>) {
        self.blocked_by = dependents;
        self.waiting_on_dependents = true;
    }

    /// The platform entity was re-read and matches
    pub fn confirm(&mut self) -> Result<(), TransitionError> {
        if self.phase() != ConvergencePhase::Converged {
            self.event(ConvergenceEvent::ConfirmedConverged)?;
        }
        self.applied_fingerprint = self.fingerprint.as_ref().map(|f| f.as_str().to_string());
        Ok(())
    }

    pub fn set_fingerprint(&mut self, fingerprint: Fingerprint) {
        self.fingerprint = Some(fingerprint);
    }

    #[must_use]
    pub fn fingerprint(&self) -> Option<&Fingerprint> {
        self.fingerprint.as_ref()
    }

    #[must_use]
    pub fn platform_id(&self) -> Option<&str> {
        self.platform_id.as_deref()
    }

    #[must_use]
    pub fn previous_reason(&self) -> Option<&str> {
        self.previous_reason.as_deref()
    }

    pub fn set_platform_id(&mut self, id: impl Into<String>) {
        self.platform_id = Some(id.into());
    }

    pub fn clear_platform_id(&mut self) {
        self.platform_id = None;
    }

    pub fn mutated(&mut self) {
        self.remote_mutations += 1;
    }

    /// The finalizer was released
    pub fn finalized(&mut self) {
        self.finalized = true;
    }

    pub fn consume_retrigger(&mut self, token: Option<String>) {
        self.retrigger_consumed = token;
    }

    #[must_use]
    pub fn finish(self, retry: RetryDirective) -> Outcome {
        let phase = self.convergence.phase();
        let conditions = build_conditions(
            phase,
            &self.blocked_by,
            self.waiting_on_dependents,
            self.failure.as_ref(),
        );
        let mut outcome = Outcome::new(self.key, self.generation, phase);
        outcome.conditions = conditions;
        outcome.applied_fingerprint = self.applied_fingerprint;
        outcome.platform_id = self.platform_id;
        outcome.blocked_by = self.blocked_by;
        outcome.retry = retry;
        outcome.error = self.failure.map(|f| f.class);
        outcome.transitions = self.convergence.transitions().to_vec();
        outcome.remote_mutations = self.remote_mutations;
        outcome.finalized = self.finalized;
        outcome.publish = !self.finalized;
        outcome.retrigger_consumed = self.retrigger_consumed;
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{ResourceKind, ResourceSpec, SystemSpec};

    fn resource(phase: ConvergencePhase) -> DesiredResource {
        let mut resource = DesiredResource::new(
            ResourceKey::new(ResourceKind::System, "deployment", "default"),
            ResourceSpec::System(SystemSpec::default()),
        );
        resource.status.phase = phase;
        resource
    }

    #[test]
    fn transient_failure_during_teardown_stays_deleting() {
        let mut attempt = Attempt::new(&resource(ConvergencePhase::Deleting));
        attempt
            .transient(ErrorClass::Transient, "PlatformUnavailable", "503")
            .unwrap();
        let outcome = attempt.finish(RetryDirective::Backoff);
        assert_eq!(outcome.phase, ConvergencePhase::Deleting);
        assert_eq!(outcome.error, Some(ErrorClass::Transient));
    }

    #[test]
    fn finish_records_transitions_in_order() {
        let mut attempt = Attempt::new(&resource(ConvergencePhase::Unknown));
        attempt.event(ConvergenceEvent::Observed).unwrap();
        attempt.event(ConvergenceEvent::BeganApply).unwrap();
        attempt.confirm().unwrap();
        let outcome = attempt.finish(RetryDirective::None);
        assert_eq!(
            outcome.transitions,
            vec![
                ConvergencePhase::Pending,
                ConvergencePhase::Applying,
                ConvergencePhase::Converged
            ]
        );
        assert!(outcome.publish);
    }
}
