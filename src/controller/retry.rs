//! # Retry Controller
//!
//! Turns the retry directive of an [`Outcome`] into a requeue decision.
//!
//! - Transient, conflict and timeout failures back off exponentially with jitter
//! - Fatal and configuration failures wait for a spec change or a re-trigger
//! - Dependency waits use a fixed delay and leave the attempt counter alone
//! - Not-found during an update requeues immediately onto the re-create path
//!
//! The per-key attempt counter resets after every attempt that made progress
//! without an error, and whenever the generation changes.

use crate::config::ControllerConfig;
use crate::controller::backoff::ExponentialBackoff;
use crate::controller::reconciler::outcome::{Outcome, RetryDirective};
use crate::crd::{ConvergencePhase, ResourceKey};
use kube_runtime::controller::Action;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Failure taxonomy shared by the platform client and the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// The desired state cannot be applied as written
    Configuration,
    NotFound,
    Conflict,
    Transient,
    Fatal,
    Timeout,
}

impl ErrorClass {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorClass::Configuration => "ConfigurationError",
            ErrorClass::NotFound => "NotFound",
            ErrorClass::Conflict => "Conflict",
            ErrorClass::Transient => "Transient",
            ErrorClass::Fatal => "Fatal",
            ErrorClass::Timeout => "Timeout",
        }
    }

    /// Whether the engine retries on its own
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ErrorClass::Configuration | ErrorClass::Fatal)
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Requeue(Duration),
    /// Only a watch event or the periodic resync brings the key back
    AwaitChange,
}

impl From<RetryDecision> for Action {
    fn from(decision: RetryDecision) -> Self {
        match decision {
            RetryDecision::Requeue(delay) => Action::requeue(delay),
            RetryDecision::AwaitChange => Action::await_change(),
        }
    }
}

#[derive(Debug)]
struct BackoffState {
    backoff: ExponentialBackoff,
    /// Generation the counter belongs to; unknown when created by the error policy
    generation: Option<i64>,
}

/// Per-key backoff bookkeeping
///
/// Cloning shares the counters.
#[derive(Debug, Clone)]
pub struct RetryController {
    base: Duration,
    max: Duration,
    immediate: Duration,
    states: Arc<Mutex<HashMap<ResourceKey, BackoffState>>>,
}

impl RetryController {
    #[must_use]
    pub fn new(config: &ControllerConfig) -> Self {
        Self {
            base: config.backoff_base(),
            max: config.backoff_max(),
            immediate: config.immediate_requeue(),
            states: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn states(&self) -> MutexGuard<'_, HashMap<ResourceKey, BackoffState>> {
        self.states.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Decide when `outcome.key` runs again
    pub fn decide(&self, outcome: &Outcome) -> RetryDecision {
        let mut states = self.states();

        if states
            .get(&outcome.key)
            .and_then(|s| s.generation)
            .is_some_and(|g| g != outcome.generation)
        {
            states.remove(&outcome.key);
        }

        if outcome.finalized || progressed(outcome) {
            states.remove(&outcome.key);
        }

        match outcome.retry {
            RetryDirective::None => RetryDecision::AwaitChange,
            RetryDirective::Immediate => RetryDecision::Requeue(self.immediate),
            RetryDirective::After(delay) => RetryDecision::Requeue(delay),
            RetryDirective::Backoff => {
                let state = states
                    .entry(outcome.key.clone())
                    .or_insert_with(|| BackoffState {
                        backoff: ExponentialBackoff::new(self.base, self.max),
                        generation: Some(outcome.generation),
                    });
                state.generation = Some(outcome.generation);
                RetryDecision::Requeue(state.backoff.next_backoff())
            }
        }
    }

    /// Backoff for an attempt that failed before producing an outcome
    pub fn on_error(&self, key: &ResourceKey) -> Duration {
        self.states()
            .entry(key.clone())
            .or_insert_with(|| BackoffState {
                backoff: ExponentialBackoff::new(self.base, self.max),
                generation: None,
            })
            .backoff
            .next_backoff()
    }

    /// Backoff delays handed out to `key` since its last reset
    #[must_use]
    pub fn attempts(&self, key: &ResourceKey) -> u32 {
        self.states()
            .get(key)
            .map_or(0, |s| s.backoff.attempt())
    }

    /// Drop the counter of a resource that no longer exists
    pub fn forget(&self, key: &ResourceKey) {
        self.states().remove(key);
    }
}

/// The attempt ran without an error and was not held back by a prerequisite
fn progressed(outcome: &Outcome) -> bool {
    outcome.phase == ConvergencePhase::Converged
        || (outcome.publish && outcome.error.is_none() && outcome.blocked_by.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::ResourceKind;

    fn key() -> ResourceKey {
        ResourceKey::new(ResourceKind::Host, "deployment", "controller-0")
    }

    fn outcome(generation: i64, phase: ConvergencePhase, retry: RetryDirective) -> Outcome {
        let mut outcome = Outcome::new(key(), generation, phase);
        outcome.retry = retry;
        if retry == RetryDirective::Backoff {
            outcome.error = Some(ErrorClass::Transient);
        }
        outcome
    }

    fn controller() -> RetryController {
        RetryController::new(&ControllerConfig::default())
    }

    #[test]
    fn backoff_grows_per_key() {
        let retry = controller();
        let pending = outcome(1, ConvergencePhase::Pending, RetryDirective::Backoff);
        retry.decide(&pending);
        retry.decide(&pending);
        assert_eq!(retry.attempts(&key()), 2);
    }

    #[test]
    fn convergence_resets_the_counter() {
        let retry = controller();
        retry.decide(&outcome(1, ConvergencePhase::Pending, RetryDirective::Backoff));
        let decision = retry.decide(&outcome(1, ConvergencePhase::Converged, RetryDirective::None));
        assert_eq!(decision, RetryDecision::AwaitChange);
        assert_eq!(retry.attempts(&key()), 0);
    }

    #[test]
    fn dependency_wait_leaves_counter_untouched() {
        let retry = controller();
        retry.decide(&outcome(1, ConvergencePhase::Pending, RetryDirective::Backoff));
        let delay = Duration::from_secs(15);
        let mut blocked = outcome(1, ConvergencePhase::Pending, RetryDirective::After(delay));
        blocked.blocked_by = vec!["System (none declared)".to_string()];
        let decision = retry.decide(&blocked);
        assert_eq!(decision, RetryDecision::Requeue(delay));
        assert_eq!(retry.attempts(&key()), 1);
    }

    #[test]
    fn successful_step_restarts_the_backoff() {
        let retry = controller();
        let failed = outcome(1, ConvergencePhase::Pending, RetryDirective::Backoff);
        retry.decide(&failed);
        retry.decide(&failed);
        assert_eq!(retry.attempts(&key()), 2);

        retry.decide(&outcome(1, ConvergencePhase::Applying, RetryDirective::Immediate));
        assert_eq!(retry.attempts(&key()), 0);

        let RetryDecision::Requeue(delay) = retry.decide(&failed) else {
            panic!("a transient failure is requeued");
        };
        assert!(delay <= ControllerConfig::default().backoff_base());
        assert_eq!(retry.attempts(&key()), 1);
    }

    #[test]
    fn held_resource_keeps_its_counter() {
        let retry = controller();
        retry.decide(&outcome(1, ConvergencePhase::Pending, RetryDirective::Backoff));
        let held = Outcome::skipped(key(), 1, ConvergencePhase::Pending);
        retry.decide(&held);
        assert_eq!(retry.attempts(&key()), 1);
    }

    #[test]
    fn error_policy_shares_the_counter() {
        let retry = controller();
        retry.on_error(&key());
        retry.decide(&outcome(4, ConvergencePhase::Pending, RetryDirective::Backoff));
        assert_eq!(retry.attempts(&key()), 2);
    }

    #[test]
    fn fatal_classes_are_not_retryable() {
        assert!(!ErrorClass::Fatal.is_retryable());
        assert!(!ErrorClass::Configuration.is_retryable());
        assert!(ErrorClass::Timeout.is_retryable());
        assert!(ErrorClass::Conflict.is_retryable());
    }
}
