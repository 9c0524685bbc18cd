//! # Status Reporter
//!
//! Publishes the outcome of an attempt onto the resource status.
//!
//! Every write starts from a fresh read and carries that read's
//! resourceVersion. A write is skipped when nothing but timestamps would
//! change, which keeps status writes from feeding back into the watch as
//! spurious events. Conditions of types the controller does not own are
//! carried over untouched.

use crate::controller::reconciler::outcome::{Outcome, OWNED_CONDITIONS};
use crate::controller::reconciler::ReconcilerError;
use crate::crd::{Condition, ConvergencePhase, ResourceStatus};
use crate::observability::metrics;
use crate::store::{ResourceStore, StoreError};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishResult {
    Written,
    /// Only timestamps would have changed
    Unchanged,
    /// The stored status already reflects a newer generation
    Stale,
    /// Nothing to publish, or the object is gone
    Skipped,
}

#[derive(Clone)]
pub struct StatusReporter {
    store: Arc<dyn ResourceStore>,
    max_conflict_retries: u32,
}

impl std::fmt::Debug for StatusReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusReporter")
            .field("max_conflict_retries", &self.max_conflict_retries)
            .finish_non_exhaustive()
    }
}

impl StatusReporter {
    #[must_use]
    pub fn new(store: Arc<dyn ResourceStore>, max_conflict_retries: u32) -> Self {
        Self {
            store,
            max_conflict_retries,
        }
    }

    /// Write the outcome, re-reading and retrying on write conflicts
    ///
    /// # Errors
    /// Store errors other than a conflict, or [`ReconcilerError::StatusConflict`]
    /// once every retry lost the race.
    pub async fn publish(&self, outcome: &Outcome) -> Result<PublishResult, ReconcilerError> {
        if outcome.finalized || !outcome.publish {
            return Ok(PublishResult::Skipped);
        }

        let mut attempts = 0;
        loop {
            attempts += 1;
            let Some(current) = self.store.get(&outcome.key).await? else {
                debug!(resource = %outcome.key, "Resource gone before status write");
                return Ok(PublishResult::Skipped);
            };

            if current
                .status
                .observed_generation
                .is_some_and(|observed| observed > outcome.generation)
            {
                debug!(
                    resource = %outcome.key,
                    observed = ?current.status.observed_generation,
                    generation = outcome.generation,
                    "Status already reflects a newer generation"
                );
                metrics::increment_status_writes("stale");
                return Ok(PublishResult::Stale);
            }

            let now = chrono::Utc::now().to_rfc3339();
            let status = next_status(&current.status, outcome, &now);
            if same_ignoring_timestamps(&current.status, &status) {
                metrics::increment_status_writes("unchanged");
                return Ok(PublishResult::Unchanged);
            }

            let resource_version = current.resource_version.clone().unwrap_or_default();
            match self
                .store
                .replace_status(&outcome.key, &resource_version, &status)
                .await
            {
                Ok(()) => {
                    debug!(
                        resource = %outcome.key,
                        phase = %status.phase,
                        state = %status.deployment_state,
                        "Status updated"
                    );
                    metrics::increment_status_writes("written");
                    return Ok(PublishResult::Written);
                }
                Err(StoreError::Conflict(_)) if attempts <= self.max_conflict_retries => {
                    debug!(resource = %outcome.key, attempts, "Status write conflicted, re-reading");
                    metrics::increment_status_writes("conflict");
                }
                Err(StoreError::Conflict(_)) => {
                    warn!(resource = %outcome.key, attempts, "Giving up on status write");
                    metrics::increment_status_writes("conflict");
                    return Err(ReconcilerError::StatusConflict {
                        key: outcome.key.clone(),
                        attempts,
                    });
                }
                Err(StoreError::NotFound(_)) => return Ok(PublishResult::Skipped),
                Err(e) => {
                    metrics::increment_status_writes("error");
                    return Err(e.into());
                }
            }
        }
    }
}

fn next_status(current: &ResourceStatus, outcome: &Outcome, now: &str) -> ResourceStatus {
    let consecutive_failures = if outcome.error.is_some() {
        current.consecutive_failures.saturating_add(1)
    } else if outcome.phase == ConvergencePhase::Converged {
        0
    } else {
        current.consecutive_failures
    };
    ResourceStatus {
        conditions: merge_conditions(&current.conditions, &outcome.conditions, now),
        observed_generation: Some(outcome.generation),
        deployment_state: outcome.deployment_state,
        phase: outcome.phase,
        applied_fingerprint: outcome.applied_fingerprint.clone(),
        platform_id: outcome.platform_id.clone(),
        blocked_by: outcome.blocked_by.clone(),
        consecutive_failures,
        last_reconcile_time: Some(now.to_string()),
    }
}

/// Owned conditions are replaced; transition times only move when the status flips
fn merge_conditions(current: &[Condition], owned: &[Condition], now: &str) -> Vec<Condition> {
    let mut merged: Vec<Condition> = current
        .iter()
        .filter(|c| !OWNED_CONDITIONS.contains(&c.r#type.as_str()))
        .cloned()
        .collect();
    for condition in owned {
        let previous = current.iter().find(|c| c.r#type == condition.r#type);
        let last_transition_time = match previous {
            Some(previous) if previous.status == condition.status => previous
                .last_transition_time
                .clone()
                .or_else(|| Some(now.to_string())),
            _ => Some(now.to_string()),
        };
        merged.push(Condition {
            last_transition_time,
            ..condition.clone()
        });
    }
    merged.sort_by(|a, b| a.r#type.cmp(&b.r#type));
    merged
}

fn same_ignoring_timestamps(a: &ResourceStatus, b: &ResourceStatus) -> bool {
    fn strip(status: &ResourceStatus) -> ResourceStatus {
        let mut status = status.clone();
        status.last_reconcile_time = None;
        for condition in &mut status.conditions {
            condition.last_transition_time = None;
        }
        status.conditions.sort_by(|a, b| a.r#type.cmp(&b.r#type));
        status
    }
    strip(a) == strip(b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::reconciler::outcome::{build_conditions, CONDITION_READY};
    use crate::crd::{DeploymentState, ResourceKey, ResourceKind};

    fn outcome(phase: ConvergencePhase) -> Outcome {
        let mut outcome = Outcome::new(
            ResourceKey::new(ResourceKind::DataNetwork, "deployment", "physnet0"),
            2,
            phase,
        );
        outcome.conditions = build_conditions(phase, &[], false, None);
        outcome
    }

    #[test]
    fn foreign_conditions_survive() {
        let foreign = Condition::new("Audited", true, "Reviewed", "ok");
        let current = ResourceStatus {
            conditions: vec![foreign.clone()],
            ..ResourceStatus::default()
        };
        let status = next_status(&current, &outcome(ConvergencePhase::Converged), "t1");
        assert!(status.conditions.iter().any(|c| c.r#type == "Audited"));
        assert_eq!(status.deployment_state, DeploymentState::Ready);
        assert_eq!(status.observed_generation, Some(2));
    }

    #[test]
    fn transition_time_moves_only_on_flip() {
        let first = next_status(
            &ResourceStatus::default(),
            &outcome(ConvergencePhase::Converged),
            "t1",
        );
        let second = next_status(&first, &outcome(ConvergencePhase::Converged), "t2");
        let ready = second.condition(CONDITION_READY).unwrap();
        assert_eq!(ready.last_transition_time.as_deref(), Some("t1"));
        assert!(same_ignoring_timestamps(&first, &second));

        let third = next_status(&second, &outcome(ConvergencePhase::Pending), "t3");
        let ready = third.condition(CONDITION_READY).unwrap();
        assert_eq!(ready.last_transition_time.as_deref(), Some("t3"));
    }

    #[test]
    fn failures_are_counted_until_success() {
        let mut failed = outcome(ConvergencePhase::Pending);
        failed.error = Some(crate::controller::retry::ErrorClass::Transient);
        let once = next_status(&ResourceStatus::default(), &failed, "t1");
        let twice = next_status(&once, &failed, "t2");
        assert_eq!(twice.consecutive_failures, 2);
        let healed = next_status(&twice, &outcome(ConvergencePhase::Converged), "t3");
        assert_eq!(healed.consecutive_failures, 0);
    }
}
