//! # Dispatch
//!
//! One reconcile attempt for one resource key: read, decide between
//! teardown and apply, check prerequisites, run the kind reconciler under the
//! attempt deadline, and hand back an [`Outcome`].

use crate::controller::convergence::ConvergenceEvent;
use crate::controller::dependency::resolver::eligible;
use crate::controller::dependency::{DependencyError, Eligibility, Snapshot};
use crate::controller::reconciler::attempt::Attempt;
use crate::controller::reconciler::outcome::{
    Outcome, RetryDirective, CONDITION_READY, REASON_DEPENDENCY_CYCLE, REASON_TEARDOWN_REJECTED,
};
use crate::controller::reconciler::types::{Reconciler, ReconcilerError};
use crate::controller::reconciler::{apply, teardown};
use crate::controller::retry::ErrorClass;
use crate::crd::{ConvergencePhase, DesiredResource, ResourceKey};
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Run one attempt for `key`
///
/// # Errors
/// Store failures and invalid phase transitions; both are retried by the
/// controller's error policy.
pub async fn reconcile_resource(
    ctx: &Reconciler,
    key: &ResourceKey,
) -> Result<Outcome, ReconcilerError> {
    let Some(resource) = ctx.store.get(key).await? else {
        debug!("Resource no longer exists");
        return Ok(Outcome::gone(key.clone()));
    };

    if resource.suspended && !resource.deletion_requested {
        debug!("Reconciliation suspended");
        return Ok(Outcome::skipped(
            key.clone(),
            resource.generation,
            resource.status.phase,
        ));
    }

    if resource.deletion_requested {
        return delete(ctx, resource).await;
    }

    if !resource.has_finalizer() {
        ctx.store.ensure_finalizer(&resource).await?;
        debug!("Finalizer added");
    }

    let mut attempt = Attempt::new(&resource);
    attempt.consume_retrigger(resource.retrigger.clone());
    match resource.status.phase {
        ConvergencePhase::Unknown => {
            attempt.event(ConvergenceEvent::Observed)?;
        }
        ConvergencePhase::Failed => {
            let current = resource.status.observed_generation == Some(resource.generation);
            if current && resource.retrigger.is_none() {
                debug!("Failed at this generation, waiting for a spec change or re-trigger");
                return Ok(Outcome::skipped(
                    key.clone(),
                    resource.generation,
                    ConvergencePhase::Failed,
                ));
            }
            info!(retriggered = resource.retrigger.is_some(), "Retrying failed resource");
            attempt.event(ConvergenceEvent::Retriggered)?;
        }
        // Deletion cannot be revoked; a recreated object starts with an empty status
        ConvergencePhase::Deleting | ConvergencePhase::Deleted => {
            warn!(phase = %resource.status.phase, "Teardown phase on a live object, ignoring");
            return Ok(Outcome::skipped(
                key.clone(),
                resource.generation,
                resource.status.phase,
            ));
        }
        ConvergencePhase::Pending | ConvergencePhase::Applying | ConvergencePhase::Converged => {}
    }

    let kinds = ctx.table.prerequisite_closure(key.kind);
    let snapshot = Snapshot::load(ctx.store.as_ref(), kinds, &key.namespace).await?;

    let directive = match eligible(ctx.table, &resource, &snapshot) {
        Err(DependencyError::Cycle(path)) => {
            let message = DependencyError::Cycle(path).to_string();
            warn!(%message, "Resource is part of a dependency cycle");
            attempt.fail(ErrorClass::Configuration, REASON_DEPENDENCY_CYCLE, message)?;
            RetryDirective::None
        }
        Err(e @ DependencyError::InvalidTable(_)) => {
            attempt.fail(ErrorClass::Configuration, "InvalidDependencyTable", e.to_string())?;
            RetryDirective::None
        }
        Ok(Eligibility::Blocked { blockers }) => {
            let delay = if blockers.iter().any(|b| b.is_missing()) {
                ctx.config.missing_dependency_requeue()
            } else {
                ctx.config.dependency_requeue()
            };
            debug!(blockers = blockers.len(), "Prerequisites not ready");
            attempt.block(blockers.iter().map(ToString::to_string).collect())?;
            RetryDirective::After(delay)
        }
        Ok(Eligibility::Eligible { dependencies }) => {
            let deadline = ctx.config.attempt_deadline();
            match timeout(
                deadline,
                apply::run(ctx, &resource, &dependencies, &mut attempt),
            )
            .await
            {
                Ok(directive) => directive?,
                Err(_) => {
                    warn!(?deadline, "Attempt deadline exceeded");
                    attempt.transient(
                        ErrorClass::Timeout,
                        "DeadlineExceeded",
                        format!("attempt exceeded {}s", deadline.as_secs()),
                    )?;
                    RetryDirective::Backoff
                }
            }
        }
    };

    Ok(attempt.finish(directive))
}

async fn delete(ctx: &Reconciler, resource: DesiredResource) -> Result<Outcome, ReconcilerError> {
    let key = resource.key.clone();
    let phase = resource.status.phase;
    if phase == ConvergencePhase::Deleted {
        return Ok(Outcome::skipped(key, resource.generation, phase));
    }
    let rejected = resource
        .status
        .condition(CONDITION_READY)
        .is_some_and(|c| c.reason.as_deref() == Some(REASON_TEARDOWN_REJECTED));
    if phase == ConvergencePhase::Failed && rejected && resource.retrigger.is_none() {
        debug!("Teardown rejected by the platform, waiting for a re-trigger");
        return Ok(Outcome::skipped(key, resource.generation, phase));
    }

    let mut attempt = Attempt::new(&resource);
    attempt.consume_retrigger(resource.retrigger.clone());
    attempt.event(ConvergenceEvent::DeletionRequested)?;

    let deadline = ctx.config.attempt_deadline();
    let directive = match timeout(deadline, teardown::run(ctx, &resource, &mut attempt)).await {
        Ok(directive) => directive?,
        Err(_) => {
            warn!(?deadline, "Teardown deadline exceeded");
            attempt.transient(
                ErrorClass::Timeout,
                "DeadlineExceeded",
                format!("teardown exceeded {}s", deadline.as_secs()),
            )?;
            RetryDirective::Backoff
        }
    };
    Ok(attempt.finish(directive))
}
