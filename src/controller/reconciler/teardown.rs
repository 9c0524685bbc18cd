//! # Teardown
//!
//! Deletion path. The platform entity is removed only after every dependent
//! is gone, and the finalizer is released only once a re-read confirms the
//! entity no longer exists.

use crate::controller::convergence::{ConvergenceEvent, TransitionError};
use crate::controller::dependency::resolver::{known_dependencies, teardown_blockers};
use crate::controller::dependency::Snapshot;
use crate::controller::reconciler::apply::client_request_id;
use crate::controller::reconciler::attempt::Attempt;
use crate::controller::reconciler::kinds::{self, PlanContext};
use crate::controller::reconciler::outcome::{RetryDirective, REASON_TEARDOWN_REJECTED};
use crate::controller::reconciler::types::{Reconciler, ReconcilerError};
use crate::controller::retry::ErrorClass;
use crate::crd::{DeletionPolicy, DesiredResource};
use crate::platform::{PlatformEntity, PlatformError};
use tracing::{debug, info, warn};

pub(crate) async fn run(
    ctx: &Reconciler,
    resource: &DesiredResource,
    attempt: &mut Attempt,
) -> Result<RetryDirective, ReconcilerError> {
    if !resource.has_finalizer() {
        attempt.event(ConvergenceEvent::TeardownConfirmed)?;
        attempt.finalized();
        return Ok(RetryDirective::None);
    }

    if resource.deletion_policy == DeletionPolicy::Orphan {
        info!("Orphaning platform entity");
        release(ctx, resource, attempt).await?;
        return Ok(RetryDirective::None);
    }

    let kind = resource.key.kind;
    let mut kinds = ctx.table.prerequisite_closure(kind);
    kinds.extend(ctx.table.dependent_closure(kind));
    let snapshot = Snapshot::load(ctx.store.as_ref(), kinds, &resource.key.namespace).await?;

    let dependents = teardown_blockers(ctx.table, resource, &snapshot);
    if !dependents.is_empty() {
        debug!(dependents = dependents.len(), "Waiting for dependents to be removed");
        attempt.wait_for_dependents(dependents.iter().map(ToString::to_string).collect());
        return Ok(RetryDirective::After(ctx.config.dependency_requeue()));
    }

    if !kinds::for_kind(kind).allows_create() {
        info!("Platform-provisioned record, leaving it in place");
        release(ctx, resource, attempt).await?;
        return Ok(RetryDirective::None);
    }

    let entity = match locate(ctx, resource, &snapshot).await {
        Ok(entity) => entity,
        Err(e) => return Ok(teardown_failure(attempt, &e)?),
    };
    let Some(entity) = entity else {
        info!("No platform entity left");
        release(ctx, resource, attempt).await?;
        return Ok(RetryDirective::None);
    };
    attempt.set_platform_id(entity.id.clone());

    if let Some(task) = &entity.task {
        debug!(task = task.as_str(), "Platform busy with the entity");
        return Ok(RetryDirective::After(ctx.config.poll_interval()));
    }

    let request_id = client_request_id(&[&resource.key.to_string(), &entity.id, "delete"]);
    info!(
        platform_id = entity.id.as_str(),
        request_id = request_id.as_str(),
        "Deleting platform entity"
    );
    match ctx.platform.delete(kind, &entity.id, &request_id).await {
        Ok(()) | Err(PlatformError::NotFound(_)) => attempt.mutated(),
        Err(e) => {
            attempt.mutated();
            return Ok(teardown_failure(attempt, &e)?);
        }
    }

    match ctx.platform.get(kind, &entity.id).await {
        Err(PlatformError::NotFound(_)) => {
            release(ctx, resource, attempt).await?;
            Ok(RetryDirective::None)
        }
        Ok(_) => {
            debug!("Platform entity still present after delete");
            Ok(RetryDirective::After(ctx.config.poll_interval()))
        }
        Err(e) => Ok(teardown_failure(attempt, &e)?),
    }
}

/// Find the entity by its recorded id, falling back to the natural key
async fn locate(
    ctx: &Reconciler,
    resource: &DesiredResource,
    snapshot: &Snapshot,
) -> Result<Option<PlatformEntity>, PlatformError> {
    let kind = resource.key.kind;
    if let Some(id) = &resource.status.platform_id {
        return match ctx.platform.get(kind, id).await {
            Ok(entity) => Ok(Some(entity)),
            Err(PlatformError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        };
    }
    let dependencies = known_dependencies(ctx.table, resource, snapshot);
    let plan_ctx = PlanContext::new(resource, &dependencies);
    match kinds::for_kind(kind).lookup_key(&plan_ctx) {
        Ok(lookup) => ctx.platform.find(kind, &lookup).await,
        Err(e) => {
            // An owner that never reached the platform cannot own this entity either
            debug!(error = %e, "Entity cannot be located, treating it as never created");
            Ok(None)
        }
    }
}

async fn release(
    ctx: &Reconciler,
    resource: &DesiredResource,
    attempt: &mut Attempt,
) -> Result<(), ReconcilerError> {
    ctx.store.remove_finalizer(resource).await?;
    attempt.clear_platform_id();
    attempt.event(ConvergenceEvent::TeardownConfirmed)?;
    attempt.finalized();
    info!("Finalizer released");
    Ok(())
}

fn teardown_failure(
    attempt: &mut Attempt,
    err: &PlatformError,
) -> Result<RetryDirective, TransitionError> {
    match err.class() {
        ErrorClass::Fatal | ErrorClass::Configuration => {
            warn!(error = %err, "Platform rejected the delete");
            attempt.fail(err.class(), REASON_TEARDOWN_REJECTED, err.to_string())?;
            Ok(RetryDirective::None)
        }
        class => {
            warn!(error = %err, "Delete failed, keeping the finalizer");
            attempt.transient(class, "TeardownFailed", err.to_string())?;
            Ok(RetryDirective::Backoff)
        }
    }
}
