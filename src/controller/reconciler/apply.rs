//! # Apply
//!
//! Create/update path for an eligible resource. One attempt issues at most
//! one mutating platform call and then re-reads the entity, so an attempt
//! interrupted at any point is resumed by simply running it again.

use crate::controller::convergence::{ConvergenceEvent, Fingerprint, TransitionError};
use crate::controller::dependency::ReadyDependency;
use crate::controller::reconciler::attempt::Attempt;
use crate::controller::reconciler::kinds::{self, PlanContext, PlanError, Step};
use crate::controller::reconciler::outcome::{RetryDirective, REASON_ENTITY_NOT_FOUND};
use crate::controller::reconciler::types::Reconciler;
use crate::controller::retry::ErrorClass;
use crate::crd::{ConvergencePhase, DesiredResource, ResourceKind};
use crate::platform::{
    CreateRequest, LookupKey, PlatformEntity, PlatformError, StrategyBatch, StrategyResult,
    StrategyState, UpdateRequest,
};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Request id shared by every retry of the same logical call
#[must_use]
pub fn client_request_id(parts: &[&str]) -> String {
    let digest = Sha256::digest(parts.join("|").as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    Uuid::from_bytes(bytes).to_string()
}

enum Executed {
    Entity(PlatformEntity),
    Strategy(StrategyResult),
}

/// What a failed platform call was addressed to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Target {
    /// An entity id recorded in status or returned by the platform
    Recorded,
    /// A natural-key search of the collection
    Search,
}

pub(crate) async fn run(
    ctx: &Reconciler,
    resource: &DesiredResource,
    dependencies: &[ReadyDependency],
    attempt: &mut Attempt,
) -> Result<RetryDirective, TransitionError> {
    let kind = resource.key.kind;
    let reconciler = kinds::for_kind(kind);

    if let Err(e) = reconciler.validate(&resource.spec) {
        return plan_failure(attempt, &e);
    }

    let fingerprint = Fingerprint::compute(&resource.spec, dependencies);
    if attempt.phase() == ConvergencePhase::Converged {
        let unchanged = resource.status.applied_fingerprint.as_deref() == Some(fingerprint.as_str())
            && resource.status.observed_generation == Some(resource.generation);
        if unchanged {
            debug!(fingerprint = %fingerprint, "Spec and dependencies unchanged since last apply");
            attempt.set_fingerprint(fingerprint);
            return Ok(RetryDirective::None);
        }
        info!(fingerprint = %fingerprint, "Drift detected, re-applying");
        attempt.event(ConvergenceEvent::DriftDetected)?;
    }
    attempt.set_fingerprint(fingerprint.clone());

    let plan_ctx = PlanContext::new(resource, dependencies);
    debug!(references = ?reconciler.references(&resource.spec), "Planning");
    let lookup = match reconciler.lookup_key(&plan_ctx) {
        Ok(lookup) => lookup,
        Err(e) => return plan_failure(attempt, &e),
    };
    let recorded = attempt.platform_id().map(str::to_string);
    let entity = match locate(ctx, kind, recorded.as_deref(), &lookup).await {
        Ok(entity) => entity,
        Err(e) => return platform_failure(attempt, &e, Target::Search),
    };
    match &entity {
        Some(entity) => {
            if let Some(e) = lookup_drift(&lookup, entity) {
                return plan_failure(attempt, &e);
            }
            attempt.set_platform_id(entity.id.clone());
        }
        None => attempt.clear_platform_id(),
    }

    let step = match reconciler.plan(&plan_ctx, entity.as_ref()) {
        Ok(step) => step,
        Err(e) => return plan_failure(attempt, &e),
    };
    if step != Step::Converged {
        attempt.event(ConvergenceEvent::BeganApply)?;
    }

    let label = step.label();
    let request_id = client_request_id(&[
        &resource.key.to_string(),
        fingerprint.as_str(),
        &label,
    ]);
    // A create addresses the collection, every other step an existing entity
    let target = if matches!(step, Step::Create(_)) {
        Target::Search
    } else {
        Target::Recorded
    };
    let executed = match step {
        Step::Converged => {
            attempt.confirm()?;
            return Ok(RetryDirective::None);
        }
        Step::Wait(task) => {
            debug!(task = task.as_str(), "Platform busy with the entity");
            return Ok(RetryDirective::After(ctx.config.poll_interval()));
        }
        Step::Create(attributes) => {
            info!(step = label.as_str(), request_id = request_id.as_str(), "Creating platform entity");
            ctx.platform
                .create(
                    kind,
                    CreateRequest {
                        attributes,
                        client_request_id: request_id,
                    },
                )
                .await
                .map(Executed::Entity)
        }
        Step::Update { id, changes } => {
            info!(step = label.as_str(), request_id = request_id.as_str(), "Updating platform entity");
            ctx.platform
                .update(
                    kind,
                    &id,
                    UpdateRequest {
                        changes,
                        client_request_id: request_id,
                    },
                )
                .await
                .map(Executed::Entity)
        }
        Step::Strategy { action, target } => {
            info!(step = label.as_str(), request_id = request_id.as_str(), "Applying strategy");
            ctx.platform
                .apply_strategy(StrategyBatch {
                    kind,
                    action,
                    targets: vec![target],
                    client_request_id: request_id,
                })
                .await
                .map(Executed::Strategy)
        }
    };
    attempt.mutated();

    let entity_id = match executed {
        Ok(Executed::Entity(entity)) => entity.id,
        Ok(Executed::Strategy(result)) => match result.state {
            StrategyState::Applied => match &entity {
                Some(entity) => entity.id.clone(),
                None => return Ok(RetryDirective::Immediate),
            },
            StrategyState::Applying => {
                debug!(strategy = result.id.as_str(), "Strategy still applying");
                return Ok(RetryDirective::After(ctx.config.poll_interval()));
            }
            StrategyState::Failed => {
                warn!(strategy = result.id.as_str(), items = ?result.items, "Strategy failed");
                attempt.transient(
                    ErrorClass::Transient,
                    "StrategyFailed",
                    format!("strategy {} failed", result.id),
                )?;
                return Ok(RetryDirective::Backoff);
            }
        },
        Err(e) => return platform_failure(attempt, &e, target),
    };
    attempt.set_platform_id(entity_id.clone());

    // Re-read; only the platform's own view decides convergence
    let entity = match ctx.platform.get(kind, &entity_id).await {
        Ok(entity) => entity,
        Err(e) => return platform_failure(attempt, &e, Target::Recorded),
    };
    match reconciler.plan(&plan_ctx, Some(&entity)) {
        Ok(Step::Converged) => {
            attempt.confirm()?;
            Ok(RetryDirective::None)
        }
        Ok(Step::Wait(_)) => Ok(RetryDirective::After(ctx.config.poll_interval())),
        Ok(next) => {
            debug!(next = next.label().as_str(), "More steps pending");
            Ok(RetryDirective::Immediate)
        }
        Err(e) => plan_failure(attempt, &e),
    }
}

/// Read the recorded entity, or search by natural key when none is recorded
/// or the recorded one is gone
async fn locate(
    ctx: &Reconciler,
    kind: ResourceKind,
    recorded: Option<&str>,
    lookup: &LookupKey,
) -> Result<Option<PlatformEntity>, PlatformError> {
    if let Some(id) = recorded {
        match ctx.platform.get(kind, id).await {
            Ok(entity) => return Ok(Some(entity)),
            Err(PlatformError::NotFound(_)) => {
                info!(platform_id = id, "Recorded entity is gone, searching by natural key");
            }
            Err(e) => return Err(e),
        }
    }
    ctx.platform.find(kind, lookup).await
}

/// A natural-key field edited after the entity was created
fn lookup_drift(lookup: &LookupKey, entity: &PlatformEntity) -> Option<PlanError> {
    lookup.fields.iter().find_map(|(field, desired)| {
        let current = entity.attribute(field)?;
        (current != desired).then(|| PlanError::Immutable {
            field: field.clone(),
            current: current.to_string(),
            desired: desired.to_string(),
        })
    })
}

fn plan_failure(attempt: &mut Attempt, err: &PlanError) -> Result<RetryDirective, TransitionError> {
    match err.class() {
        ErrorClass::Configuration => {
            warn!(error = %err, "Spec cannot be applied");
            attempt.fail(ErrorClass::Configuration, err.reason(), err.to_string())?;
            Ok(RetryDirective::None)
        }
        class => {
            attempt.transient(class, err.reason(), err.to_string())?;
            Ok(RetryDirective::Backoff)
        }
    }
}

/// Map a platform failure onto the attempt
///
/// A known entity that vanished takes the create path right away, once. When
/// it is missing again on the next attempt, or the collection itself is not
/// found, the failure backs off like any other transient one.
pub(crate) fn platform_failure(
    attempt: &mut Attempt,
    err: &PlatformError,
    target: Target,
) -> Result<RetryDirective, TransitionError> {
    let class = err.class();
    match class {
        ErrorClass::NotFound if target == Target::Recorded => {
            attempt.clear_platform_id();
            let repeated = attempt.previous_reason() == Some(REASON_ENTITY_NOT_FOUND);
            attempt.transient(class, REASON_ENTITY_NOT_FOUND, err.to_string())?;
            if repeated {
                warn!(error = %err, "Entity missing again, backing off");
                Ok(RetryDirective::Backoff)
            } else {
                debug!(error = %err, "Entity vanished, re-creating");
                Ok(RetryDirective::Immediate)
            }
        }
        ErrorClass::NotFound
        | ErrorClass::Transient
        | ErrorClass::Conflict
        | ErrorClass::Timeout => {
            let reason = match class {
                ErrorClass::NotFound => "CollectionNotFound",
                ErrorClass::Conflict => "PlatformConflict",
                ErrorClass::Timeout => "PlatformTimeout",
                _ => "PlatformUnavailable",
            };
            warn!(error = %err, "Platform call failed, will retry");
            attempt.transient(class, reason, err.to_string())?;
            Ok(RetryDirective::Backoff)
        }
        ErrorClass::Fatal | ErrorClass::Configuration => {
            warn!(error = %err, "Platform rejected the request");
            attempt.fail(class, "PlatformRejected", err.to_string())?;
            Ok(RetryDirective::None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_id_is_stable_per_step() {
        let a = client_request_id(&["Host/deployment/controller-0", "abc", "create"]);
        let b = client_request_id(&["Host/deployment/controller-0", "abc", "create"]);
        let c = client_request_id(&["Host/deployment/controller-0", "abc", "update:location"]);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(Uuid::parse_str(&a).is_ok());
    }
}
