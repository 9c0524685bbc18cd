//! # Reconciler
//!
//! Reconciliation engine for deployment resources.
//!
//! ## Reconciliation Flow
//!
//! 1. Read the resource; a missing object ends the attempt
//! 2. Deletion requested: tear down the platform entity once no dependent
//!    references it, then release the finalizer
//! 3. Otherwise ensure the finalizer and check prerequisites
//! 4. Eligible: the kind reconciler plans one step against the platform and
//!    the engine executes it under the attempt deadline
//! 5. Publish the outcome to status and decide the requeue

pub mod apply;
pub mod attempt;
pub mod dispatch;
pub mod kinds;
pub mod outcome;
pub mod teardown;
pub mod types;

pub use dispatch::reconcile_resource;
pub use outcome::{Outcome, RetryDirective};
pub use types::{Reconciler, ReconcilerError};

use crate::controller::retry::RetryDecision;
use crate::crd::ResourceKey;
use crate::observability::metrics;
use std::time::Instant;
use tracing::{info, warn, Instrument};

/// Reconcile `key` and publish the result
///
/// Errors are left to the controller's error policy.
///
/// # Errors
/// Store failures, or a status write that kept conflicting.
pub async fn reconcile(
    ctx: &Reconciler,
    key: &ResourceKey,
) -> Result<RetryDecision, ReconcilerError> {
    let span = tracing::info_span!(
        "reconcile",
        resource.kind = key.kind.as_str(),
        resource.namespace = key.namespace.as_str(),
        resource.name = key.name.as_str(),
    );
    reconcile_instrumented(ctx, key).instrument(span).await
}

async fn reconcile_instrumented(
    ctx: &Reconciler,
    key: &ResourceKey,
) -> Result<RetryDecision, ReconcilerError> {
    let start = Instant::now();
    let kind = key.kind.label();

    let outcome = reconcile_resource(ctx, key).await?;
    for phase in &outcome.transitions {
        metrics::increment_phase_transitions(kind, phase.as_str());
    }

    ctx.reporter.publish(&outcome).await?;

    if let Some(token) = &outcome.retrigger_consumed {
        if !outcome.finalized {
            if let Err(e) = ctx.store.clear_retrigger(key, token).await {
                warn!(error = %e, "Failed to clear re-trigger annotation");
            }
        }
    }

    if outcome.finalized {
        ctx.retry.forget(key);
    }
    let decision = ctx.retry.decide(&outcome);

    metrics::increment_requeues(outcome.retry.label());
    metrics::increment_reconciliations(kind, outcome.result_label());
    metrics::observe_reconciliation_duration(kind, start.elapsed().as_secs_f64());

    if outcome.publish {
        info!(
            phase = %outcome.phase,
            state = %outcome.deployment_state,
            remote_mutations = outcome.remote_mutations,
            requeue = ?decision,
            "Reconciled"
        );
    }
    Ok(decision)
}
