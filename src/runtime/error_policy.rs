//! # Error Policy
//!
//! Handling of reconcile failures and controller stream errors.

use crate::controller::reconciler::{Reconciler, ReconcilerError};
use crate::crd::{DeploymentResource, ResourceKind};
use crate::observability::metrics;
use kube_runtime::controller::{self, Action};
use kube_runtime::watcher;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Requeue a key whose attempt failed before producing an outcome
///
/// Uses the same per-key backoff counter as classified retries, so a key
/// that keeps failing backs off no matter where it fails.
pub fn handle_reconciliation_error<K: DeploymentResource>(
    obj: Arc<K>,
    error: &ReconcilerError,
    ctx: Arc<Reconciler>,
) -> Action {
    let key = obj.resource_key();
    let error_span = tracing::error_span!(
        "controller.reconciliation_error",
        resource.kind = key.kind.as_str(),
        resource.namespace = key.namespace.as_str(),
        resource.name = key.name.as_str(),
    );
    let _guard = error_span.enter();

    error!(error = %error, "Reconciliation error");
    metrics::increment_reconciliation_errors(key.kind.label());

    let delay = ctx.retry.on_error(&key);
    info!(
        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
        attempts = ctx.retry.attempts(&key),
        "Retrying with backoff"
    );
    metrics::increment_requeues("error");
    Action::requeue(delay)
}

/// Log an item of the controller stream that did not come back as success
pub fn handle_controller_error(
    kind: ResourceKind,
    error: &controller::Error<ReconcilerError, watcher::Error>,
) {
    match error {
        // Already routed through the error policy
        controller::Error::ReconcilerFailed(err, obj) => {
            debug!(kind = kind.as_str(), object = %obj, error = %err, "Reconcile failed");
        }
        controller::Error::ObjectNotFound(obj) => {
            debug!(kind = kind.as_str(), object = %obj, "Object gone before it was reconciled");
        }
        controller::Error::QueueError(err) => {
            warn!(kind = kind.as_str(), error = %err, "Watch error, the watcher retries with backoff");
        }
        other => {
            error!(kind = kind.as_str(), error = %other, "Controller stream error");
        }
    }
}
