//! # Metrics
//!
//! Prometheus metrics for monitoring the controller.
//!
//! ## Metrics Exposed
//!
//! - `deployment_manager_reconciliations_total` - Reconciliations by kind and result
//! - `deployment_manager_reconciliation_errors_total` - Reconciliation errors by kind
//! - `deployment_manager_reconciliation_duration_seconds` - Duration of reconciliations by kind
//! - `deployment_manager_platform_requests_total` - Platform API requests by kind, operation and result
//! - `deployment_manager_platform_request_duration_seconds` - Duration of platform API requests
//! - `deployment_manager_requeues_total` - Requeues by reason
//! - `deployment_manager_status_writes_total` - Status writes by result
//! - `deployment_manager_phase_transitions_total` - Convergence phases entered by kind
//! - `deployment_manager_resources` - Resources by kind and deployment state

use anyhow::Result;
use prometheus::{HistogramVec, IntCounterVec, IntGaugeVec, Registry};
use std::sync::LazyLock;

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILIATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "deployment_manager_reconciliations_total",
            "Total number of reconciliations by kind and result",
        ),
        &["kind", "result"],
    )
    .expect("Failed to create RECONCILIATIONS_TOTAL metric - this should never happen")
});

static RECONCILIATION_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "deployment_manager_reconciliation_errors_total",
            "Total number of reconciliation errors by kind",
        ),
        &["kind"],
    )
    .expect("Failed to create RECONCILIATION_ERRORS_TOTAL metric - this should never happen")
});

static RECONCILIATION_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        prometheus::HistogramOpts::new(
            "deployment_manager_reconciliation_duration_seconds",
            "Duration of reconciliation in seconds",
        )
        .buckets(vec![0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 120.0]),
        &["kind"],
    )
    .expect("Failed to create RECONCILIATION_DURATION metric - this should never happen")
});

static PLATFORM_REQUESTS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "deployment_manager_platform_requests_total",
            "Total number of platform API requests by kind, operation and result",
        ),
        &["kind", "operation", "result"],
    )
    .expect("Failed to create PLATFORM_REQUESTS_TOTAL metric - this should never happen")
});

static PLATFORM_REQUEST_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        prometheus::HistogramOpts::new(
            "deployment_manager_platform_request_duration_seconds",
            "Duration of platform API requests in seconds",
        )
        .buckets(vec![0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]),
        &["kind", "operation"],
    )
    .expect("Failed to create PLATFORM_REQUEST_DURATION metric - this should never happen")
});

static REQUEUES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "deployment_manager_requeues_total",
            "Total number of requeues by reason",
        ),
        &["reason"],
    )
    .expect("Failed to create REQUEUES_TOTAL metric - this should never happen")
});

static STATUS_WRITES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "deployment_manager_status_writes_total",
            "Total number of status publications by result",
        ),
        &["result"],
    )
    .expect("Failed to create STATUS_WRITES_TOTAL metric - this should never happen")
});

static PHASE_TRANSITIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "deployment_manager_phase_transitions_total",
            "Total number of convergence phases entered by kind",
        ),
        &["kind", "phase"],
    )
    .expect("Failed to create PHASE_TRANSITIONS_TOTAL metric - this should never happen")
});

static RESOURCES: LazyLock<IntGaugeVec> = LazyLock::new(|| {
    IntGaugeVec::new(
        prometheus::Opts::new(
            "deployment_manager_resources",
            "Current number of resources by kind and deployment state",
        ),
        &["kind", "state"],
    )
    .expect("Failed to create RESOURCES metric - this should never happen")
});

#[allow(
    clippy::missing_errors_doc,
    reason = "Error documentation is provided in doc comments"
)]
pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(RECONCILIATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(PLATFORM_REQUESTS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(PLATFORM_REQUEST_DURATION.clone()))?;
    REGISTRY.register(Box::new(REQUEUES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(STATUS_WRITES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(PHASE_TRANSITIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RESOURCES.clone()))?;
    Ok(())
}

pub fn increment_reconciliations(kind: &str, result: &str) {
    RECONCILIATIONS_TOTAL
        .with_label_values(&[kind, result])
        .inc();
}

pub fn increment_reconciliation_errors(kind: &str) {
    RECONCILIATION_ERRORS_TOTAL.with_label_values(&[kind]).inc();
}

pub fn observe_reconciliation_duration(kind: &str, duration: f64) {
    RECONCILIATION_DURATION
        .with_label_values(&[kind])
        .observe(duration);
}

/// Record one platform API request
pub fn record_platform_request(kind: &str, operation: &str, result: &str, duration: f64) {
    PLATFORM_REQUESTS_TOTAL
        .with_label_values(&[kind, operation, result])
        .inc();
    PLATFORM_REQUEST_DURATION
        .with_label_values(&[kind, operation])
        .observe(duration);
}

pub fn increment_requeues(reason: &str) {
    REQUEUES_TOTAL.with_label_values(&[reason]).inc();
}

pub fn increment_status_writes(result: &str) {
    STATUS_WRITES_TOTAL.with_label_values(&[result]).inc();
}

pub fn increment_phase_transitions(kind: &str, phase: &str) {
    PHASE_TRANSITIONS_TOTAL
        .with_label_values(&[kind, phase])
        .inc();
}

pub fn set_resources(kind: &str, state: &str, count: i64) {
    RESOURCES.with_label_values(&[kind, state]).set(count);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_metrics() {
        // Registration may already have happened in another test
        let _ = register_metrics();
        assert!(!REGISTRY.gather().is_empty());
    }

    #[test]
    fn test_increment_reconciliations() {
        let before = RECONCILIATIONS_TOTAL
            .with_label_values(&["Host", "converged"])
            .get();
        increment_reconciliations("Host", "converged");
        let after = RECONCILIATIONS_TOTAL
            .with_label_values(&["Host", "converged"])
            .get();
        assert_eq!(after, before + 1u64);
    }

    #[test]
    fn test_record_platform_request() {
        let before = PLATFORM_REQUESTS_TOTAL
            .with_label_values(&["Interface", "create", "ok"])
            .get();
        record_platform_request("Interface", "create", "ok", 0.2);
        let after = PLATFORM_REQUESTS_TOTAL
            .with_label_values(&["Interface", "create", "ok"])
            .get();
        assert_eq!(after, before + 1u64);
    }

    #[test]
    fn test_set_resources() {
        set_resources("System", "Ready", 1);
        assert_eq!(RESOURCES.with_label_values(&["System", "Ready"]).get(), 1);
    }
}
