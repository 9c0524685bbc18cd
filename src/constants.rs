//! # Constants
//!
//! Shared constants used throughout the controller.
//!
//! These values represent reasonable defaults and can be overridden via
//! environment variables where applicable.

/// API group shared by every deployment resource kind
pub const API_GROUP: &str = "deployment-manager.starlingx.io";

/// Finalizer guarding removal of a resource until its platform entity is gone
pub const FINALIZER: &str = "deployment-manager.starlingx.io/finalizer";

/// Annotation set by `dmctl reconcile` to force a re-evaluation of a held resource
pub const RETRIGGER_ANNOTATION: &str = "deployment-manager.starlingx.io/reconcile";

/// Annotation that pauses reconciliation while set to `"true"`
pub const SUSPEND_ANNOTATION: &str = "deployment-manager.starlingx.io/suspend";

/// Annotation selecting what happens to the platform entity on deletion (`delete` or `orphan`)
pub const DELETION_POLICY_ANNOTATION: &str = "deployment-manager.starlingx.io/deletion-policy";

/// Default HTTP server port for metrics and health probes
pub const DEFAULT_METRICS_PORT: u16 = 5000;

/// Default HTTP server startup timeout (how long to wait for server to be ready)
pub const DEFAULT_SERVER_STARTUP_TIMEOUT_SECS: u64 = 10;

/// Default HTTP server readiness poll interval
pub const DEFAULT_SERVER_POLL_INTERVAL_MS: u64 = 50;

/// Default maximum number of reconciliations running at once per kind
pub const DEFAULT_MAX_CONCURRENT_RECONCILIATIONS: usize = 10;

/// Default interval between full resyncs of every resource (seconds)
pub const DEFAULT_RESYNC_INTERVAL_SECS: u64 = 300;

/// Default deadline for the remote part of one attempt (seconds)
pub const DEFAULT_ATTEMPT_DEADLINE_SECS: u64 = 120;

/// Default exponential backoff base (milliseconds)
pub const DEFAULT_BACKOFF_BASE_MS: u64 = 1000;

/// Default exponential backoff cap (milliseconds)
pub const DEFAULT_BACKOFF_MAX_MS: u64 = 300_000;

/// Default delay for an immediate requeue (milliseconds)
pub const DEFAULT_IMMEDIATE_REQUEUE_MS: u64 = 500;

/// Default requeue delay while a prerequisite exists but is not Ready (seconds)
pub const DEFAULT_DEPENDENCY_REQUEUE_SECS: u64 = 15;

/// Default requeue delay while a prerequisite is not declared at all (seconds)
pub const DEFAULT_MISSING_DEPENDENCY_REQUEUE_SECS: u64 = 60;

/// Default interval between polls of a remote entity with a task in progress (seconds)
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;

/// Default number of re-read attempts when a status write hits a conflict
pub const DEFAULT_STATUS_CONFLICT_RETRIES: u32 = 5;

/// Default delay before restarting the controllers after their streams end (seconds)
pub const DEFAULT_WATCH_RESTART_DELAY_AFTER_END_SECS: u64 = 1;

/// Default per-request timeout for the platform API (seconds)
pub const DEFAULT_PLATFORM_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Refresh the platform session token this long before it expires (seconds)
pub const DEFAULT_TOKEN_REFRESH_MARGIN_SECS: i64 = 60;

/// Namespace the controller runs in when `POD_NAMESPACE` is unset
pub const DEFAULT_CONTROLLER_NAMESPACE: &str = "deployment";
