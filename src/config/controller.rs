//! # Controller Configuration
//!
//! Controller-level settings loaded from environment variables.

use std::time::Duration;

/// Controller-level configuration
///
/// All settings have defaults and can be overridden via environment variables.
/// Environment variables are populated from a ConfigMap using `envFrom` in the deployment.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Maximum concurrent reconciliations per resource kind
    pub max_concurrent_reconciliations: usize,
    /// Interval between full resyncs of every resource (seconds)
    pub resync_interval_secs: u64,
    /// Deadline for the remote part of a single attempt (seconds)
    pub attempt_deadline_secs: u64,
    /// Exponential backoff base (milliseconds)
    pub backoff_base_ms: u64,
    /// Exponential backoff cap (milliseconds)
    pub backoff_max_ms: u64,
    /// Delay used for an immediate requeue (milliseconds)
    pub immediate_requeue_ms: u64,
    /// Requeue delay while a prerequisite is not Ready (seconds)
    pub dependency_requeue_secs: u64,
    /// Requeue delay while a prerequisite is not declared (seconds)
    pub missing_dependency_requeue_secs: u64,
    /// Poll interval while the platform reports a task in progress (seconds)
    pub poll_interval_secs: u64,
    /// Re-read attempts when a status write conflicts
    pub status_conflict_retries: u32,
    /// Delay before restarting the controllers after their streams end (seconds)
    pub watch_restart_delay_after_end_secs: u64,
    /// Namespace the controller is deployed in
    pub controller_namespace: String,
    /// Namespace to watch; every namespace when unset
    pub watch_namespace: Option<String>,
    /// Log format (json, text)
    pub log_format: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        use crate::constants::*;
        Self {
            max_concurrent_reconciliations: DEFAULT_MAX_CONCURRENT_RECONCILIATIONS,
            resync_interval_secs: DEFAULT_RESYNC_INTERVAL_SECS,
            attempt_deadline_secs: DEFAULT_ATTEMPT_DEADLINE_SECS,
            backoff_base_ms: DEFAULT_BACKOFF_BASE_MS,
            backoff_max_ms: DEFAULT_BACKOFF_MAX_MS,
            immediate_requeue_ms: DEFAULT_IMMEDIATE_REQUEUE_MS,
            dependency_requeue_secs: DEFAULT_DEPENDENCY_REQUEUE_SECS,
            missing_dependency_requeue_secs: DEFAULT_MISSING_DEPENDENCY_REQUEUE_SECS,
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            status_conflict_retries: DEFAULT_STATUS_CONFLICT_RETRIES,
            watch_restart_delay_after_end_secs: DEFAULT_WATCH_RESTART_DELAY_AFTER_END_SECS,
            controller_namespace: DEFAULT_CONTROLLER_NAMESPACE.to_string(),
            watch_namespace: None,
            log_format: "json".to_string(),
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        use crate::constants::*;
        Self {
            max_concurrent_reconciliations: env_var_or_default(
                "MAX_CONCURRENT_RECONCILIATIONS",
                DEFAULT_MAX_CONCURRENT_RECONCILIATIONS,
            ),
            resync_interval_secs: env_var_or_default(
                "RESYNC_INTERVAL_SECS",
                DEFAULT_RESYNC_INTERVAL_SECS,
            ),
            attempt_deadline_secs: env_var_or_default(
                "ATTEMPT_DEADLINE_SECS",
                DEFAULT_ATTEMPT_DEADLINE_SECS,
            ),
            backoff_base_ms: env_var_or_default("BACKOFF_BASE_MS", DEFAULT_BACKOFF_BASE_MS),
            backoff_max_ms: env_var_or_default("BACKOFF_MAX_MS", DEFAULT_BACKOFF_MAX_MS),
            immediate_requeue_ms: env_var_or_default(
                "IMMEDIATE_REQUEUE_MS",
                DEFAULT_IMMEDIATE_REQUEUE_MS,
            ),
            dependency_requeue_secs: env_var_or_default(
                "DEPENDENCY_REQUEUE_SECS",
                DEFAULT_DEPENDENCY_REQUEUE_SECS,
            ),
            missing_dependency_requeue_secs: env_var_or_default(
                "MISSING_DEPENDENCY_REQUEUE_SECS",
                DEFAULT_MISSING_DEPENDENCY_REQUEUE_SECS,
            ),
            poll_interval_secs: env_var_or_default("POLL_INTERVAL_SECS", DEFAULT_POLL_INTERVAL_SECS),
            status_conflict_retries: env_var_or_default(
                "STATUS_CONFLICT_RETRIES",
                DEFAULT_STATUS_CONFLICT_RETRIES,
            ),
            watch_restart_delay_after_end_secs: env_var_or_default(
                "WATCH_RESTART_DELAY_AFTER_END_SECS",
                DEFAULT_WATCH_RESTART_DELAY_AFTER_END_SECS,
            ),
            controller_namespace: env_var_or_default_str(
                "POD_NAMESPACE",
                DEFAULT_CONTROLLER_NAMESPACE,
            ),
            watch_namespace: env_var_opt("WATCH_NAMESPACE"),
            log_format: env_var_or_default_str("LOG_FORMAT", "json"),
        }
    }

    pub fn resync_interval(&self) -> Duration {
        Duration::from_secs(self.resync_interval_secs)
    }

    pub fn attempt_deadline(&self) -> Duration {
        Duration::from_secs(self.attempt_deadline_secs)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn backoff_max(&self) -> Duration {
        Duration::from_millis(self.backoff_max_ms)
    }

    pub fn immediate_requeue(&self) -> Duration {
        Duration::from_millis(self.immediate_requeue_ms)
    }

    pub fn dependency_requeue(&self) -> Duration {
        Duration::from_secs(self.dependency_requeue_secs)
    }

    pub fn missing_dependency_requeue(&self) -> Duration {
        Duration::from_secs(self.missing_dependency_requeue_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn watch_restart_delay_after_end(&self) -> Duration {
        Duration::from_secs(self.watch_restart_delay_after_end_secs)
    }
}

/// Parse environment variable or return default
pub(crate) fn env_var_or_default<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Parse environment variable as string or return default
pub(crate) fn env_var_or_default_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Non-blank environment variable
pub(crate) fn env_var_opt(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_consistent() {
        let config = ControllerConfig::default();
        assert!(config.backoff_base() <= config.backoff_max());
        assert!(config.dependency_requeue() <= config.missing_dependency_requeue());
        assert_eq!(config.max_concurrent_reconciliations, 10);
    }

    #[test]
    fn unparsable_values_fall_back_to_default() {
        assert_eq!(env_var_or_default("DM_TEST_UNSET_VARIABLE", 42u64), 42);
    }

    #[test]
    fn blank_watch_namespace_watches_everything() {
        assert_eq!(ControllerConfig::default().watch_namespace, None);
        assert_eq!(env_var_opt("DM_TEST_UNSET_VARIABLE"), None);

        std::env::set_var("DM_TEST_WATCH_NAMESPACE", "  ");
        assert_eq!(env_var_opt("DM_TEST_WATCH_NAMESPACE"), None);
        std::env::set_var("DM_TEST_WATCH_NAMESPACE", "site-a");
        assert_eq!(env_var_opt("DM_TEST_WATCH_NAMESPACE").as_deref(), Some("site-a"));
        std::env::remove_var("DM_TEST_WATCH_NAMESPACE");
    }
}
