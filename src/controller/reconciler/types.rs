//! # Types
//!
//! Core types for the reconciler.

use crate::config::ControllerConfig;
use crate::controller::convergence::TransitionError;
use crate::controller::dependency::DependencyTable;
use crate::controller::retry::RetryController;
use crate::controller::status::StatusReporter;
use crate::crd::ResourceKey;
use crate::platform::PlatformApi;
use crate::store::{ResourceStore, StoreError};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error("status of {key} kept conflicting after {attempts} attempts")]
    StatusConflict { key: ResourceKey, attempts: u32 },
}

/// Shared context of every reconciliation
#[derive(Clone)]
pub struct Reconciler {
    pub store: Arc<dyn ResourceStore>,
    pub platform: Arc<dyn PlatformApi>,
    pub table: &'static DependencyTable,
    pub config: Arc<ControllerConfig>,
    pub retry: RetryController,
    pub reporter: StatusReporter,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    #[must_use]
    pub fn new(
        store: Arc<dyn ResourceStore>,
        platform: Arc<dyn PlatformApi>,
        config: ControllerConfig,
    ) -> Self {
        let retry = RetryController::new(&config);
        let reporter = StatusReporter::new(store.clone(), config.status_conflict_retries);
        Self {
            store,
            platform,
            table: DependencyTable::standard(),
            config: Arc::new(config),
            retry,
            reporter,
        }
    }
}
