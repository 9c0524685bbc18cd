//! # Prelude
//!
//! Re-exports commonly used types and traits for convenience.
//!
//! ```rust
//! use deployment_manager_controller::prelude::*;
//! ```

pub use crate::crd::*;

pub use crate::controller::convergence::{Convergence, ConvergenceEvent, Fingerprint};
pub use crate::controller::dependency::{DependencyTable, Eligibility, Snapshot};
pub use crate::controller::reconciler::{
    reconcile, reconcile_resource, Outcome, Reconciler, ReconcilerError, RetryDirective,
};
pub use crate::controller::retry::{ErrorClass, RetryController, RetryDecision};
pub use crate::controller::status::{PublishResult, StatusReporter};

pub use crate::config::{ControllerConfig, PlatformConfig, ServerConfig};

pub use crate::platform::{PlatformApi, PlatformEntity, PlatformError, SysinvClient};
pub use crate::store::{KubeStore, MemoryStore, ResourceStore, StoreError};
