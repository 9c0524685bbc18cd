//! # Resource Store
//!
//! Access to the desired objects and their status subresource.
//!
//! [`KubeStore`] talks to the API server; [`MemoryStore`] keeps everything in
//! process and backs the engine tests. Both enforce the same optimistic
//! concurrency contract: a status write carries the resourceVersion it was
//! computed from and fails with [`StoreError::Conflict`] when the object moved on.

mod kube;
mod memory;

pub use self::kube::KubeStore;
pub use memory::MemoryStore;

use crate::crd::{DesiredResource, ResourceKey, ResourceKind, ResourceStatus};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("resource {0} not found")]
    NotFound(ResourceKey),
    #[error("resource {0} was modified concurrently")]
    Conflict(ResourceKey),
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] ::kube::Error),
    #[error("failed to encode request: {0}")]
    Encode(String),
}

#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Current state of a resource, `None` once it is gone
    async fn get(&self, key: &ResourceKey) -> Result<Option<DesiredResource>, StoreError>;

    async fn list(
        &self,
        kind: ResourceKind,
        namespace: &str,
    ) -> Result<Vec<DesiredResource>, StoreError>;

    /// Add the controller finalizer if it is missing
    async fn ensure_finalizer(&self, resource: &DesiredResource) -> Result<(), StoreError>;

    /// Remove the controller finalizer; the object disappears once no finalizer remains
    async fn remove_finalizer(&self, resource: &DesiredResource) -> Result<(), StoreError>;

    /// Replace the status if the object is still at `resource_version`
    async fn replace_status(
        &self,
        key: &ResourceKey,
        resource_version: &str,
        status: &ResourceStatus,
    ) -> Result<(), StoreError>;

    /// Clear the re-trigger annotation if it still holds `value`
    async fn clear_retrigger(&self, key: &ResourceKey, value: &str) -> Result<(), StoreError>;
}
