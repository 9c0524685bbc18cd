//! In-process store with API-server semantics for finalizers, generations and
//! resourceVersion preconditions.

use super::{ResourceStore, StoreError};
use crate::constants::FINALIZER;
use crate::crd::{DesiredResource, ResourceKey, ResourceKind, ResourceSpec, ResourceStatus};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct State {
    objects: BTreeMap<ResourceKey, DesiredResource>,
    next_version: u64,
    status_writes: usize,
}

impl State {
    fn bump(&mut self, key: &ResourceKey) {
        self.next_version += 1;
        let version = self.next_version.to_string();
        if let Some(obj) = self.objects.get_mut(key) {
            obj.resource_version = Some(version);
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create or overwrite an object as-is, assigning a fresh resourceVersion
    pub fn insert(&self, resource: DesiredResource) {
        let mut state = self.state();
        let key = resource.key.clone();
        state.objects.insert(key.clone(), resource);
        state.bump(&key);
    }

    /// Change the spec, bumping the generation when it differs
    pub fn update_spec(&self, key: &ResourceKey, spec: ResourceSpec) {
        let mut state = self.state();
        if let Some(obj) = state.objects.get_mut(key) {
            if obj.spec != spec {
                obj.spec = spec;
                obj.generation += 1;
            }
        }
        state.bump(key);
    }

    /// Mark for deletion; without finalizers the object is removed at once
    pub fn request_deletion(&self, key: &ResourceKey) {
        let mut state = self.state();
        let remove = match state.objects.get_mut(key) {
            Some(obj) => {
                obj.deletion_requested = true;
                obj.finalizers.is_empty()
            }
            None => false,
        };
        if remove {
            state.objects.remove(key);
        } else {
            state.bump(key);
        }
    }

    pub fn set_retrigger(&self, key: &ResourceKey, value: &str) {
        let mut state = self.state();
        if let Some(obj) = state.objects.get_mut(key) {
            obj.retrigger = Some(value.to_string());
        }
        state.bump(key);
    }

    /// Overwrite the status without a precondition, as another writer would
    pub fn write_status(&self, key: &ResourceKey, status: ResourceStatus) {
        let mut state = self.state();
        if let Some(obj) = state.objects.get_mut(key) {
            obj.status = status;
        }
        state.bump(key);
    }

    #[must_use]
    pub fn resource(&self, key: &ResourceKey) -> Option<DesiredResource> {
        self.state().objects.get(key).cloned()
    }

    /// Successful status writes so far
    #[must_use]
    pub fn status_writes(&self) -> usize {
        self.state().status_writes
    }
}

#[async_trait]
impl ResourceStore for MemoryStore {
    async fn get(&self, key: &ResourceKey) -> Result<Option<DesiredResource>, StoreError> {
        Ok(self.resource(key))
    }

    async fn list(
        &self,
        kind: ResourceKind,
        namespace: &str,
    ) -> Result<Vec<DesiredResource>, StoreError> {
        Ok(self
            .state()
            .objects
            .values()
            .filter(|obj| obj.key.kind == kind && obj.key.namespace == namespace)
            .cloned()
            .collect())
    }

    async fn ensure_finalizer(&self, resource: &DesiredResource) -> Result<(), StoreError> {
        let mut state = self.state();
        let key = &resource.key;
        let obj = state
            .objects
            .get_mut(key)
            .ok_or_else(|| StoreError::NotFound(key.clone()))?;
        if obj.resource_version != resource.resource_version {
            return Err(StoreError::Conflict(key.clone()));
        }
        if obj.has_finalizer() {
            return Ok(());
        }
        obj.finalizers.push(FINALIZER.to_string());
        state.bump(key);
        Ok(())
    }

    async fn remove_finalizer(&self, resource: &DesiredResource) -> Result<(), StoreError> {
        let mut state = self.state();
        let key = &resource.key;
        let Some(obj) = state.objects.get_mut(key) else {
            return Ok(());
        };
        if obj.resource_version != resource.resource_version {
            return Err(StoreError::Conflict(key.clone()));
        }
        obj.finalizers.retain(|f| f != FINALIZER);
        if obj.deletion_requested && obj.finalizers.is_empty() {
            state.objects.remove(key);
        } else {
            state.bump(key);
        }
        Ok(())
    }

    async fn replace_status(
        &self,
        key: &ResourceKey,
        resource_version: &str,
        status: &ResourceStatus,
    ) -> Result<(), StoreError> {
        let mut state = self.state();
        let obj = state
            .objects
            .get_mut(key)
            .ok_or_else(|| StoreError::NotFound(key.clone()))?;
        if obj.resource_version.as_deref() != Some(resource_version) {
            return Err(StoreError::Conflict(key.clone()));
        }
        obj.status = status.clone();
        state.status_writes += 1;
        state.bump(key);
        Ok(())
    }

    async fn clear_retrigger(&self, key: &ResourceKey, value: &str) -> Result<(), StoreError> {
        let mut state = self.state();
        let Some(obj) = state.objects.get_mut(key) else {
            return Ok(());
        };
        if obj.retrigger.as_deref() == Some(value) {
            obj.retrigger = None;
            state.bump(key);
        }
        Ok(())
    }
}
