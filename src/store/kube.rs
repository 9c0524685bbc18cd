//! API-server backed store.

use super::{ResourceStore, StoreError};
use crate::constants::{FINALIZER, RETRIGGER_ANNOTATION};
use crate::crd::{DeploymentResource, DesiredResource, ResourceKey, ResourceKind, ResourceStatus};
use crate::with_kind;
use async_trait::async_trait;
use kube::api::{ListParams, Patch, PatchParams};
use kube::{Api, Client, ResourceExt};
use serde_json::json;
use tracing::debug;

#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl std::fmt::Debug for KubeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeStore").finish_non_exhaustive()
    }
}

impl KubeStore {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

fn classify(err: kube::Error, key: &ResourceKey) -> StoreError {
    match err {
        kube::Error::Api(api_err) if api_err.code == 409 => StoreError::Conflict(key.clone()),
        kube::Error::Api(api_err) if api_err.code == 404 => StoreError::NotFound(key.clone()),
        other => StoreError::Kube(other),
    }
}

fn api<K: DeploymentResource>(client: &Client, namespace: &str) -> Api<K> {
    Api::namespaced(client.clone(), namespace)
}

async fn get_typed<K: DeploymentResource>(
    client: &Client,
    key: &ResourceKey,
) -> Result<Option<DesiredResource>, StoreError> {
    let obj = api::<K>(client, &key.namespace)
        .get_opt(&key.name)
        .await
        .map_err(|e| classify(e, key))?;
    Ok(obj.as_ref().map(DesiredResource::from_object))
}

async fn list_typed<K: DeploymentResource>(
    client: &Client,
    namespace: &str,
) -> Result<Vec<DesiredResource>, StoreError> {
    let list = api::<K>(client, namespace)
        .list(&ListParams::default())
        .await?;
    Ok(list.items.iter().map(DesiredResource::from_object).collect())
}

async fn patch_typed<K: DeploymentResource>(
    client: &Client,
    key: &ResourceKey,
    patch: serde_json::Value,
) -> Result<(), StoreError> {
    api::<K>(client, &key.namespace)
        .patch(&key.name, &PatchParams::default(), &Patch::Merge(patch))
        .await
        .map_err(|e| classify(e, key))?;
    Ok(())
}

async fn patch_status_typed<K: DeploymentResource>(
    client: &Client,
    key: &ResourceKey,
    patch: serde_json::Value,
) -> Result<(), StoreError> {
    api::<K>(client, &key.namespace)
        .patch_status(&key.name, &PatchParams::default(), &Patch::Merge(patch))
        .await
        .map_err(|e| classify(e, key))?;
    Ok(())
}

/// Annotations of the live object; the engine's view does not keep them all
async fn retrigger_of<K: DeploymentResource>(
    client: &Client,
    key: &ResourceKey,
) -> Result<Option<(Option<String>, Option<String>)>, StoreError> {
    let obj = api::<K>(client, &key.namespace)
        .get_opt(&key.name)
        .await
        .map_err(|e| classify(e, key))?;
    Ok(obj.map(|o| {
        (
            o.annotations().get(RETRIGGER_ANNOTATION).cloned(),
            o.resource_version(),
        )
    }))
}

/// Merge patch replacing the finalizer list, guarded by the resourceVersion it was derived from
fn finalizer_patch(resource: &DesiredResource, finalizers: &[String]) -> serde_json::Value {
    json!({
        "metadata": {
            "resourceVersion": resource.resource_version,
            "finalizers": finalizers,
        }
    })
}

#[async_trait]
impl ResourceStore for KubeStore {
    async fn get(&self, key: &ResourceKey) -> Result<Option<DesiredResource>, StoreError> {
        with_kind!(key.kind, K => get_typed::<K>(&self.client, key).await)
    }

    async fn list(
        &self,
        kind: ResourceKind,
        namespace: &str,
    ) -> Result<Vec<DesiredResource>, StoreError> {
        with_kind!(kind, K => list_typed::<K>(&self.client, namespace).await)
    }

    async fn ensure_finalizer(&self, resource: &DesiredResource) -> Result<(), StoreError> {
        if resource.has_finalizer() {
            return Ok(());
        }
        let mut finalizers = resource.finalizers.clone();
        finalizers.push(FINALIZER.to_string());
        let patch = finalizer_patch(resource, &finalizers);
        debug!(resource = %resource.key, "Adding finalizer");
        with_kind!(resource.key.kind, K => patch_typed::<K>(&self.client, &resource.key, patch).await)
    }

    async fn remove_finalizer(&self, resource: &DesiredResource) -> Result<(), StoreError> {
        if !resource.has_finalizer() {
            return Ok(());
        }
        let finalizers: Vec<String> = resource
            .finalizers
            .iter()
            .filter(|f| f.as_str() != FINALIZER)
            .cloned()
            .collect();
        let patch = finalizer_patch(resource, &finalizers);
        debug!(resource = %resource.key, "Removing finalizer");
        let result = with_kind!(resource.key.kind, K => patch_typed::<K>(&self.client, &resource.key, patch).await);
        match result {
            // Already gone
            Err(StoreError::NotFound(_)) => Ok(()),
            other => other,
        }
    }

    async fn replace_status(
        &self,
        key: &ResourceKey,
        resource_version: &str,
        status: &ResourceStatus,
    ) -> Result<(), StoreError> {
        let status = serde_json::to_value(status).map_err(|e| StoreError::Encode(e.to_string()))?;
        let patch = json!({
            "metadata": { "resourceVersion": resource_version },
            "status": status,
        });
        with_kind!(key.kind, K => patch_status_typed::<K>(&self.client, key, patch).await)
    }

    async fn clear_retrigger(&self, key: &ResourceKey, value: &str) -> Result<(), StoreError> {
        let current = with_kind!(key.kind, K => retrigger_of::<K>(&self.client, key).await)?;
        let Some((Some(annotation), resource_version)) = current else {
            return Ok(());
        };
        if annotation != value {
            // Set again since it was consumed
            return Ok(());
        }
        let patch = json!({
            "metadata": {
                "resourceVersion": resource_version,
                "annotations": { RETRIGGER_ANNOTATION: null },
            }
        });
        with_kind!(key.kind, K => patch_typed::<K>(&self.client, key, patch).await)
    }
}
