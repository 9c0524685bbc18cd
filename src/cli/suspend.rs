//! # Suspend/Resume Commands
//!
//! Toggle the suspend annotation of a resource.

use anyhow::{Context, Result};
use deployment_manager_controller::constants::SUSPEND_ANNOTATION;
use deployment_manager_controller::crd::{DeploymentResource, ResourceKind};
use deployment_manager_controller::with_kind;
use kube::api::{Api, Patch, PatchParams};
use kube::Client;
use serde_json::{json, Value};

async fn patch_annotation<K: DeploymentResource>(
    client: Client,
    name: &str,
    namespace: &str,
    value: Value,
) -> Result<()> {
    let patch = json!({
        "metadata": {
            "annotations": {
                SUSPEND_ANNOTATION: value
            }
        }
    });
    Api::<K>::namespaced(client, namespace)
        .patch(name, &PatchParams::default(), &Patch::Merge(patch))
        .await
        .with_context(|| format!("Failed to update {} '{namespace}/{name}'", K::KIND))?;
    Ok(())
}

pub async fn set_suspended(
    client: Client,
    kind: ResourceKind,
    name: &str,
    namespace: &str,
    suspend: bool,
) -> Result<()> {
    let resource = super::fetch_one(client.clone(), kind, name, namespace).await?;
    if resource.suspended == suspend {
        let state = if suspend { "suspended" } else { "active" };
        println!("{kind} '{namespace}/{name}' is already {state}");
        return Ok(());
    }

    // Removing the annotation resumes; a merge patch with null deletes the key
    let value = if suspend { json!("true") } else { Value::Null };
    with_kind!(kind, K => patch_annotation::<K>(client, name, namespace, value).await)?;

    if suspend {
        println!("Reconciliation suspended for {kind} '{namespace}/{name}'");
        println!("\nTo resume reconciliation, run:");
        println!("   dmctl resume {} {name} --namespace {namespace}", kind.label());
    } else {
        println!("Reconciliation resumed for {kind} '{namespace}/{name}'");
        println!("\nThe controller will reconcile this resource shortly.");
    }
    Ok(())
}
