//! # Reconcile Command
//!
//! Sets the re-trigger annotation. The controller re-evaluates the resource,
//! including one held in Failed, and clears the annotation afterwards.

use anyhow::{Context, Result};
use deployment_manager_controller::constants::RETRIGGER_ANNOTATION;
use deployment_manager_controller::crd::{DeploymentResource, ResourceKind};
use deployment_manager_controller::with_kind;
use kube::api::{Api, Patch, PatchParams};
use kube::Client;
use serde_json::json;

async fn annotate<K: DeploymentResource>(
    client: Client,
    name: &str,
    namespace: &str,
    value: &str,
) -> Result<()> {
    let patch = json!({
        "metadata": {
            "annotations": {
                RETRIGGER_ANNOTATION: value
            }
        }
    });
    Api::<K>::namespaced(client, namespace)
        .patch(name, &PatchParams::default(), &Patch::Merge(patch))
        .await
        .with_context(|| {
            format!("Failed to trigger reconciliation for {} '{namespace}/{name}'", K::KIND)
        })?;
    Ok(())
}

pub async fn reconcile_command(
    client: Client,
    kind: ResourceKind,
    name: &str,
    namespace: &str,
) -> Result<()> {
    println!("Triggering reconciliation for {kind} '{namespace}/{name}'...");

    let resource = super::fetch_one(client.clone(), kind, name, namespace).await?;
    if resource.suspended {
        println!("   Warning: resource is suspended. Reconciliation will be skipped.");
        println!("   Use 'dmctl resume {} {name}' to resume reconciliation.", kind.label());
    }

    let timestamp = chrono::Utc::now().to_rfc3339();
    with_kind!(kind, K => annotate::<K>(client, name, namespace, &timestamp).await)?;

    println!("Reconciliation triggered");
    println!("   Resource: {namespace}/{name}");
    println!("   Annotation: {RETRIGGER_ANNOTATION}={timestamp}");
    println!("\nThe controller will reconcile this resource shortly.");
    Ok(())
}
