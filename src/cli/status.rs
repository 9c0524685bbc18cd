//! # Status Command
//!
//! Command to show detailed status of a deployment resource.

use anyhow::Result;
use deployment_manager_controller::crd::ResourceKind;
use kube::Client;

/// Show detailed status of a resource
pub async fn status_command(
    client: Client,
    kind: ResourceKind,
    name: &str,
    namespace: &str,
) -> Result<()> {
    println!("Status for {kind} '{namespace}/{name}'");
    println!();

    let resource = super::fetch_one(client, kind, name, namespace).await?;

    println!("Resource Information:");
    println!("  Kind: {}", resource.key.kind);
    println!("  Name: {}", resource.key.name);
    println!("  Namespace: {}", resource.key.namespace);
    println!("  Generation: {}", resource.generation);
    println!("  Suspended: {}", resource.suspended);
    if resource.deletion_requested {
        println!("  Deletion requested: true");
    }
    if let Some(token) = &resource.retrigger {
        println!("  Pending re-trigger: {token}");
    }

    let status = &resource.status;
    println!();
    println!("Status:");
    println!("  Deployment State: {}", status.deployment_state);
    println!("  Phase: {}", status.phase);
    if let Some(observed_generation) = status.observed_generation {
        println!("  Observed Generation: {observed_generation}");
    }
    if let Some(platform_id) = &status.platform_id {
        println!("  Platform ID: {platform_id}");
    }
    if let Some(fingerprint) = &status.applied_fingerprint {
        println!("  Applied Fingerprint: {fingerprint}");
    }
    if status.consecutive_failures > 0 {
        println!("  Consecutive Failures: {}", status.consecutive_failures);
    }
    if let Some(last_reconcile_time) = &status.last_reconcile_time {
        println!("  Last Reconcile Time: {last_reconcile_time}");
    }
    if !status.blocked_by.is_empty() {
        println!("  Blocked By:");
        for blocker in &status.blocked_by {
            println!("    - {blocker}");
        }
    }

    if status.conditions.is_empty() {
        println!();
        println!("No conditions yet (resource may not have been reconciled)");
        return Ok(());
    }
    println!();
    println!("Conditions:");
    for condition in &status.conditions {
        println!("  {}: {}", condition.r#type, condition.status);
        if let Some(reason) = &condition.reason {
            println!("    Reason: {reason}");
        }
        if let Some(message) = &condition.message {
            println!("    Message: {message}");
        }
        if let Some(last_transition_time) = &condition.last_transition_time {
            println!("    Last Transition: {last_transition_time}");
        }
    }

    Ok(())
}
