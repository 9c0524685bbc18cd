//! # List Command
//!
//! Command to list deployment resources.

use anyhow::Result;
use deployment_manager_controller::crd::{DesiredResource, ResourceKind};
use kube::Client;

/// List resources of `kind`, or of every kind when none is given
pub async fn list_command(
    client: Client,
    kind: Option<ResourceKind>,
    namespace: Option<String>,
) -> Result<()> {
    let kinds: Vec<ResourceKind> = kind.map_or_else(|| ResourceKind::ALL.to_vec(), |k| vec![k]);
    match &namespace {
        Some(ns) => println!("Listing resources in namespace '{ns}'..."),
        None => println!("Listing resources in all namespaces..."),
    }

    let mut resources: Vec<DesiredResource> = Vec::new();
    for kind in kinds {
        resources.extend(super::fetch_all(client.clone(), kind, namespace.as_deref()).await?);
    }

    if resources.is_empty() {
        println!("No resources found.");
        return Ok(());
    }

    println!(
        "\n{:<16} {:<30} {:<16} {:<12} {:<11} {:<8}",
        "KIND", "NAME", "NAMESPACE", "STATE", "PHASE", "READY"
    );
    println!("{}", "-".repeat(98));

    for resource in resources {
        let ready = resource
            .status
            .condition("Ready")
            .map_or("Unknown", |c| if c.is_true() { "True" } else { "False" });
        let suspended = if resource.suspended { " (suspended)" } else { "" };
        println!(
            "{:<16} {:<30} {:<16} {:<12} {:<11} {:<8}{suspended}",
            resource.key.kind.label(),
            resource.key.name,
            resource.key.namespace,
            resource.status.deployment_state.as_str(),
            resource.status.phase.as_str(),
            ready,
        );
    }

    Ok(())
}
