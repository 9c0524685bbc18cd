//! # DMCTL CLI
//!
//! Command-line interface for the Deployment Manager Controller.
//!
//! ## Usage
//!
//! ```bash
//! # List every Host in all namespaces
//! dmctl list host
//!
//! # Show the status of one resource
//! dmctl status interface controller-0-mgmt0 --namespace deployment
//!
//! # Re-evaluate a resource held in Failed
//! dmctl reconcile host controller-0
//!
//! # Pause and resume reconciliation
//! dmctl suspend host controller-0
//! dmctl resume host controller-0
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use deployment_manager_controller::crd::{DeploymentResource, DesiredResource, ResourceKind};
use deployment_manager_controller::with_kind;
use kube::api::{Api, ListParams};
use kube::Client;

mod list;
mod reconcile;
mod status;
mod suspend;

const KIND_HELP: &str = "\
Available resource kinds:
  system, host, platformnetwork, datanetwork, interface,
  storagebackend, ptpinstance, ptpinterface";

/// Deployment Manager Controller CLI
#[derive(Parser)]
#[command(name = "dmctl")]
#[command(
    about = "Deployment Manager Controller CLI",
    long_about = None,
    after_help = "\
Available resource kinds:
  system, host, platformnetwork, datanetwork, interface,
  storagebackend, ptpinstance, ptpinterface

Examples:
  dmctl list host
  dmctl status interface controller-0-mgmt0 --namespace deployment
  dmctl reconcile host controller-0
"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Kubernetes namespace (defaults to the controller namespace for single resources)
    #[arg(short, long, global = true)]
    namespace: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// List resources of one kind, or of every kind
    List {
        #[arg(value_name = "KIND", help = KIND_HELP)]
        kind: Option<ResourceKind>,
    },
    /// Show the status of a resource
    Status {
        #[arg(value_name = "KIND", help = KIND_HELP)]
        kind: ResourceKind,
        #[arg(value_name = "NAME")]
        name: String,
    },
    /// Re-evaluate a resource, including one held in Failed
    Reconcile {
        #[arg(value_name = "KIND", help = KIND_HELP)]
        kind: ResourceKind,
        #[arg(value_name = "NAME")]
        name: String,
    },
    /// Pause reconciliation of a resource
    Suspend {
        #[arg(value_name = "KIND", help = KIND_HELP)]
        kind: ResourceKind,
        #[arg(value_name = "NAME")]
        name: String,
    },
    /// Resume reconciliation of a resource
    Resume {
        #[arg(value_name = "KIND", help = KIND_HELP)]
        kind: ResourceKind,
        #[arg(value_name = "NAME")]
        name: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        anyhow::bail!("Failed to install rustls crypto provider");
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dmctl=info".into()),
        )
        .init();

    let cli = Cli::parse();

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client. Ensure kubeconfig is configured.")?;

    match cli.command {
        Commands::List { kind } => list::list_command(client, kind, cli.namespace).await,
        Commands::Status { kind, name } => {
            status::status_command(client, kind, &name, &namespace_or_default(cli.namespace)).await
        }
        Commands::Reconcile { kind, name } => {
            reconcile::reconcile_command(client, kind, &name, &namespace_or_default(cli.namespace))
                .await
        }
        Commands::Suspend { kind, name } => {
            suspend::set_suspended(client, kind, &name, &namespace_or_default(cli.namespace), true)
                .await
        }
        Commands::Resume { kind, name } => {
            suspend::set_suspended(client, kind, &name, &namespace_or_default(cli.namespace), false)
                .await
        }
    }
}

fn namespace_or_default(namespace: Option<String>) -> String {
    namespace.unwrap_or_else(|| {
        std::env::var("POD_NAMESPACE").unwrap_or_else(|_| {
            deployment_manager_controller::constants::DEFAULT_CONTROLLER_NAMESPACE.to_string()
        })
    })
}

async fn list_typed<K: DeploymentResource>(
    client: Client,
    namespace: Option<&str>,
) -> Result<Vec<DesiredResource>> {
    let api: Api<K> = match namespace {
        Some(ns) => Api::namespaced(client, ns),
        None => Api::all(client),
    };
    let list = api
        .list(&ListParams::default())
        .await
        .with_context(|| format!("Failed to list {} resources", K::KIND))?;
    Ok(list.items.iter().map(DesiredResource::from_object).collect())
}

async fn get_typed<K: DeploymentResource>(
    client: Client,
    name: &str,
    namespace: &str,
) -> Result<DesiredResource> {
    let obj = Api::<K>::namespaced(client, namespace)
        .get(name)
        .await
        .with_context(|| format!("Failed to get {} '{namespace}/{name}'", K::KIND))?;
    Ok(DesiredResource::from_object(&obj))
}

/// Resources of `kind`, in `namespace` or cluster-wide
pub(crate) async fn fetch_all(
    client: Client,
    kind: ResourceKind,
    namespace: Option<&str>,
) -> Result<Vec<DesiredResource>> {
    with_kind!(kind, K => list_typed::<K>(client, namespace).await)
}

pub(crate) async fn fetch_one(
    client: Client,
    kind: ResourceKind,
    name: &str,
    namespace: &str,
) -> Result<DesiredResource> {
    with_kind!(kind, K => get_typed::<K>(client, name, namespace).await)
}
