//! # Deployment Manager Controller
//!
//! A Kubernetes controller that converges declarative deployment resources
//! onto the platform inventory API.
//!
//! ## Overview
//!
//! 1. **Watching deployment resources** - One controller per kind (System, Host,
//!    PlatformNetwork, DataNetwork, Interface, StorageBackend, PtpInstance, PtpInterface)
//! 2. **Ordering** - A resource is applied only once its prerequisites are Ready, and
//!    torn down only once its dependents are gone
//! 3. **Converging** - Each attempt issues at most one mutating platform call and
//!    re-reads the entity to confirm the result
//! 4. **Reporting** - Conditions, deployment state and phase on the status subresource
//!
//! Metrics and probes are served on `METRICS_PORT` (default 5000).

use anyhow::Result;
use deployment_manager_controller::runtime::{initialization, watch_loop};

#[tokio::main]
async fn main() -> Result<()> {
    let init = initialization::initialize().await?;
    watch_loop::run_watch_loop(
        init.client,
        init.reconciler,
        init.server_state,
        init.controller_config,
    )
    .await
}
