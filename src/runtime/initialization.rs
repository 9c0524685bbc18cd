//! # Initialization
//!
//! Controller initialization: rustls setup, tracing, metrics, server startup,
//! Kubernetes and platform clients, and the reconciler context.

use crate::config::{ControllerConfig, PlatformConfig, ServerConfig};
use crate::controller::dependency::DependencyTable;
use crate::controller::reconciler::Reconciler;
use crate::controller::server::{start_server, ServerState};
use crate::observability;
use crate::platform::SysinvClient;
use crate::store::KubeStore;
use anyhow::{Context, Result};
use kube::Client;
use std::sync::Arc;
use tracing::{error, info};

/// Everything the watch loop needs
pub struct InitializationResult {
    pub client: Client,
    pub reconciler: Arc<Reconciler>,
    pub server_state: Arc<ServerState>,
    pub controller_config: ControllerConfig,
}

impl std::fmt::Debug for InitializationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitializationResult")
            .field("server_ready", &self.server_state.ready())
            .field("controller_config", &self.controller_config)
            .finish_non_exhaustive()
    }
}

/// Install the tracing subscriber
///
/// `RUST_LOG` selects the filter; `LOG_FORMAT=text` switches from JSON to
/// human-readable output.
pub fn init_tracing(log_format: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "deployment_manager_controller=info".into());
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let result = if log_format.eq_ignore_ascii_case("text") {
        builder.try_init()
    } else {
        builder.json().flatten_event(true).try_init()
    };
    if let Err(e) = result {
        eprintln!("Tracing subscriber already initialized: {e}");
    }
}

/// Initialize the controller runtime
///
/// # Errors
/// Invalid dependency table, missing platform endpoint or credentials, or
/// a server or Kubernetes client that cannot be started.
pub async fn initialize() -> Result<InitializationResult> {
    // Must happen before any TLS connection is made
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        return Err(anyhow::anyhow!("Failed to install rustls crypto provider"));
    }

    let controller_config = ControllerConfig::from_env();
    init_tracing(&controller_config.log_format);

    info!("Starting Deployment Manager Controller");
    info!(
        "Build info: timestamp={}, datetime={}, git_hash={}",
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_DATETIME"),
        env!("BUILD_GIT_HASH")
    );

    let order = DependencyTable::standard()
        .validate()
        .context("Dependency table is invalid")?;
    info!(
        order = ?order.iter().map(|k| k.as_str()).collect::<Vec<_>>(),
        "Dependency table validated"
    );

    observability::metrics::register_metrics()?;

    let server_config = ServerConfig::from_env();
    let server_state = ServerState::new();
    let server_state_clone = server_state.clone();
    let port = server_config.metrics_port;
    let server_handle = tokio::spawn(async move {
        if let Err(e) = start_server(port, server_state_clone).await {
            error!("HTTP server error: {}", e);
        }
    });
    wait_for_server_ready(&server_state, &server_handle, &server_config).await?;

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;

    let platform_config =
        PlatformConfig::load(&client, &controller_config.controller_namespace).await?;
    info!(api_url = platform_config.api_url.as_str(), "Platform API configured");
    let platform = SysinvClient::new(platform_config).context("Failed to create platform client")?;

    let reconciler = Arc::new(Reconciler::new(
        Arc::new(KubeStore::new(client.clone())),
        Arc::new(platform),
        controller_config.clone(),
    ));

    info!("Controller initialized, starting watch loop...");
    Ok(InitializationResult {
        client,
        reconciler,
        server_state,
        controller_config,
    })
}

/// Wait for the HTTP server to become ready
async fn wait_for_server_ready(
    server_state: &Arc<ServerState>,
    server_handle: &tokio::task::JoinHandle<()>,
    server_config: &ServerConfig,
) -> Result<()> {
    let startup_timeout = server_config.startup_timeout();
    let poll_interval = server_config.poll_interval();
    let start_time = std::time::Instant::now();

    loop {
        if server_handle.is_finished() {
            return Err(anyhow::anyhow!("HTTP server failed to start"));
        }
        if server_state.ready() {
            info!("HTTP server is ready and accepting connections");
            return Ok(());
        }
        if start_time.elapsed() > startup_timeout {
            return Err(anyhow::anyhow!(
                "HTTP server failed to become ready within {} seconds",
                startup_timeout.as_secs()
            ));
        }
        tokio::time::sleep(poll_interval).await;
    }
}
