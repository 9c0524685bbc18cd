//! # Watch Loop
//!
//! One kube-runtime controller per resource kind. All of them share the
//! reconciler context, so backoff counters and the platform session are
//! common, and a single timer drives the periodic resync of every kind.

use crate::config::ControllerConfig;
use crate::controller::reconciler::{reconcile, Reconciler, ReconcilerError};
use crate::controller::server::ServerState;
use crate::crd::{DeploymentResource, DeploymentState, ResourceKind};
use crate::observability::metrics;
use crate::runtime::error_policy::{handle_controller_error, handle_reconciliation_error};
use crate::with_kind;
use futures::channel::mpsc;
use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt};
use kube::api::{Api, ListParams};
use kube::Client;
use kube_runtime::controller::{self, Action};
use kube_runtime::{watcher, Controller};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn, Instrument};

/// Run the controllers until shutdown
///
/// # Errors
/// Currently never; the signature leaves room for fatal watch errors.
pub async fn run_watch_loop(
    client: Client,
    reconciler: Arc<Reconciler>,
    server_state: Arc<ServerState>,
    config: ControllerConfig,
) -> Result<(), anyhow::Error> {
    let shutdown_state = server_state.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal, initiating graceful shutdown...");
        }
        shutdown_state.set_ready(false);
        info!("Marked server as not ready, waiting for in-flight reconciliations to complete...");
    });

    let concurrency = u16::try_from(config.max_concurrent_reconciliations).unwrap_or(u16::MAX);
    let namespace = config.watch_namespace.clone();
    match &namespace {
        Some(ns) => info!(namespace = ns.as_str(), "Watching a single namespace"),
        None => info!("Watching all namespaces"),
    }
    loop {
        if !server_state.ready() {
            info!("Shutdown requested, exiting watch loop");
            break;
        }

        let mut senders = Vec::new();
        let mut controllers: Vec<BoxFuture<'static, ()>> = Vec::new();
        for kind in ResourceKind::ALL {
            let (tx, rx) = mpsc::channel(0);
            senders.push(tx);
            let client = client.clone();
            let reconciler = reconciler.clone();
            let namespace = namespace.clone();
            controllers.push(with_kind!(kind, K => {
                run_kind::<K>(client, namespace, reconciler, rx, concurrency).boxed()
            }));
        }
        let resync = tokio::spawn(resync_timer(
            client.clone(),
            namespace.clone(),
            senders,
            config.resync_interval(),
        ));

        info!(kinds = ResourceKind::ALL.len(), "Starting controllers");
        futures::future::join_all(controllers).await;
        resync.abort();

        if !server_state.ready() {
            info!("Shutdown requested, exiting watch loop");
            break;
        }
        let delay = config.watch_restart_delay_after_end();
        warn!(delay_secs = delay.as_secs(), "Controller streams ended, restarting");
        tokio::time::sleep(delay).await;
    }

    info!("Controller stopped gracefully");
    Ok(())
}

/// Namespaced when a watch namespace is configured, cluster-wide otherwise
fn watched_api<K: DeploymentResource>(client: Client, namespace: Option<&str>) -> Api<K> {
    match namespace {
        Some(ns) => Api::namespaced(client, ns),
        None => Api::all(client),
    }
}

async fn run_kind<K: DeploymentResource>(
    client: Client,
    namespace: Option<String>,
    reconciler: Arc<Reconciler>,
    resync: mpsc::Receiver<()>,
    concurrency: u16,
) {
    let api = watched_api::<K>(client, namespace.as_deref());
    let span = tracing::info_span!("controller.watch", resource.kind = K::KIND.as_str());
    Controller::new(api, watcher::Config::default().any_semantic())
        .with_config(controller::Config::default().concurrency(concurrency))
        .reconcile_all_on(resync)
        .shutdown_on_signal()
        .run(reconcile_object::<K>, handle_reconciliation_error::<K>, reconciler)
        .for_each(|result| async move {
            match result {
                Ok((obj, _)) => debug!(object = %obj, "watch.event.success"),
                Err(e) => handle_controller_error(K::KIND, &e),
            }
        })
        .instrument(span)
        .await;
}

async fn reconcile_object<K: DeploymentResource>(
    obj: Arc<K>,
    ctx: Arc<Reconciler>,
) -> Result<Action, ReconcilerError> {
    let key = obj.resource_key();
    reconcile(&ctx, &key).await.map(Action::from)
}

/// Trigger a resync of every kind each `interval` and refresh the state gauge
async fn resync_timer(
    client: Client,
    namespace: Option<String>,
    mut senders: Vec<mpsc::Sender<()>>,
    interval: std::time::Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    // The first tick completes immediately and the controllers already list on start
    ticker.tick().await;
    loop {
        ticker.tick().await;
        debug!("Periodic resync");
        for sender in &mut senders {
            // A full channel means the previous resync has not been picked up yet
            if let Err(e) = sender.try_send(()) {
                if e.is_disconnected() {
                    return;
                }
            }
        }
        for kind in ResourceKind::ALL {
            if let Err(e) = with_kind!(kind, K => refresh_state_gauge::<K>(&client, namespace.as_deref()).await) {
                warn!(kind = kind.as_str(), error = %e, "Failed to refresh resource gauge");
            }
        }
    }
}

async fn refresh_state_gauge<K: DeploymentResource>(
    client: &Client,
    namespace: Option<&str>,
) -> Result<(), kube::Error> {
    let list = watched_api::<K>(client.clone(), namespace)
        .list(&ListParams::default())
        .await?;
    let mut counts: BTreeMap<&'static str, i64> = [
        DeploymentState::Pending,
        DeploymentState::InProgress,
        DeploymentState::Ready,
        DeploymentState::Failed,
    ]
    .into_iter()
    .map(|state| (state.as_str(), 0))
    .collect();
    for item in &list.items {
        let state = item
            .resource_status()
            .map(|s| s.deployment_state)
            .unwrap_or_default();
        *counts.entry(state.as_str()).or_default() += 1;
    }
    for (state, count) in counts {
        metrics::set_resources(K::KIND.label(), state, count);
    }
    Ok(())
}
