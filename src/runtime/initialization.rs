//! # Initialization
//!
//! Controller bootstrap: rustls setup, configuration, tracing, metrics,
//! HTTP server startup and the Kubernetes client.

use crate::config::ControllerConfig;
use crate::controller::reconciler::Reconciler;
use crate::controller::server::{start_server, ServerState};
use crate::crd::Certificate;
use crate::observability;
use crate::store::KubeStore;
use anyhow::{Context, Result};
use k8s_openapi::api::core::v1::Secret;
use kube::{api::Api, Client};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info};

/// Everything the watch loop needs
pub struct InitializationResult {
    /// Kubernetes client
    pub client: Client,
    /// Watched Certificates, cluster-wide or in `WATCH_NAMESPACE`
    pub certificates: Api<Certificate>,
    /// Secrets owned by Certificates, same scope as `certificates`
    pub secrets: Api<Secret>,
    /// Reconciler context
    pub reconciler: Arc<Reconciler>,
    /// Server state for health checks
    pub server_state: Arc<ServerState>,
}

impl std::fmt::Debug for InitializationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitializationResult")
            .field("server_ready", &self.server_state.ready())
            .field("reconciler", &self.reconciler)
            .finish_non_exhaustive()
    }
}

/// Initialize the controller runtime
///
/// Order matters: the crypto provider must be installed before any TLS
/// connection is made, and the HTTP server must be serving before the
/// controller starts so readiness probes reflect the real state.
pub async fn initialize() -> Result<InitializationResult> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    let config = ControllerConfig::from_env();
    observability::logging::init_tracing(&config)?;

    info!("Starting Certificate Controller");
    info!(
        "Build info: timestamp={}, datetime={}, git_hash={}",
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_DATETIME"),
        env!("BUILD_GIT_HASH")
    );
    info!("Configuration: {:?}", config);

    observability::metrics::register_metrics()?;

    let server_state = Arc::new(ServerState::default());
    let server_state_clone = Arc::clone(&server_state);
    let server_port = config.metrics_port;
    let server_handle = tokio::spawn(async move {
        if let Err(e) = start_server(server_port, server_state_clone).await {
            error!("HTTP server error: {}", e);
        }
    });

    wait_for_server_ready(
        &server_state,
        &server_handle,
        config.server_startup_timeout(),
        config.server_poll_interval(),
    )
    .await?;

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;

    let (certificates, secrets) = match config.watch_namespace.as_deref() {
        Some(namespace) => {
            info!("Watching Certificates in namespace {}", namespace);
            (
                Api::namespaced(client.clone(), namespace),
                Api::namespaced(client.clone(), namespace),
            )
        }
        None => {
            info!("Watching Certificates in all namespaces");
            (Api::all(client.clone()), Api::all(client.clone()))
        }
    };

    let store = Arc::new(KubeStore::new(client.clone()));
    let reconciler = Arc::new(Reconciler::new(store, config));

    info!("Controller initialized, starting watch loop...");

    Ok(InitializationResult {
        client,
        certificates,
        secrets,
        reconciler,
        server_state,
    })
}

/// Wait for the HTTP server to bind, failing if it crashes or takes too long
async fn wait_for_server_ready(
    server_state: &ServerState,
    server_handle: &tokio::task::JoinHandle<()>,
    startup_timeout: Duration,
    poll_interval: Duration,
) -> Result<()> {
    let start_time = Instant::now();

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
