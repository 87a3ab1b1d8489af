//! # Initialization
//!
//! Controller initialization logic including rustls setup, tracing, metrics,
//! server startup, Kubernetes client setup and reconciler wiring.

use crate::backend::RestVolumeBackend;
use crate::config::ControllerConfig;
use crate::constants::{DEFAULT_SERVER_POLL_INTERVAL_MS, DEFAULT_SERVER_STARTUP_TIMEOUT_SECS};
use crate::controller::backoff::BackoffRegistry;
use crate::controller::events::KubeEventSink;
use crate::controller::finalizer::{AttachmentFinalizers, ClaimFinalizers};
use crate::controller::reconciler::Reconciler;
use crate::controller::server::{start_server, ServerState};
use crate::controller::store::{KubeStore, KubeVmInventory, KubeVolumeIdResolver};
use crate::crd::CnsNodeVmAttachment;
use crate::observability;
use anyhow::{Context, Result};
use kube::{api::Api, Client};
use std::sync::Arc;
use tracing::{error, info};

/// Initialization result containing all necessary components for the controller
pub struct InitializationResult {
    /// API for `CnsNodeVmAttachment`, all namespaces
    pub attachments: Api<CnsNodeVmAttachment>,
    /// Reconciler context
    pub reconciler: Arc<Reconciler>,
    /// Server state for health checks
    pub server_state: Arc<ServerState>,
    pub config: ControllerConfig,
}

impl std::fmt::Debug for InitializationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitializationResult")
            .field("server_ready", &self.server_state.is_ready())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn init_tracing(log_format: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "cns_attachment_controller=info".into());

    let result = if log_format.eq_ignore_ascii_case("json") {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .try_init()
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).try_init()
    };
    if let Err(e) = result {
        eprintln!("Tracing subscriber already initialized: {e}");
    }
}

/// Initialize the controller runtime
///
/// This function handles:
/// - rustls crypto provider setup
/// - Tracing subscriber setup
/// - Metrics registration
/// - HTTP server startup
/// - Kubernetes client creation
/// - Reconciler setup
pub async fn initialize() -> Result<InitializationResult> {
    // Must happen before anything opens a TLS connection
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        return Err(anyhow::anyhow!("Failed to install rustls crypto provider"));
    }

    // Tracing first so configuration fallbacks are logged
    init_tracing(&std::env::var("LOG_FORMAT").unwrap_or_else(|_| "json".to_string()));
    let config = ControllerConfig::from_env();

    info!("Starting CnsNodeVmAttachment controller");
    info!(
        "Build info: datetime={}, git_hash={}",
        env!("BUILD_DATETIME"),
        env!("BUILD_GIT_HASH")
    );
    info!("Configuration: {:?}", config);

    observability::metrics::register_metrics()?;

    let server_state = Arc::new(ServerState::default());
    let server_state_clone = server_state.clone();
    let server_port = config.metrics_port;
    let server_handle = tokio::spawn(async move {
        if let Err(e) = start_server(server_port, server_state_clone).await {
            error!("HTTP server error: {}", e);
        }
    });
    wait_for_server_ready(&server_state, &server_handle).await?;

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;
    let attachments: Api<CnsNodeVmAttachment> = Api::all(client.clone());

    let backend = RestVolumeBackend::new(
        &config.volume_manager_endpoint,
        &config.vcenter_host,
        config.datacenters.clone(),
    )
    .context("Failed to create volume manager client")?;

    let store = Arc::new(KubeStore::new(client.clone()));
    let reconciler = Arc::new(Reconciler {
        attachments: AttachmentFinalizers::new(store.clone()),
        claims: ClaimFinalizers::new(store),
        volume_ids: Arc::new(KubeVolumeIdResolver::new(
            client.clone(),
            config.volume_id_poll_interval(),
            config.volume_id_poll_timeout(),
        )),
        vm_inventory: Arc::new(KubeVmInventory::new(client.clone())),
        backend: Arc::new(backend),
        events: Arc::new(KubeEventSink::new(client)),
        backoff: BackoffRegistry::new(config.backoff_floor(), config.backoff_max()),
    });

    info!("Controller initialized, starting watch loop...");

    Ok(InitializationResult {
        attachments,
        reconciler,
        server_state,
        config,
    })
}

/// Wait for the HTTP server to become ready
async fn wait_for_server_ready(
    server_state: &Arc<ServerState>,
    server_handle: &tokio::task::JoinHandle<()>,
) -> Result<()> {
    let startup_timeout = std::time::Duration::from_secs(DEFAULT_SERVER_STARTUP_TIMEOUT_SECS);
    let poll_interval = std::time::Duration::from_millis(DEFAULT_SERVER_POLL_INTERVAL_MS);
    let start_time = std::time::Instant::now();

    loop {
        if server_handle.is_finished() {
            return Err(anyhow::anyhow!("HTTP server failed to start"));
        }

        if server_state.is_ready() {
            info!("HTTP server is ready and accepting connections");
            break;
        }

        if start_time.elapsed() > startup_timeout {
            return Err(anyhow::anyhow!(
                "HTTP server failed to become ready within {} seconds",
                startup_timeout.as_secs()
            ));
        }

        tokio::time::sleep(poll_interval).await;
    }

    Ok(())
}
