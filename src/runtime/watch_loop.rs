//! # Watch Loop
//!
//! Controller watch loop that monitors `CnsNodeVmAttachment` resources and triggers
//! reconciliation when changes are detected.

use crate::config::ControllerConfig;
use crate::controller::reconciler::{reconcile, Reconciler};
use crate::controller::server::ServerState;
use crate::crd::CnsNodeVmAttachment;
use crate::runtime::error_policy::{handle_reconciliation_error, handle_watch_stream_error};
use futures::StreamExt;
use kube::api::Api;
use kube_runtime::{controller, watcher, Controller};
use std::future::Future;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Run the controller watch loop
///
/// At most `max_worker_threads` records are reconciled at once; the controller
/// never runs two passes for the same record concurrently.
pub async fn run_watch_loop(
    attachments: Api<CnsNodeVmAttachment>,
    reconciler: Arc<Reconciler>,
    server_state: Arc<ServerState>,
    config: &ControllerConfig,
) -> Result<(), anyhow::Error> {
    let concurrency = u16::try_from(config.max_worker_threads).unwrap_or(u16::MAX);
    let restart_delay = config.watch_restart_delay_after_end_duration();
    info!("Starting controller watch loop with {} workers...", concurrency);

    // Mark not ready on SIGINT/SIGTERM so the loop below stops restarting the watch
    tokio::spawn(mark_not_ready_on(shutdown_signal(), server_state.clone()));

    loop {
        if !server_state.is_ready() {
            info!("Shutdown requested, exiting watch loop");
            break;
        }

        Controller::new(attachments.clone(), watcher::Config::default().any_semantic())
            .with_config(controller::Config::default().concurrency(concurrency))
            .shutdown_on_signal()
            .run(reconcile, handle_reconciliation_error, reconciler.clone())
            .filter_map(move |x| async move {
                match &x {
                    Ok((obj, _)) => {
                        debug!("watch.event.success {}/{}", obj.namespace.as_deref().unwrap_or_default(), obj.name);
                        Some(x)
                    }
                    Err(e) => {
                        let error_string = format!("{e:?}");
                        handle_watch_stream_error(&error_string, restart_delay)
                            .await
                            .map(|()| x)
                    }
                }
            })
            .for_each(|_| futures::future::ready(()))
            .await;

        // The signal task may still be running; let it land before deciding
        tokio::task::yield_now().await;
        if !server_state.is_ready() {
            info!("Shutdown requested, exiting watch loop");
            break;
        }

        warn!(
            "Controller watch stream ended, restarting in {} seconds...",
            restart_delay.as_secs()
        );
        tokio::time::sleep(restart_delay).await;
    }

    info!("Controller stopped gracefully");
    Ok(())
}

/// Resolves on SIGINT or SIGTERM, whichever comes first
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = terminate.recv() => {}
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler, only SIGINT will stop the controller: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

async fn mark_not_ready_on<F: Future<Output = ()>>(signal: F, server_state: Arc<ServerState>) {
    signal.await;
    info!("Received shutdown signal (SIGINT/SIGTERM), initiating graceful shutdown...");
    server_state.is_ready.store(false, Ordering::Relaxed);
    info!("Marked server as not ready, waiting for in-flight reconciliations to complete...");
}
