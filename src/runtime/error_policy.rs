//! # Error Policy
//!
//! Error handling for the controller watch loop.
//!
//! Handled attach/detach failures never reach this module; the reconciler turns them
//! into requeues itself. What lands here is a failure to read the record.

use crate::controller::reconciler::{Reconciler, ReconcilerError};
use crate::crd::CnsNodeVmAttachment;
use crate::observability;
use kube_runtime::controller::Action;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Requeue after the record's current backoff, then double it for next time
pub fn handle_reconciliation_error(
    obj: Arc<CnsNodeVmAttachment>,
    error: &ReconcilerError,
    ctx: Arc<Reconciler>,
) -> Action {
    let key = obj.key();
    let error_span = tracing::span!(
        tracing::Level::ERROR,
        "controller.watch.reconciliation_error",
        resource.key = key.as_str(),
        error = %error
    );
    let _error_guard = error_span.enter();

    error!("Reconciliation error for {}: {:?}", error.key(), error);
    observability::metrics::increment_reconciliation_errors();

    let delay = ctx.backoff.get_or_init(&key);
    ctx.backoff.double(&key);

    let next_trigger_time = chrono::Utc::now()
        + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());
    info!("🔄 Retrying {} in {:?} (trigger source: error-backoff)", key, delay);
    info!(
        "📅 Next retry scheduled: {} (in {}s)",
        next_trigger_time.to_rfc3339(),
        delay.as_secs()
    );
    observability::metrics::increment_requeues_total("error-backoff");
    Action::requeue(delay)
}

/// Classify a watch stream error
///
/// Returns `None` to filter out the error (allow restart) or `Some(())` to continue.
pub async fn handle_watch_stream_error(error_string: &str, restart_delay: std::time::Duration) -> Option<()> {
    let error_span = tracing::span!(
        tracing::Level::WARN,
        "controller.watch.error",
        error = %error_string
    );
    let _error_guard = error_span.enter();

    let is_not_found = error_string.contains("ObjectNotFound")
        || error_string.contains("404")
        || error_string.contains("not found");
    let is_410 = error_string.contains("410")
        || error_string.contains("too old resource version")
        || error_string.contains("Expired")
        || error_string.contains("Gone");

    if is_410 {
        warn!("Watch resource version expired (410) - this is normal during pod restarts, watch will restart");
        None
    } else if is_not_found {
        warn!(
            "CnsNodeVmAttachment not found (404) - normal for deleted records, or the CRD is missing. Error: {}",
            error_string
        );
        Some(())
    } else {
        error!("Controller stream error: {}", error_string);
        tokio::time::sleep(restart_delay).await;
        None
    }
}
