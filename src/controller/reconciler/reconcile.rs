//! # Reconciliation Entry
//!
//! One pass over one `CnsNodeVmAttachment`: fetch the latest record, read its
//! backoff, derive its state and run the matching sequence.

use super::attach::{attach, ensure_claim_protected};
use super::detach::detach;
use super::state::AttachmentState;
use super::types::{PassOutcome, Reconciler, ReconcilerError};
use crate::crd::CnsNodeVmAttachment;
use crate::observability::metrics;
use kube::ResourceExt;
use kube_runtime::controller::Action;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, Instrument};

/// Controller entry point
///
/// Handled failures come back as `Ok(Action::requeue(..))`; only a failed read of
/// the record itself is surfaced to the error policy.
pub async fn reconcile(
    attachment: Arc<CnsNodeVmAttachment>,
    ctx: Arc<Reconciler>,
) -> Result<Action, ReconcilerError> {
    let namespace = attachment.namespace().unwrap_or_default();
    let name = attachment.name_any();

    match reconcile_attachment(&ctx, &namespace, &name).await? {
        PassOutcome::Done => Ok(Action::await_change()),
        PassOutcome::Requeue(requeue) => {
            let next_trigger_time = chrono::Utc::now()
                + chrono::Duration::from_std(requeue.after).unwrap_or_else(|_| chrono::Duration::zero());
            info!(
                "📅 Next retry for {}/{} scheduled: {} (in {:?}, fault: {})",
                namespace,
                name,
                next_trigger_time.to_rfc3339(),
                requeue.after,
                requeue.fault
            );
            metrics::increment_requeues_total(requeue.fault.as_str());
            Ok(Action::requeue(requeue.after))
        }
    }
}

/// Run one pass for the record `namespace/name`
pub async fn reconcile_attachment(
    ctx: &Reconciler,
    namespace: &str,
    name: &str,
) -> Result<PassOutcome, ReconcilerError> {
    let span = tracing::span!(
        tracing::Level::INFO,
        "reconcile",
        resource.name = name,
        resource.namespace = namespace,
        resource.kind = "CnsNodeVmAttachment"
    );
    run_pass(ctx, namespace, name).instrument(span).await
}

async fn run_pass(
    ctx: &Reconciler,
    namespace: &str,
    name: &str,
) -> Result<PassOutcome, ReconcilerError> {
    let start = Instant::now();
    metrics::increment_reconciliations();
    let key = format!("{namespace}/{name}");

    // Always work from the stored version, never the watch cache copy
    let mut attachment = match ctx.attachments.get(namespace, name).await {
        Ok(Some(attachment)) => attachment,
        Ok(None) => {
            info!("CnsNodeVmAttachment {} not found, ignoring since object must be deleted", key);
            ctx.backoff.clear(&key);
            return Ok(PassOutcome::Done);
        }
        Err(source) => return Err(ReconcilerError::ReadAttachment { key, source }),
    };

    let delay = ctx.backoff.get_or_init(&key);
    let state = AttachmentState::of(&attachment);
    info!(
        "🔄 Reconciling CnsNodeVmAttachment {} (state: {:?}, node: {:?}, volume: {:?}, backoff: {:?})",
        key, state, attachment.spec.node_uuid, attachment.spec.volume_name, delay
    );

    let result = match state {
        AttachmentState::Stable => ensure_claim_protected(ctx, &attachment, delay).await,
        AttachmentState::AttachPending => attach(ctx, &mut attachment, delay).await,
        AttachmentState::DetachPending => detach(ctx, &mut attachment, delay).await,
    };

    let outcome = PassOutcome::from(result);
    metrics::observe_control_op(state.op_type(), outcome.fault(), start.elapsed().as_secs_f64());
    Ok(outcome)
}
