//! # Attach
//!
//! Attach path for records that are not attached and not being deleted, plus the
//! upgrade check for records that already are.
//!
//! ## Ordering
//!
//! 1. Resolve the node VM
//! 2. Resolve the CNS volume ID (persisted value wins once our finalizer is on)
//! 3. Add our finalizer and `cnsVolumeID`, persist. This happens before the
//!    attach call so a crash mid-attach still leaves enough to detach later.
//! 4. Attach
//! 5. Protect the PVC
//! 6. Write the attach result to status
//!
//! A failed attach leaves finalizers in place and `attached=false`; the next pass
//! retries from step 1.

use super::types::{Reconciler, Requeue};
use crate::backend::FaultKind;
use crate::constants::{
    ATTRIBUTE_CNS_VOLUME_ID, ATTRIBUTE_FIRST_CLASS_DISK_UUID, CNS_FINALIZER, CNS_PVC_FINALIZER,
};
use crate::crd::CnsNodeVmAttachment;
use kube::ResourceExt;
use std::time::Duration;
use tracing::{debug, info};

pub(super) async fn attach(
    ctx: &Reconciler,
    attachment: &mut CnsNodeVmAttachment,
    delay: Duration,
) -> Result<(), Requeue> {
    let name = attachment.name_any();
    let namespace = attachment.namespace().unwrap_or_default();
    let node_uuid = attachment.spec.node_uuid.clone();
    let claim_name = attachment.spec.volume_name.clone();

    let vm = match ctx.backend.find_vm(&node_uuid).await {
        Ok(vm) => vm,
        Err(e) => {
            let status_msg = format!("Failed to find the VM with UUID: {node_uuid:?}");
            ctx.record_error(attachment, &status_msg).await;
            let msg = format!(
                "failed to find the VM with UUID: {node_uuid:?} for CnsNodeVmAttachment request with name: {name:?} on namespace: {namespace:?}. Err: {e}"
            );
            return Err(ctx.fail(attachment, delay, e.fault, msg).await);
        }
    };
    debug!("Resolved node VM {:?} for {}", vm, attachment.key());

    let persisted = attachment
        .has_finalizer(CNS_FINALIZER)
        .then(|| attachment.persisted_volume_id().map(str::to_string))
        .flatten();
    let volume_id = match persisted {
        Some(id) => {
            debug!("Using persisted CNS volume ID {} for {}", id, attachment.key());
            id
        }
        None => match ctx.volume_ids.resolve_volume_id(&namespace, &claim_name).await {
            Ok(id) => id,
            Err(e) => {
                ctx.record_error(attachment, &e.to_string()).await;
                let msg = format!(
                    "failed to get volumeID from volumeName: {claim_name:?} for CnsNodeVmAttachment request with name: {name:?} on namespace: {namespace:?}. Error: {e}"
                );
                return Err(ctx.fail(attachment, delay, FaultKind::ApiServerOperation, msg).await);
            }
        },
    };

    let added = ctx.attachments.add(attachment);
    let recorded = attachment.persisted_volume_id() == Some(volume_id.as_str());
    if added || !recorded {
        attachment
            .status_mut()
            .attachment_metadata
            .insert(ATTRIBUTE_CNS_VOLUME_ID.to_string(), volume_id.clone());
        if let Err(e) = ctx.attachments.persist(attachment).await {
            let msg = format!(
                "failed to update CnsNodeVmAttachment instance: {name:?} on namespace: {namespace:?}. Error: {e}"
            );
            return Err(ctx.fail(attachment, delay, FaultKind::ApiServerOperation, msg).await);
        }
    }

    info!(
        "Attaching volume {:?} to node VM {:?} for CnsNodeVmAttachment request with name: {:?} on namespace: {:?}",
        volume_id, node_uuid, name, namespace
    );
    let attached = ctx.backend.attach_volume(&vm, &volume_id).await;

    let claim = match ctx.claims.get(&namespace, &claim_name).await {
        Ok(Some(claim)) => claim,
        Ok(None) => {
            let msg = format!("PVC {claim_name:?} not found on namespace: {namespace:?}");
            return Err(ctx.fail(attachment, delay, FaultKind::ApiServerOperation, msg).await);
        }
        Err(e) => {
            let msg = format!("failed to get PVC with volumename: {claim_name:?} on namespace: {namespace:?}. Err: {e}");
            return Err(ctx.fail(attachment, delay, FaultKind::ApiServerOperation, msg).await);
        }
    };
    if let Err(e) = ctx.claims.ensure_present(&claim).await {
        ctx.record_error(attachment, &e.to_string()).await;
        let msg = format!(
            "failed to add {CNS_PVC_FINALIZER:?} finalizer on the PVC with volumename: {claim_name:?} on namespace: {namespace:?}. Err: {e}"
        );
        return Err(ctx.fail(attachment, delay, FaultKind::Internal, msg).await);
    }

    let status = attachment.status_mut();
    match &attached {
        Ok(disk_uuid) => {
            status
                .attachment_metadata
                .insert(ATTRIBUTE_FIRST_CLASS_DISK_UUID.to_string(), disk_uuid.clone());
            status.attached = true;
            status.error.clear();
        }
        Err(e) => status.error.clone_from(&e.message),
    }
    if let Err(e) = ctx.attachments.persist(attachment).await {
        let msg = format!(
            "failed to update attach status on CnsNodeVmAttachment instance: {name:?} on namespace: {namespace:?}. Error: {e}"
        );
        return Err(ctx.fail(attachment, delay, FaultKind::ApiServerOperation, msg).await);
    }

    if let Err(e) = attached {
        let msg = format!(
            "failed to attach cns volume: {volume_id:?} to node vm: {node_uuid:?} for CnsNodeVmAttachment request with name: {name:?} on namespace: {namespace:?}. fault: {}. Err: {e}",
            e.fault
        );
        return Err(ctx.fail(attachment, delay, e.fault, msg).await);
    }

    let msg = format!(
        "ReconcileCnsNodeVMAttachment: Successfully updated entry in CNS for instance with name {name:?} and namespace {namespace:?}."
    );
    ctx.report_success(attachment, &msg).await;
    ctx.backoff.clear(&attachment.key());
    Ok(())
}

/// Already attached: make sure the PVC carries our protection marker
///
/// Records attached before the marker existed pick it up here.
pub(super) async fn ensure_claim_protected(
    ctx: &Reconciler,
    attachment: &CnsNodeVmAttachment,
    delay: Duration,
) -> Result<(), Requeue> {
    let namespace = attachment.namespace().unwrap_or_default();
    let claim_name = &attachment.spec.volume_name;

    let claim = match ctx.claims.get(&namespace, claim_name).await {
        Ok(Some(claim)) => claim,
        Ok(None) => {
            let msg = format!("PVC {claim_name:?} not found on namespace: {namespace:?}");
            return Err(ctx.fail(attachment, delay, FaultKind::ApiServerOperation, msg).await);
        }
        Err(e) => {
            let msg = format!("failed to get PVC with volumename: {claim_name:?} on namespace: {namespace:?}. Err: {e}");
            return Err(ctx.fail(attachment, delay, FaultKind::ApiServerOperation, msg).await);
        }
    };

    if let Err(e) = ctx.claims.ensure_present(&claim).await {
        let msg = format!(
            "failed to add {CNS_PVC_FINALIZER:?} finalizer on the PVC with volumename: {claim_name:?} on namespace: {namespace:?}. Err: {e}"
        );
        return Err(ctx.fail(attachment, delay, FaultKind::Internal, msg).await);
    }

    debug!("{} is attached and its PVC is protected", attachment.key());
    ctx.backoff.clear(&attachment.key());
    Ok(())
}
