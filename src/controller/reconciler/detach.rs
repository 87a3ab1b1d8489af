//! # Detach
//!
//! Detach path for records with a deletion timestamp.
//!
//! The VM is only treated as gone when vCenter cannot find it *and* the VM operator
//! has no live `VirtualMachine` for the same BIOS UUID. A `VirtualMachine` that still
//! exists means the inventories disagree, so the pass is retried.

use super::types::{Reconciler, Requeue};
use crate::backend::FaultKind;
use crate::constants::CNS_PVC_FINALIZER;
use crate::crd::CnsNodeVmAttachment;
use k8s_openapi::api::core::v1::PersistentVolumeClaim;
use kube::ResourceExt;
use std::time::Duration;
use tracing::info;

pub(super) async fn detach(
    ctx: &Reconciler,
    attachment: &mut CnsNodeVmAttachment,
    delay: Duration,
) -> Result<(), Requeue> {
    let name = attachment.name_any();
    let namespace = attachment.namespace().unwrap_or_default();
    let node_uuid = attachment.spec.node_uuid.clone();
    let claim_name = attachment.spec.volume_name.clone();

    let claim = match ctx.claims.get(&namespace, &claim_name).await {
        Ok(claim) => {
            if claim.is_none() {
                info!(
                    "PVC {:?} on namespace {:?} already deleted, skipping its finalizer",
                    claim_name, namespace
                );
            }
            claim
        }
        Err(e) => {
            let msg = format!("failed to get PVC with volumename: {claim_name:?} on namespace: {namespace:?}. Err: {e}");
            return Err(ctx.fail(attachment, delay, FaultKind::ApiServerOperation, msg).await);
        }
    };

    let vm = match ctx.backend.find_vm(&node_uuid).await {
        Ok(vm) => Some(vm),
        Err(e) if e.is_vm_not_found() => {
            match ctx.vm_inventory.find_by_bios_uuid(&namespace, &node_uuid).await {
                Err(err) => {
                    let msg = format!(
                        "failed to list VirtualMachines on namespace: {namespace:?} while detaching from VM {node_uuid:?}. Err: {err}"
                    );
                    return Err(ctx.fail(attachment, delay, FaultKind::ApiServerOperation, msg).await);
                }
                Ok(Some(vm)) if !vm.being_deleted => {
                    let msg = format!(
                        "VM with UUID {node_uuid:?} not found in vCenter but VirtualMachine {:?} still exists on namespace: {namespace:?}; retrying",
                        vm.name
                    );
                    return Err(ctx.fail(attachment, delay, FaultKind::VmNotFound, msg).await);
                }
                Ok(_) => {
                    info!(
                        "VM {:?} is gone from vCenter and the VM operator, nothing to detach for {}",
                        node_uuid,
                        attachment.key()
                    );
                    None
                }
            }
        }
        Err(e) => {
            let msg = format!(
                "failed to find the VM on VC with UUID: {node_uuid:?} for CnsNodeVmAttachment request with name: {name:?} on namespace: {namespace:?}. Err: {e}"
            );
            return Err(ctx.fail(attachment, delay, FaultKind::FindVmByUuid, msg).await);
        }
    };

    if let Some(vm) = vm {
        let Some(volume_id) = attachment.persisted_volume_id().map(str::to_string) else {
            let metadata = attachment
                .status
                .as_ref()
                .map(|s| s.attachment_metadata.clone())
                .unwrap_or_default();
            let msg = format!("CnsNodeVmAttachment does not have CNS volume ID. AttachmentMetadata: {metadata:?}");
            ctx.record_error(attachment, &msg).await;
            return Err(ctx.fail(attachment, delay, FaultKind::Internal, msg).await);
        };

        info!(
            "Detaching volume {:?} from node VM {:?} for CnsNodeVmAttachment request with name: {:?} on namespace: {:?}",
            volume_id, node_uuid, name, namespace
        );
        match ctx.backend.detach_volume(&vm, &volume_id).await {
            Ok(()) => {}
            Err(e) if e.is_managed_object_not_found() => {
                info!("Found a managed object not found fault for vm: {:?}", vm);
            }
            Err(e) => {
                attachment.status_mut().error.clone_from(&e.message);
                if let Err(store_err) = ctx.attachments.persist(attachment).await {
                    let msg = format!(
                        "failed to update detach status on CnsNodeVmAttachment instance: {name:?} on namespace: {namespace:?}. Error: {store_err}"
                    );
                    return Err(ctx.fail(attachment, delay, FaultKind::ApiServerOperation, msg).await);
                }
                let msg = format!(
                    "failed to detach disk: {volume_id:?} from nodevm: {node_uuid:?} for CnsNodeVmAttachment request with name: {name:?} on namespace: {namespace:?}. Err: {e}"
                );
                return Err(ctx.fail(attachment, delay, e.fault, msg).await);
            }
        }
    }

    release(ctx, attachment, claim.as_ref(), delay).await
}

/// Drop both protection markers so the store can finish deleting the record
async fn release(
    ctx: &Reconciler,
    attachment: &mut CnsNodeVmAttachment,
    claim: Option<&PersistentVolumeClaim>,
    delay: Duration,
) -> Result<(), Requeue> {
    let name = attachment.name_any();
    let namespace = attachment.namespace().unwrap_or_default();

    if let Some(claim) = claim {
        if let Err(e) = ctx.claims.ensure_absent(claim).await {
            let msg = format!(
                "failed to remove {CNS_PVC_FINALIZER:?} finalizer on the PVC with volumename: {:?} on namespace: {namespace:?}. Err: {e}",
                attachment.spec.volume_name
            );
            return Err(ctx.fail(attachment, delay, FaultKind::Internal, msg).await);
        }
    }

    attachment.status_mut().error.clear();
    if let Err(e) = ctx.attachments.ensure_absent(attachment).await {
        let msg = format!(
            "failed to update detach status on CnsNodeVmAttachment instance: {name:?} on namespace: {namespace:?}. Error: {e}"
        );
        return Err(ctx.fail(attachment, delay, FaultKind::ApiServerOperation, msg).await);
    }

    let msg = format!(
        "ReconcileCnsNodeVMAttachment: Successfully updated entry in CNS for instance with name {name:?} and namespace {namespace:?}."
    );
    ctx.report_success(attachment, &msg).await;
    ctx.backoff.clear(&attachment.key());
    Ok(())
}
