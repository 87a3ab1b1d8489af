//! # CNS Attachment Controller
//!
//! A Kubernetes controller that attaches CNS volumes to node VMs on behalf of
//! `CnsNodeVmAttachment` resources and detaches them when the resources are deleted.
//!
//! ## Overview
//!
//! 1. **Attach** - resolves the node VM and the PVC's CNS volume ID, records the volume
//!    ID and a finalizer on the resource, attaches, protects the PVC with a finalizer
//! 2. **Detach** - on deletion, detaches (or confirms the VM is gone), then releases
//!    both finalizers so the resource and PVC can be deleted
//! 3. **Backoff** - failed passes are retried with a per-resource exponential delay
//!
//! ## Configuration
//!
//! - `WORKER_THREADS_NODEVM_ATTACH` - concurrent reconciles (1..=10, default 10)
//! - `VOLUME_MANAGER_ENDPOINT`, `VSPHERE_VCENTER_HOST`, `VSPHERE_DATACENTERS`
//! - `METRICS_PORT` - `/metrics`, `/healthz`, `/readyz` (default 5000)

use anyhow::Result;
use cns_attachment_controller::runtime::{initialization::initialize, watch_loop::run_watch_loop};

#[tokio::main]
async fn main() -> Result<()> {
    let init = initialize().await?;

    run_watch_loop(
        init.attachments,
        init.reconciler,
        init.server_state,
        &init.config,
    )
    .await
}
