//! # Volume Backend
//!
//! Abstract interface for the virtualization layer that performs CNS volume
//! attach/detach against node VMs.
//!
//! The reconciler only talks to this trait. `RestVolumeBackend` is the
//! production implementation; tests supply in-memory fakes.

mod fault;
pub mod rest;

pub use fault::FaultKind;
pub use rest::RestVolumeBackend;

use async_trait::async_trait;
use thiserror::Error;

/// A node VM resolved in vCenter inventory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeVm {
    /// BIOS UUID the VM was looked up by
    pub uuid: String,
    /// Managed object reference value (e.g. `vm-1042`)
    pub moref: String,
    /// Datacenter the VM was found in
    pub datacenter: String,
    /// vCenter host serving the datacenter
    pub vcenter_host: String,
}

/// Error returned by backend operations, classified by fault kind
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct BackendError {
    pub fault: FaultKind,
    pub message: String,
}

impl BackendError {
    pub fn new(fault: FaultKind, message: impl Into<String>) -> Self {
        Self {
            fault,
            message: message.into(),
        }
    }

    /// The VM could not be found by UUID
    #[must_use]
    pub fn is_vm_not_found(&self) -> bool {
        self.fault == FaultKind::VmNotFound
    }

    /// The VM managed object referenced by a detach no longer exists
    #[must_use]
    pub fn is_managed_object_not_found(&self) -> bool {
        self.fault == FaultKind::ManagedObjectNotFound
    }
}

/// Backend trait for CNS volume attachment
#[async_trait]
pub trait VolumeBackend: Send + Sync {
    /// Look up a node VM by BIOS UUID
    ///
    /// Returns a `VmNotFound` fault when the VM is absent from inventory.
    async fn find_vm(&self, node_uuid: &str) -> Result<NodeVm, BackendError>;

    /// Attach a CNS volume to the VM and return the disk UUID
    ///
    /// Attaching a volume that is already attached to the same VM succeeds.
    async fn attach_volume(&self, vm: &NodeVm, volume_id: &str) -> Result<String, BackendError>;

    /// Detach a CNS volume from the VM
    async fn detach_volume(&self, vm: &NodeVm, volume_id: &str) -> Result<(), BackendError>;
}
