//! # Store
//!
//! Seams between the reconciler and the Kubernetes API server.
//!
//! - [`ResourceStore`] - get / optimistic-concurrency replace for one resource type
//! - [`VolumeIdResolver`] - claim name to CNS volume ID
//! - [`VmInventory`] - vm-operator `VirtualMachine` lookup used to corroborate a
//!   missing VM before a detach is declared complete
//!
//! `api.rs` holds the implementations backed by a `kube::Client`.

mod api;

pub use api::{KubeStore, KubeVmInventory, KubeVolumeIdResolver};

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("conflict updating {0}: the object has been modified")]
    Conflict(String),
    #[error("Kubernetes API error: {0}")]
    Kube(#[source] kube::Error),
    #[error("{0}")]
    Other(String),
}

impl StoreError {
    /// Classify a kube error for the object identified by `key`
    pub fn from_kube(err: kube::Error, key: &str) -> Self {
        match err {
            kube::Error::Api(api_err) if api_err.code == 404 => Self::NotFound(key.to_string()),
            kube::Error::Api(api_err) if api_err.code == 409 => Self::Conflict(key.to_string()),
            other => Self::Kube(other),
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

/// Read/replace access to one namespaced resource type
#[async_trait]
pub trait ResourceStore<K>: Send + Sync {
    /// Fetch the current version; `Ok(None)` when it does not exist
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<K>, StoreError>;

    /// Replace the resource, failing with [`StoreError::Conflict`] when the
    /// resource version in `resource` is stale
    async fn replace(&self, resource: &K) -> Result<K, StoreError>;
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("PersistentVolumeClaim {namespace}/{claim} not found")]
    ClaimNotFound { namespace: String, claim: String },
    #[error("pvc.Spec.VolumeName is empty in PVC: {claim:?} on namespace: {namespace:?} even after waiting for {waited_secs}s")]
    Unbound {
        namespace: String,
        claim: String,
        waited_secs: u64,
    },
    #[error("PersistentVolume {0:?} not found")]
    VolumeNotFound(String),
    #[error("PersistentVolume {0:?} has no CSI volume handle")]
    NotCsi(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Resolves the CNS volume ID backing a claim
#[async_trait]
pub trait VolumeIdResolver: Send + Sync {
    async fn resolve_volume_id(&self, namespace: &str, claim: &str) -> Result<String, ResolveError>;
}

/// Workload-compute record for a node VM
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmRecord {
    pub name: String,
    pub being_deleted: bool,
}

/// Secondary inventory of node VMs kept by the VM operator
#[async_trait]
pub trait VmInventory: Send + Sync {
    /// Find the VirtualMachine in `namespace` whose BIOS UUID matches
    async fn find_by_bios_uuid(
        &self,
        namespace: &str,
        bios_uuid: &str,
    ) -> Result<Option<VmRecord>, StoreError>;
}
