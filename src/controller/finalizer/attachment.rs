use super::{add_finalizer, has_finalizer, remove_finalizer};
use crate::constants::CNS_FINALIZER;
use crate::controller::conflict::replace_with_conflict_retry;
use crate::controller::store::{ResourceStore, StoreError};
use crate::crd::CnsNodeVmAttachment;
use std::sync::Arc;
use tracing::debug;

/// Owns writes to `CnsNodeVmAttachment` records
///
/// The reconciler only ever writes its own finalizer and the status, so a conflict is
/// resolved by reapplying our marker's presence and the status onto the latest
/// version and writing once more. Other finalizers on the latest version are kept.
#[derive(Clone)]
pub struct AttachmentFinalizers {
    store: Arc<dyn ResourceStore<CnsNodeVmAttachment>>,
}

impl std::fmt::Debug for AttachmentFinalizers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttachmentFinalizers").finish_non_exhaustive()
    }
}

impl AttachmentFinalizers {
    pub fn new(store: Arc<dyn ResourceStore<CnsNodeVmAttachment>>) -> Self {
        Self { store }
    }

    pub async fn get(&self, namespace: &str, name: &str) -> Result<Option<CnsNodeVmAttachment>, StoreError> {
        self.store.get(namespace, name).await
    }

    /// Add the marker locally; returns whether it was missing.
    /// The change is written by the next [`persist`](Self::persist).
    pub fn add(&self, attachment: &mut CnsNodeVmAttachment) -> bool {
        add_finalizer(&mut attachment.metadata, CNS_FINALIZER)
    }

    /// Remove the marker locally; returns whether it was present
    pub fn remove(&self, attachment: &mut CnsNodeVmAttachment) -> bool {
        remove_finalizer(&mut attachment.metadata, CNS_FINALIZER)
    }

    /// Ensure the marker is stored on the record; no write when already present
    pub async fn ensure_present(&self, attachment: &mut CnsNodeVmAttachment) -> Result<(), StoreError> {
        if self.add(attachment) {
            self.persist(attachment).await?;
        }
        Ok(())
    }

    /// Ensure the marker is removed from the stored record
    ///
    /// Once the last finalizer is gone on a deleting record the store deletes it.
    pub async fn ensure_absent(&self, attachment: &mut CnsNodeVmAttachment) -> Result<(), StoreError> {
        if self.remove(attachment) {
            self.persist(attachment).await?;
        }
        Ok(())
    }

    /// Write finalizers and status, refreshing `attachment` with the stored result
    pub async fn persist(&self, attachment: &mut CnsNodeVmAttachment) -> Result<(), StoreError> {
        let keep_marker = has_finalizer(&attachment.metadata, CNS_FINALIZER);
        let status = attachment.status.clone();

        let stored = replace_with_conflict_retry(self.store.as_ref(), attachment, |latest: &mut CnsNodeVmAttachment| {
            if keep_marker {
                add_finalizer(&mut latest.metadata, CNS_FINALIZER);
            } else {
                remove_finalizer(&mut latest.metadata, CNS_FINALIZER);
            }
            latest.status.clone_from(&status);
        })
        .await?;

        debug!(
            "Persisted {} (resourceVersion {:?})",
            attachment.key(),
            stored.metadata.resource_version
        );
        *attachment = stored;
        Ok(())
    }
}
