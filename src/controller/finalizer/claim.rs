use super::{add_finalizer, has_finalizer, remove_finalizer};
use crate::constants::CNS_PVC_FINALIZER;
use crate::controller::conflict::replace_with_conflict_retry;
use crate::controller::store::{ResourceStore, StoreError};
use k8s_openapi::api::core::v1::PersistentVolumeClaim;
use kube::ResourceExt;
use std::sync::Arc;
use tracing::{debug, info};

/// Adds and removes the CNS protection marker on a PersistentVolumeClaim
#[derive(Clone)]
pub struct ClaimFinalizers {
    store: Arc<dyn ResourceStore<PersistentVolumeClaim>>,
}

impl std::fmt::Debug for ClaimFinalizers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClaimFinalizers").finish_non_exhaustive()
    }
}

impl ClaimFinalizers {
    pub fn new(store: Arc<dyn ResourceStore<PersistentVolumeClaim>>) -> Self {
        Self { store }
    }

    pub async fn get(&self, namespace: &str, name: &str) -> Result<Option<PersistentVolumeClaim>, StoreError> {
        self.store.get(namespace, name).await
    }

    /// Ensure the marker is on `claim`; no write when it already is
    pub async fn ensure_present(&self, claim: &PersistentVolumeClaim) -> Result<(), StoreError> {
        if has_finalizer(&claim.metadata, CNS_PVC_FINALIZER) {
            debug!(
                "Finalizer {:?} already present on PVC {}/{}",
                CNS_PVC_FINALIZER,
                claim.namespace().unwrap_or_default(),
                claim.name_any()
            );
            return Ok(());
        }

        let mut desired = claim.clone();
        add_finalizer(&mut desired.metadata, CNS_PVC_FINALIZER);
        replace_with_conflict_retry(self.store.as_ref(), &desired, |latest: &mut PersistentVolumeClaim| {
            add_finalizer(&mut latest.metadata, CNS_PVC_FINALIZER);
        })
        .await?;

        info!(
            "Added finalizer {:?} to PVC {}/{}",
            CNS_PVC_FINALIZER,
            claim.namespace().unwrap_or_default(),
            claim.name_any()
        );
        Ok(())
    }

    /// Ensure the marker is gone from `claim`
    ///
    /// A claim deleted while the update is in flight counts as success.
    pub async fn ensure_absent(&self, claim: &PersistentVolumeClaim) -> Result<(), StoreError> {
        if !has_finalizer(&claim.metadata, CNS_PVC_FINALIZER) {
            return Ok(());
        }

        let mut desired = claim.clone();
        remove_finalizer(&mut desired.metadata, CNS_PVC_FINALIZER);
        match replace_with_conflict_retry(self.store.as_ref(), &desired, |latest: &mut PersistentVolumeClaim| {
            remove_finalizer(&mut latest.metadata, CNS_PVC_FINALIZER);
        })
        .await
        {
            Ok(_) => {
                info!(
                    "Removed finalizer {:?} from PVC {}/{}",
                    CNS_PVC_FINALIZER,
                    claim.namespace().unwrap_or_default(),
                    claim.name_any()
                );
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                debug!("PVC {} disappeared while removing finalizer", claim.name_any());
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}
