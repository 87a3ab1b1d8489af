//! # Conflict Recovery
//!
//! Read-modify-write with one retry on an optimistic-concurrency conflict.
//!
//! The caller passes the object it wants written plus the delta that produced it.
//! On conflict the latest version is re-read and only the delta is applied to it,
//! so fields written concurrently by someone else survive.

use crate::controller::store::{ResourceStore, StoreError};
use kube::Resource;
use tracing::warn;

/// Replace `desired`, recovering from a single conflict by reapplying `delta`
/// on top of the latest stored version.
///
/// Returns [`StoreError::NotFound`] if the object vanished between the
/// conflict and the re-read.
pub async fn replace_with_conflict_retry<K, F>(
    store: &dyn ResourceStore<K>,
    desired: &K,
    delta: F,
) -> Result<K, StoreError>
where
    K: Resource + Send + Sync,
    F: Fn(&mut K) + Send,
{
    match store.replace(desired).await {
        Err(e) if e.is_conflict() => {
            let namespace = desired.meta().namespace.as_deref().unwrap_or_default();
            let name = desired.meta().name.as_deref().unwrap_or_default();
            let key = format!("{namespace}/{name}");
            warn!("Conflict updating {}, re-reading and retrying once", key);

            let mut latest = store
                .get(namespace, name)
                .await?
                .ok_or(StoreError::NotFound(key))?;
            delta(&mut latest);
            store.replace(&latest).await
        }
        other => other,
    }
}
