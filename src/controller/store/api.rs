//! # Kubernetes-backed Store
//!
//! Implementations of the store traits on top of `kube::Api`.

use super::{ResolveError, ResourceStore, StoreError, VmInventory, VmRecord, VolumeIdResolver};
use crate::crd::CnsNodeVmAttachment;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{PersistentVolume, PersistentVolumeClaim};
use k8s_openapi::NamespaceResourceScope;
use kube::api::{Api, ApiResource, DynamicObject, GroupVersionKind, ListParams, Patch, PatchParams, PostParams};
use kube::{Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use std::time::Duration;
use tracing::{debug, info};

/// `ResourceStore` for attachments and claims backed by the API server
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl std::fmt::Debug for KubeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeStore").finish_non_exhaustive()
    }
}

impl KubeStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

fn object_key<K: Resource>(resource: &K) -> String {
    format!(
        "{}/{}",
        resource.meta().namespace.as_deref().unwrap_or_default(),
        resource.meta().name.as_deref().unwrap_or_default()
    )
}

async fn get_namespaced<K>(client: &Client, namespace: &str, name: &str) -> Result<Option<K>, StoreError>
where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()> + Clone + DeserializeOwned + Debug,
{
    let api: Api<K> = Api::namespaced(client.clone(), namespace);
    match api.get(name).await {
        Ok(obj) => Ok(Some(obj)),
        Err(kube::Error::Api(api_err)) if api_err.code == 404 => Ok(None),
        Err(e) => Err(StoreError::from_kube(e, &format!("{namespace}/{name}"))),
    }
}

async fn replace_namespaced<K>(client: &Client, resource: &K) -> Result<K, StoreError>
where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
        + Clone
        + DeserializeOwned
        + Serialize
        + Debug,
{
    let key = object_key(resource);
    let api: Api<K> = Api::namespaced(
        client.clone(),
        resource.meta().namespace.as_deref().unwrap_or("default"),
    );
    api.replace(&resource.name_any(), &PostParams::default(), resource)
        .await
        .map_err(|e| StoreError::from_kube(e, &key))
}

#[async_trait]
impl ResourceStore<PersistentVolumeClaim> for KubeStore {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<PersistentVolumeClaim>, StoreError> {
        get_namespaced(&self.client, namespace, name).await
    }

    async fn replace(&self, claim: &PersistentVolumeClaim) -> Result<PersistentVolumeClaim, StoreError> {
        replace_namespaced(&self.client, claim).await
    }
}

#[async_trait]
impl ResourceStore<CnsNodeVmAttachment> for KubeStore {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<CnsNodeVmAttachment>, StoreError> {
        get_namespaced(&self.client, namespace, name).await
    }

    /// Write status and then metadata (finalizers)
    ///
    /// Status is a subresource, so the main replace ignores it. Status goes first
    /// so a failure between the two writes never leaves our finalizer stored
    /// without the `cnsVolumeID` detach needs. The status write carries the
    /// caller's resource version and the replace carries the one it returns,
    /// keeping the conflict check intact.
    async fn replace(&self, attachment: &CnsNodeVmAttachment) -> Result<CnsNodeVmAttachment, StoreError> {
        let key = attachment.key();
        let api: Api<CnsNodeVmAttachment> = Api::namespaced(
            self.client.clone(),
            attachment.metadata.namespace.as_deref().unwrap_or("default"),
        );

        let mut desired = attachment.clone();
        if let Some(patch) = status_patch(attachment) {
            let with_status = api
                .patch_status(&attachment.name_any(), &PatchParams::default(), &Patch::Merge(&patch))
                .await
                .map_err(|e| StoreError::from_kube(e, &key))?;
            desired.metadata.resource_version = with_status.metadata.resource_version;
        }

        let updated = replace_namespaced(&self.client, &desired).await?;
        debug!("Replaced {} (resourceVersion {:?})", key, updated.metadata.resource_version);
        Ok(updated)
    }
}

/// Merge patch writing the whole status at the caller's resource version
///
/// `None` when the record carries no status to write.
fn status_patch(attachment: &CnsNodeVmAttachment) -> Option<serde_json::Value> {
    let status = attachment.status.as_ref()?;
    // error is written explicitly so a cleared error actually clears
    Some(serde_json::json!({
        "metadata": { "resourceVersion": attachment.metadata.resource_version },
        "status": {
            "attached": status.attached,
            "metadata": status.attachment_metadata,
            "error": status.error,
        }
    }))
}

/// `VolumeIdResolver` that reads claims and persistent volumes from the API server
#[derive(Clone)]
pub struct KubeVolumeIdResolver {
    client: Client,
    poll_interval: Duration,
    poll_timeout: Duration,
}

impl std::fmt::Debug for KubeVolumeIdResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeVolumeIdResolver")
            .field("poll_interval", &self.poll_interval)
            .field("poll_timeout", &self.poll_timeout)
            .finish_non_exhaustive()
    }
}

impl KubeVolumeIdResolver {
    pub fn new(client: Client, poll_interval: Duration, poll_timeout: Duration) -> Self {
        Self {
            client,
            poll_interval,
            poll_timeout,
        }
    }
}

#[async_trait]
impl VolumeIdResolver for KubeVolumeIdResolver {
    async fn resolve_volume_id(&self, namespace: &str, claim: &str) -> Result<String, ResolveError> {
        let deadline = tokio::time::Instant::now() + self.poll_timeout;

        // A freshly created claim may not be bound yet; wait for the binder
        let volume_name = loop {
            let pvc: Option<PersistentVolumeClaim> =
                get_namespaced(&self.client, namespace, claim).await?;
            let pvc = pvc.ok_or_else(|| ResolveError::ClaimNotFound {
                namespace: namespace.to_string(),
                claim: claim.to_string(),
            })?;

            if let Some(name) = pvc
                .spec
                .as_ref()
                .and_then(|s| s.volume_name.clone())
                .filter(|n| !n.is_empty())
            {
                break name;
            }

            if tokio::time::Instant::now() + self.poll_interval > deadline {
                return Err(ResolveError::Unbound {
                    namespace: namespace.to_string(),
                    claim: claim.to_string(),
                    waited_secs: self.poll_timeout.as_secs(),
                });
            }
            info!(
                "pvc.Spec.VolumeName is empty in PVC: {:?} on namespace: {:?}. Retrying in {}s.",
                claim,
                namespace,
                self.poll_interval.as_secs()
            );
            tokio::time::sleep(self.poll_interval).await;
        };

        let api: Api<PersistentVolume> = Api::all(self.client.clone());
        let pv = match api.get(&volume_name).await {
            Ok(pv) => pv,
            Err(kube::Error::Api(api_err)) if api_err.code == 404 => {
                return Err(ResolveError::VolumeNotFound(volume_name));
            }
            Err(e) => return Err(StoreError::from_kube(e, &volume_name).into()),
        };

        pv.spec
            .and_then(|s| s.csi)
            .map(|csi| csi.volume_handle)
            .filter(|handle| !handle.is_empty())
            .ok_or(ResolveError::NotCsi(volume_name))
    }
}

/// vm-operator `VirtualMachine` lookup using dynamic objects
#[derive(Clone)]
pub struct KubeVmInventory {
    client: Client,
    resource: ApiResource,
}

impl std::fmt::Debug for KubeVmInventory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeVmInventory")
            .field("api_version", &self.resource.api_version)
            .field("kind", &self.resource.kind)
            .finish_non_exhaustive()
    }
}

impl KubeVmInventory {
    pub fn new(client: Client) -> Self {
        let gvk = GroupVersionKind::gvk("vmoperator.vmware.com", "v1alpha1", "VirtualMachine");
        Self {
            client,
            resource: ApiResource::from_gvk(&gvk),
        }
    }
}

#[async_trait]
impl VmInventory for KubeVmInventory {
    async fn find_by_bios_uuid(
        &self,
        namespace: &str,
        bios_uuid: &str,
    ) -> Result<Option<VmRecord>, StoreError> {
        let api: Api<DynamicObject> = Api::namespaced_with(self.client.clone(), namespace, &self.resource);
        let vms = api
            .list(&ListParams::default())
            .await
            .map_err(|e| StoreError::from_kube(e, &format!("{namespace}/virtualmachines")))?;

        let found = vms.items.into_iter().find(|vm| {
            vm.data
                .get("status")
                .and_then(|s| s.get("biosUUID"))
                .and_then(serde_json::Value::as_str)
                == Some(bios_uuid)
        });

        match found {
            Some(vm) => {
                info!("VM CR with BiosUUID: {} found in namespace: {}", bios_uuid, namespace);
                Ok(Some(VmRecord {
                    name: vm.name_any(),
                    being_deleted: vm.metadata.deletion_timestamp.is_some(),
                }))
            }
            None => {
                info!("VM CR with BiosUUID: {} not found in namespace: {}", bios_uuid, namespace);
                Ok(None)
            }
        }
    }
}
