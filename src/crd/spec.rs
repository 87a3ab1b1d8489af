//! # CnsNodeVmAttachment Spec
//!
//! The declarative "volume X should be attached to node VM Y" record.

use super::status::CnsNodeVmAttachmentStatus;
use crate::constants::ATTRIBUTE_CNS_VOLUME_ID;
use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// CnsNodeVmAttachment Custom Resource Definition
///
/// Created by the guest cluster CSI driver when a workload needs a supervisor
/// PVC attached to one of its node VMs. The spec is immutable after creation.
///
/// # Example
///
/// ```yaml
/// apiVersion: cns.vmware.com/v1alpha1
/// kind: CnsNodeVmAttachment
/// metadata:
///   name: att-1
///   namespace: workload-ns
/// spec:
///   nodeuuid: 4205d5a4-3b1e-4c2c-9d3b-0f6b1e2a7c11
///   volumename: pvc-1
/// ```
#[derive(CustomResource, Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[kube(
    kind = "CnsNodeVmAttachment",
    group = "cns.vmware.com",
    version = "v1alpha1",
    namespaced,
    status = "CnsNodeVmAttachmentStatus",
    shortname = "cnsnva",
    printcolumn = r#"{"name":"Attached", "type":"boolean", "jsonPath":".status.attached"}"#,
    printcolumn = r#"{"name":"Node", "type":"string", "jsonPath":".spec.nodeuuid"}"#
)]
pub struct CnsNodeVmAttachmentSpec {
    /// BIOS UUID of the node VM the volume should be attached to
    #[serde(rename = "nodeuuid")]
    pub node_uuid: String,
    /// Name of the PersistentVolumeClaim (same namespace) whose volume is attached
    #[serde(rename = "volumename")]
    pub volume_name: String,
}

impl CnsNodeVmAttachment {
    /// `namespace/name`, used for backoff bookkeeping and log fields
    #[must_use]
    pub fn key(&self) -> String {
        format!(
            "{}/{}",
            self.namespace().unwrap_or_default(),
            self.name_any()
        )
    }

    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.status.as_ref().is_some_and(|s| s.attached)
    }

    /// True once the store has set a deletion timestamp
    #[must_use]
    pub fn is_being_deleted(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
    }

    #[must_use]
    pub fn has_finalizer(&self, finalizer: &str) -> bool {
        self.finalizers().iter().any(|f| f == finalizer)
    }

    /// CNS volume ID persisted before the first attach attempt
    #[must_use]
    pub fn persisted_volume_id(&self) -> Option<&str> {
        self.status
            .as_ref()
            .and_then(|s| s.attachment_metadata.get(ATTRIBUTE_CNS_VOLUME_ID))
            .map(String::as_str)
            .filter(|id| !id.is_empty())
    }

    /// Mutable status, created empty on first use
    pub fn status_mut(&mut self) -> &mut CnsNodeVmAttachmentStatus {
        self.status.get_or_insert_with(Default::default)
    }
}
