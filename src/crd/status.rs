//! # CnsNodeVmAttachment Status
//!
//! Status is owned exclusively by the reconciler.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Status of the CnsNodeVmAttachment resource
#[derive(Debug, Clone, Deserialize, Serialize, Default, JsonSchema, PartialEq, Eq)]
pub struct CnsNodeVmAttachmentStatus {
    /// Whether the volume is currently attached to the node VM
    #[serde(default)]
    pub attached: bool,
    /// Attachment metadata
    /// `cnsVolumeID` is stored before the first attach call so a later detach never
    /// depends on the PVC still existing; `diskUUID` is added once attached.
    #[serde(default, rename = "metadata", skip_serializing_if = "BTreeMap::is_empty")]
    pub attachment_metadata: BTreeMap<String, String>,
    /// Last attach/detach error; empty when healthy
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
}
