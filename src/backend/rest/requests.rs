//! # Request Types
//!
//! Request bodies sent to the volume manager.

use serde::Serialize;

/// Body for attach and detach calls
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeRequest {
    pub volume_id: String,
    pub datacenter: String,
}

impl VolumeRequest {
    pub fn new(volume_id: &str, datacenter: &str) -> Self {
        Self {
            volume_id: volume_id.to_string(),
            datacenter: datacenter.to_string(),
        }
    }
}
