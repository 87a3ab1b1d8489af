//! # Response Types
//!
//! Response bodies returned by the volume manager.

use serde::Deserialize;

/// VM lookup result
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VmResponse {
    /// Managed object reference value
    pub moref: String,
}

/// Attach result
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachResponse {
    pub disk_uuid: String,
}

/// Error body; both fields are optional so a bare proxy error still parses.
/// `fault` stays a string so an unknown fault name keeps the message.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    #[serde(default)]
    pub fault: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}
