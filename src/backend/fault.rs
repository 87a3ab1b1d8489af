//! # Fault Kinds
//!
//! Closed classification of attach/detach failures. Surfaced on metrics so
//! failures can be told apart without parsing error strings.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FaultKind {
    Internal,
    ApiServerOperation,
    DatacenterNotFound,
    VcenterNotFound,
    VmNotFound,
    FindVmByUuid,
    ManagedObjectNotFound,
}

impl FaultKind {
    /// Label value used on metrics and in logs
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            FaultKind::Internal => "internal",
            FaultKind::ApiServerOperation => "api-server-operation",
            FaultKind::DatacenterNotFound => "datacenter-not-found",
            FaultKind::VcenterNotFound => "vcenter-not-found",
            FaultKind::VmNotFound => "vm-not-found",
            FaultKind::FindVmByUuid => "find-vm-by-uuid",
            FaultKind::ManagedObjectNotFound => "managed-object-not-found",
        }
    }

    /// Parse a wire fault name; names this controller does not know are internal
    #[must_use]
    pub fn from_wire(name: &str) -> Self {
        match name {
            "api-server-operation" => FaultKind::ApiServerOperation,
            "datacenter-not-found" => FaultKind::DatacenterNotFound,
            "vcenter-not-found" => FaultKind::VcenterNotFound,
            "vm-not-found" => FaultKind::VmNotFound,
            "find-vm-by-uuid" => FaultKind::FindVmByUuid,
            "managed-object-not-found" => FaultKind::ManagedObjectNotFound,
            _ => FaultKind::Internal,
        }
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_kind_serde_matches_label() {
        for fault in [
            FaultKind::Internal,
            FaultKind::ApiServerOperation,
            FaultKind::DatacenterNotFound,
            FaultKind::VcenterNotFound,
            FaultKind::VmNotFound,
            FaultKind::FindVmByUuid,
            FaultKind::ManagedObjectNotFound,
        ] {
            let json = serde_json::to_value(fault).unwrap();
            assert_eq!(json, serde_json::Value::String(fault.as_str().to_string()));
        }
    }

    #[test]
    fn test_fault_kind_parses_from_wire() {
        let fault: FaultKind = serde_json::from_str("\"managed-object-not-found\"").unwrap();
        assert_eq!(fault, FaultKind::ManagedObjectNotFound);
    }

    #[test]
    fn test_from_wire_unknown_is_internal() {
        assert_eq!(FaultKind::from_wire("vm-not-found"), FaultKind::VmNotFound);
        assert_eq!(FaultKind::from_wire("resource-in-use"), FaultKind::Internal);
    }
}
