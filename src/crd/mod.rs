//! # Custom Resource Definitions
//!
//! CRD types for the CNS attachment controller.
//!
//! ## Module Structure
//!
//! - `spec.rs` - `CnsNodeVmAttachment` resource and its desired state
//! - `status.rs` - Status written back by the reconciler

mod spec;
mod status;

pub use spec::{CnsNodeVmAttachment, CnsNodeVmAttachmentSpec};
pub use status::CnsNodeVmAttachmentStatus;
