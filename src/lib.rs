//! CNS Attachment Controller Library
//!
//! Reconciles `CnsNodeVmAttachment` resources: attaches CNS volumes to node VMs,
//! protects the backing PVCs while attached, and detaches on deletion.
//!
//! ## Quick Start
//!
//! ```rust
//! use cns_attachment_controller::prelude::*;
//! ```
//!
//! This brings commonly used types and traits into scope. For more specific imports,
//! use the individual modules.

pub mod backend;
pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod observability;
pub mod prelude;
pub mod runtime;
