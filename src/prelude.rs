//! # Prelude
//!
//! Re-exports commonly used types and traits for convenience.
//!
//! ```rust
//! use cns_attachment_controller::prelude::*;
//! ```

// CRD types
pub use crate::crd::*;

// Backend seam
pub use crate::backend::{BackendError, FaultKind, NodeVm, VolumeBackend};

// Store seams
pub use crate::controller::store::{
    ResolveError, ResourceStore, StoreError, VmInventory, VmRecord, VolumeIdResolver,
};

// Reconciler types
pub use crate::controller::backoff::BackoffRegistry;
pub use crate::controller::events::{EventSeverity, EventSink};
pub use crate::controller::finalizer::{AttachmentFinalizers, ClaimFinalizers};
pub use crate::controller::reconciler::{
    reconcile, reconcile_attachment, AttachmentState, PassOutcome, Reconciler, ReconcilerError,
    Requeue,
};

// Config types
pub use crate::config::ControllerConfig;
