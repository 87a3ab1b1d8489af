//! # Reconciler
//!
//! Attach/detach state machine for `CnsNodeVmAttachment` resources.
//!
//! Each pass derives an [`AttachmentState`] from the stored record:
//!
//! | State | attached | deletionTimestamp | Action |
//! |---|---|---|---|
//! | `Stable` | true | unset | ensure PVC protection, clear backoff |
//! | `AttachPending` | false | unset | attach sequence |
//! | `DetachPending` | any | set | detach sequence |
//!
//! Every failure publishes a Warning event (doubling the record's backoff) and
//! requeues after the delay read at the start of the pass.

mod attach;
mod detach;
pub mod reconcile;
pub mod state;
pub mod types;

pub use reconcile::{reconcile, reconcile_attachment};
pub use state::AttachmentState;
pub use types::{PassOutcome, Reconciler, ReconcilerError, Requeue};
