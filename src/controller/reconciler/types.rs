//! # Types
//!
//! Core types for the reconciler.

use crate::backend::{FaultKind, VolumeBackend};
use crate::controller::backoff::BackoffRegistry;
use crate::controller::events::{EventSeverity, EventSink};
use crate::controller::finalizer::{AttachmentFinalizers, ClaimFinalizers};
use crate::controller::store::{StoreError, VmInventory, VolumeIdResolver};
use crate::crd::CnsNodeVmAttachment;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};

#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error("failed to read CnsNodeVmAttachment {key}: {source}")]
    ReadAttachment {
        key: String,
        #[source]
        source: StoreError,
    },
}

impl ReconcilerError {
    /// `namespace/name` of the record the pass was for
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::ReadAttachment { key, .. } => key,
        }
    }
}

/// A pass that must be retried
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requeue {
    /// Delay read from the backoff registry at the start of the pass
    pub after: Duration,
    pub fault: FaultKind,
    pub message: String,
}

/// Result of one reconciliation pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutcome {
    /// Nothing left to do until the record changes
    Done,
    Requeue(Requeue),
}

impl PassOutcome {
    #[must_use]
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }

    #[must_use]
    pub fn fault(&self) -> Option<FaultKind> {
        match self {
            Self::Done => None,
            Self::Requeue(r) => Some(r.fault),
        }
    }
}

impl From<Result<(), Requeue>> for PassOutcome {
    fn from(result: Result<(), Requeue>) -> Self {
        match result {
            Ok(()) => Self::Done,
            Err(requeue) => Self::Requeue(requeue),
        }
    }
}

/// Shared context handed to every reconcile worker
#[derive(Clone)]
pub struct Reconciler {
    pub attachments: AttachmentFinalizers,
    pub claims: ClaimFinalizers,
    pub volume_ids: Arc<dyn VolumeIdResolver>,
    pub vm_inventory: Arc<dyn VmInventory>,
    pub backend: Arc<dyn VolumeBackend>,
    pub events: Arc<dyn EventSink>,
    // Per-record requeue delays keyed by namespace/name
    pub backoff: BackoffRegistry,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("backoff", &self.backoff)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    /// Publish a Normal event and reset the record's backoff to the floor
    pub(super) async fn report_success(&self, attachment: &CnsNodeVmAttachment, message: &str) {
        info!("{}", message);
        self.events
            .publish(attachment, EventSeverity::Normal, message)
            .await;
        self.backoff.reset(&attachment.key());
    }

    /// Publish a Warning event and double the record's backoff
    pub(super) async fn report_failure(&self, attachment: &CnsNodeVmAttachment, message: &str) {
        error!("{}", message);
        self.events
            .publish(attachment, EventSeverity::Warning, message)
            .await;
        let next = self.backoff.double(&attachment.key());
        tracing::debug!("Backoff for {} is now {:?}", attachment.key(), next);
    }

    /// Report a failed pass and build the matching requeue
    pub(super) async fn fail(
        &self,
        attachment: &CnsNodeVmAttachment,
        after: Duration,
        fault: FaultKind,
        message: String,
    ) -> Requeue {
        self.report_failure(attachment, &message).await;
        Requeue {
            after,
            fault,
            message,
        }
    }

    /// Record `message` on the status and try to persist it; a failed write is only logged
    pub(super) async fn record_error(&self, attachment: &mut CnsNodeVmAttachment, message: &str) {
        attachment.status_mut().error = message.to_string();
        if let Err(e) = self.attachments.persist(attachment).await {
            error!("Failed to update CnsNodeVmAttachment {}: {}", attachment.key(), e);
        }
    }
}
