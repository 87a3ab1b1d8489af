//! # Events
//!
//! Kubernetes events published on `CnsNodeVmAttachment` records.

use crate::constants::{CONTROLLER_NAME, EVENT_REASON_FAILED, EVENT_REASON_SUCCEEDED};
use crate::crd::CnsNodeVmAttachment;
use async_trait::async_trait;
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use kube::{Client, Resource};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventSeverity {
    Normal,
    Warning,
}

impl EventSeverity {
    #[must_use]
    pub fn reason(self) -> &'static str {
        match self {
            Self::Normal => EVENT_REASON_SUCCEEDED,
            Self::Warning => EVENT_REASON_FAILED,
        }
    }
}

/// Destination for user-facing events
///
/// Publishing is best effort; implementations log and swallow their own failures.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn publish(&self, attachment: &CnsNodeVmAttachment, severity: EventSeverity, message: &str);
}

/// `EventSink` backed by the kube-runtime event recorder
#[derive(Clone)]
pub struct KubeEventSink {
    recorder: Recorder,
}

impl std::fmt::Debug for KubeEventSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeEventSink").finish_non_exhaustive()
    }
}

impl KubeEventSink {
    pub fn new(client: Client) -> Self {
        let reporter = Reporter {
            controller: CONTROLLER_NAME.to_string(),
            instance: std::env::var("POD_NAME").ok(),
        };
        Self {
            recorder: Recorder::new(client, reporter),
        }
    }
}

#[async_trait]
impl EventSink for KubeEventSink {
    async fn publish(&self, attachment: &CnsNodeVmAttachment, severity: EventSeverity, message: &str) {
        let event = Event {
            type_: match severity {
                EventSeverity::Normal => EventType::Normal,
                EventSeverity::Warning => EventType::Warning,
            },
            reason: severity.reason().to_string(),
            note: Some(message.to_string()),
            action: if attachment.is_being_deleted() {
                "Detach".to_string()
            } else {
                "Attach".to_string()
            },
            secondary: None,
        };

        if let Err(e) = self.recorder.publish(&event, &attachment.object_ref(&())).await {
            warn!("Failed to publish event for {}: {}", attachment.key(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reasons() {
        assert_eq!(EventSeverity::Normal.reason(), "NodeVMAttachSucceeded");
        assert_eq!(EventSeverity::Warning.reason(), "NodeVMAttachFailed");
    }
}
