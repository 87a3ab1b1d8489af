use crate::crd::CnsNodeVmAttachment;

/// Where a record sits in the attach/detach lifecycle, derived once per pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentState {
    /// Attached and not being deleted
    Stable,
    /// Not attached yet and not being deleted
    AttachPending,
    /// Deletion requested, attached or not
    DetachPending,
}

impl AttachmentState {
    #[must_use]
    pub fn of(attachment: &CnsNodeVmAttachment) -> Self {
        match (attachment.is_attached(), attachment.is_being_deleted()) {
            (_, true) => Self::DetachPending,
            (true, false) => Self::Stable,
            (false, false) => Self::AttachPending,
        }
    }

    /// Operation label used for the control-ops histogram
    #[must_use]
    pub fn op_type(self) -> &'static str {
        match self {
            Self::Stable | Self::AttachPending => "attach",
            Self::DetachPending => "detach",
        }
    }
}
