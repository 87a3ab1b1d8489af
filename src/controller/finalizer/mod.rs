//! # Finalizers
//!
//! Protection markers managed by the controller.
//!
//! - `claim.rs` - `cns.vmware.com/pvc-protection` on the PersistentVolumeClaim
//! - `attachment.rs` - `cns.vmware.com` on the `CnsNodeVmAttachment` itself
//!
//! Both managers are idempotent and route writes through
//! [`replace_with_conflict_retry`](crate::controller::conflict::replace_with_conflict_retry).

mod attachment;
mod claim;

pub use attachment::AttachmentFinalizers;
pub use claim::ClaimFinalizers;

use kube::api::ObjectMeta;

/// Append `finalizer` unless present; returns whether the list changed
pub fn add_finalizer(meta: &mut ObjectMeta, finalizer: &str) -> bool {
    let finalizers = meta.finalizers.get_or_insert_with(Vec::new);
    if finalizers.iter().any(|f| f == finalizer) {
        return false;
    }
    finalizers.push(finalizer.to_string());
    true
}

/// Drop every occurrence of `finalizer`; returns whether the list changed
pub fn remove_finalizer(meta: &mut ObjectMeta, finalizer: &str) -> bool {
    let Some(finalizers) = meta.finalizers.as_mut() else {
        return false;
    };
    let before = finalizers.len();
    finalizers.retain(|f| f != finalizer);
    before != finalizers.len()
}

#[must_use]
pub fn has_finalizer(meta: &ObjectMeta, finalizer: &str) -> bool {
    meta.finalizers
        .as_ref()
        .is_some_and(|f| f.iter().any(|x| x == finalizer))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_is_idempotent() {
        let mut meta = ObjectMeta::default();
        assert!(add_finalizer(&mut meta, "a"));
        assert!(!add_finalizer(&mut meta, "a"));
        assert_eq!(meta.finalizers, Some(vec!["a".to_string()]));
    }

    #[test]
    fn test_add_preserves_order_of_existing() {
        let mut meta = ObjectMeta {
            finalizers: Some(vec!["kubernetes.io/pvc-protection".to_string()]),
            ..Default::default()
        };
        add_finalizer(&mut meta, "cns.vmware.com/pvc-protection");
        assert_eq!(
            meta.finalizers,
            Some(vec![
                "kubernetes.io/pvc-protection".to_string(),
                "cns.vmware.com/pvc-protection".to_string()
            ])
        );
    }

    #[test]
    fn test_remove_only_touches_named_finalizer() {
        let mut meta = ObjectMeta {
            finalizers: Some(vec!["x".to_string(), "a".to_string(), "y".to_string()]),
            ..Default::default()
        };
        assert!(remove_finalizer(&mut meta, "a"));
        assert!(!remove_finalizer(&mut meta, "a"));
        assert_eq!(meta.finalizers, Some(vec!["x".to_string(), "y".to_string()]));
    }

    #[test]
    fn test_remove_without_list() {
        let mut meta = ObjectMeta::default();
        assert!(!remove_finalizer(&mut meta, "a"));
        assert!(!has_finalizer(&meta, "a"));
    }
}
