//! # Backoff Registry
//!
//! Per-record exponential requeue delays shared by all reconcile workers.
//!
//! Records are keyed by `namespace/name`. An unseen record gets the floor.
//! Every failed pass doubles the stored delay (capped), and a successful pass
//! removes the entry so the next failure starts from the floor again.
//!
//! ## Usage
//!
//! ```rust
//! use cns_attachment_controller::controller::backoff::BackoffRegistry;
//! use std::time::Duration;
//!
//! let backoff = BackoffRegistry::new(Duration::from_secs(1), Duration::from_secs(300));
//! assert_eq!(backoff.get_or_init("ns/att-1"), Duration::from_secs(1));
//! backoff.double("ns/att-1");
//! assert_eq!(backoff.get_or_init("ns/att-1"), Duration::from_secs(2));
//! backoff.reset("ns/att-1");
//! assert_eq!(backoff.get_or_init("ns/att-1"), Duration::from_secs(1));
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Thread-safe map of record key to current requeue delay
#[derive(Debug, Clone)]
pub struct BackoffRegistry {
    delays: Arc<Mutex<HashMap<String, Duration>>>,
    floor: Duration,
    max: Duration,
}

impl BackoffRegistry {
    #[must_use]
    pub fn new(floor: Duration, max: Duration) -> Self {
        Self {
            delays: Arc::new(Mutex::new(HashMap::new())),
            floor,
            max: max.max(floor),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Duration>> {
        // A panicking worker must not wedge every other reconcile
        self.delays.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn floor(&self) -> Duration {
        self.floor
    }

    /// Current delay for `key`, storing the floor if the key is unseen
    pub fn get_or_init(&self, key: &str) -> Duration {
        *self.lock().entry(key.to_string()).or_insert(self.floor)
    }

    /// Current delay for `key` without inserting
    #[must_use]
    pub fn peek(&self, key: &str) -> Option<Duration> {
        self.lock().get(key).copied()
    }

    /// Double the delay for `key`, returning the new value
    ///
    /// A missing entry is treated as the floor before doubling.
    pub fn double(&self, key: &str) -> Duration {
        let mut delays = self.lock();
        let current = delays.get(key).copied().unwrap_or(self.floor);
        let next = current.saturating_mul(2).min(self.max);
        delays.insert(key.to_string(), next);
        next
    }

    /// Set the delay for `key` back to the floor
    pub fn reset(&self, key: &str) {
        self.lock().insert(key.to_string(), self.floor);
    }

    /// Forget `key` entirely
    pub fn clear(&self, key: &str) {
        self.lock().remove(key);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> BackoffRegistry {
        BackoffRegistry::new(Duration::from_secs(1), Duration::from_secs(300))
    }

    #[test]
    fn test_unseen_key_gets_floor() {
        let backoff = registry();
        assert_eq!(backoff.peek("ns/a"), None);
        assert_eq!(backoff.get_or_init("ns/a"), Duration::from_secs(1));
        assert_eq!(backoff.peek("ns/a"), Some(Duration::from_secs(1)));
    }

    #[test]
    fn test_delay_doubles_per_failure() {
        let backoff = registry();
        backoff.get_or_init("ns/a");
        for n in 1..=5u32 {
            backoff.double("ns/a");
            assert_eq!(backoff.get_or_init("ns/a"), Duration::from_secs(1) * 2u32.pow(n));
        }
    }

    #[test]
    fn test_double_without_entry_starts_from_floor() {
        let backoff = registry();
        assert_eq!(backoff.double("ns/a"), Duration::from_secs(2));
    }

    #[test]
    fn test_delay_is_capped() {
        let backoff = registry();
        for _ in 0..20 {
            backoff.double("ns/a");
        }
        assert_eq!(backoff.peek("ns/a"), Some(Duration::from_secs(300)));
    }

    #[test]
    fn test_success_resets_to_floor() {
        let backoff = registry();
        backoff.double("ns/a");
        backoff.double("ns/a");
        backoff.reset("ns/a");
        assert_eq!(backoff.get_or_init("ns/a"), Duration::from_secs(1));

        backoff.double("ns/a");
        backoff.clear("ns/a");
        assert_eq!(backoff.peek("ns/a"), None);
        assert_eq!(backoff.get_or_init("ns/a"), Duration::from_secs(1));
    }

    #[test]
    fn test_keys_are_independent() {
        let backoff = registry();
        backoff.double("ns/a");
        backoff.double("ns/a");
        assert_eq!(backoff.get_or_init("ns/b"), Duration::from_secs(1));
        assert_eq!(backoff.peek("ns/a"), Some(Duration::from_secs(4)));
        assert_eq!(backoff.len(), 2);
    }

    #[test]
    fn test_clones_share_state() {
        let backoff = registry();
        let other = backoff.clone();
        other.double("ns/a");
        assert_eq!(backoff.peek("ns/a"), Some(Duration::from_secs(2)));
    }
}
