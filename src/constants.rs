//! # Constants
//!
//! Shared constants used throughout the controller.
//!
//! These values represent reasonable defaults and can be overridden via
//! configuration or environment variables where applicable.

/// Finalizer placed on a `CnsNodeVmAttachment` while the volume may be attached.
pub const CNS_FINALIZER: &str = "cns.vmware.com";

/// Protection finalizer placed on the PersistentVolumeClaim backing an attachment.
pub const CNS_PVC_FINALIZER: &str = "cns.vmware.com/pvc-protection";

/// Attachment metadata key holding the CNS volume ID resolved from the claim.
pub const ATTRIBUTE_CNS_VOLUME_ID: &str = "cnsVolumeID";

/// Attachment metadata key holding the disk UUID returned by the attach call.
pub const ATTRIBUTE_FIRST_CLASS_DISK_UUID: &str = "diskUUID";

/// Field manager / event reporter name
pub const CONTROLLER_NAME: &str = "cnsnodevmattachment-controller";

/// Event reason for a successful attach or detach
pub const EVENT_REASON_SUCCEEDED: &str = "NodeVMAttachSucceeded";

/// Event reason for a failed attach or detach
pub const EVENT_REASON_FAILED: &str = "NodeVMAttachFailed";

/// Environment variable overriding the reconcile worker pool size
pub const WORKER_THREADS_ENV: &str = "WORKER_THREADS_NODEVM_ATTACH";

/// Default (and maximum) number of concurrent reconciliations
pub const DEFAULT_MAX_WORKER_THREADS: usize = 10;

/// Backoff floor: delay for unseen records and after a success (milliseconds)
pub const DEFAULT_BACKOFF_FLOOR_MS: u64 = 1000;

/// Backoff ceiling (seconds)
pub const DEFAULT_BACKOFF_MAX_SECS: u64 = 300;

/// How often to re-read an unbound PVC while resolving its volume ID (seconds)
pub const DEFAULT_VOLUME_ID_POLL_INTERVAL_SECS: u64 = 5;

/// How long to wait for a PVC to be bound before failing volume ID resolution (seconds)
pub const DEFAULT_VOLUME_ID_POLL_TIMEOUT_SECS: u64 = 240;

/// Default HTTP server port for metrics and health probes
pub const DEFAULT_METRICS_PORT: u16 = 5000;

/// Default HTTP server startup timeout (how long to wait for server to be ready)
pub const DEFAULT_SERVER_STARTUP_TIMEOUT_SECS: u64 = 10;

/// Default HTTP server readiness poll interval
pub const DEFAULT_SERVER_POLL_INTERVAL_MS: u64 = 50;

/// Default delay before restarting the watch stream after it ends (seconds)
pub const DEFAULT_WATCH_RESTART_DELAY_AFTER_END_SECS: u64 = 1;

/// Default volume manager endpoint
pub const DEFAULT_VOLUME_MANAGER_ENDPOINT: &str = "http://127.0.0.1:8443";

/// Volume type label used on the control-ops histogram
pub const VOLUME_TYPE_BLOCK: &str = "block";
