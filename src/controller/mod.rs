//! # Controller
//!
//! Core controller modules for the CNS attachment controller.
//!
//! - `backoff`: per-record exponential requeue delays
//! - `conflict`: optimistic-concurrency retry helper
//! - `events`: Kubernetes event publishing
//! - `finalizer`: PVC and attachment protection markers
//! - `reconciler`: attach/detach state machine
//! - `server`: HTTP server for metrics and health checks
//! - `store`: API server access behind traits

pub mod backoff;
pub mod conflict;
pub mod events;
pub mod finalizer;
pub mod reconciler;
pub mod server;
pub mod store;
