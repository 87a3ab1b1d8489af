//! # Runtime
//!
//! Process wiring for the controller binary.
//!
//! - `initialization`: tracing, metrics, HTTP server, kube client and reconciler context
//! - `watch_loop`: `kube_runtime::Controller` driving reconciles with a bounded worker pool
//! - `error_policy`: requeue handling for failed reconciles and watch stream errors

pub mod error_policy;
pub mod initialization;
pub mod watch_loop;
