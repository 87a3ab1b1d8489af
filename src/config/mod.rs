//! # Configuration
//!
//! Controller settings loaded from environment variables.

mod controller;

pub use controller::{parse_datacenters, parse_worker_threads, ControllerConfig};
