//! # Controller Configuration
//!
//! Controller-level settings loaded from environment variables.

use crate::constants::{
    DEFAULT_BACKOFF_FLOOR_MS, DEFAULT_BACKOFF_MAX_SECS, DEFAULT_MAX_WORKER_THREADS,
    DEFAULT_METRICS_PORT, DEFAULT_VOLUME_ID_POLL_INTERVAL_SECS,
    DEFAULT_VOLUME_ID_POLL_TIMEOUT_SECS, DEFAULT_VOLUME_MANAGER_ENDPOINT,
    DEFAULT_WATCH_RESTART_DELAY_AFTER_END_SECS, WORKER_THREADS_ENV,
};
use std::time::Duration;
use tracing::{debug, warn};

/// Controller-level configuration
///
/// All settings have sensible defaults and can be overridden via environment variables.
/// Environment variables are populated from a ConfigMap using `envFrom` in the deployment.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Maximum concurrent reconciliations (distinct attachments only)
    pub max_worker_threads: usize,
    /// Backoff floor in milliseconds
    pub backoff_floor_ms: u64,
    /// Backoff ceiling in seconds
    pub backoff_max_secs: u64,
    /// Poll interval while waiting for a PVC to be bound (seconds)
    pub volume_id_poll_interval_secs: u64,
    /// Give up waiting for a PVC to be bound after this long (seconds)
    pub volume_id_poll_timeout_secs: u64,
    /// Port for `/metrics`, `/healthz` and `/readyz`
    pub metrics_port: u16,
    /// Log format (json, text)
    pub log_format: String,
    /// Delay before restarting the watch stream after it ends (seconds)
    pub watch_restart_delay_after_end_secs: u64,
    /// Base URL of the volume manager service performing CNS attach/detach
    pub volume_manager_endpoint: String,
    /// vCenter host the node VMs live in
    pub vcenter_host: String,
    /// Datacenter managed object IDs searched for node VMs
    pub datacenters: Vec<String>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            max_worker_threads: DEFAULT_MAX_WORKER_THREADS,
            backoff_floor_ms: DEFAULT_BACKOFF_FLOOR_MS,
            backoff_max_secs: DEFAULT_BACKOFF_MAX_SECS,
            volume_id_poll_interval_secs: DEFAULT_VOLUME_ID_POLL_INTERVAL_SECS,
            volume_id_poll_timeout_secs: DEFAULT_VOLUME_ID_POLL_TIMEOUT_SECS,
            metrics_port: DEFAULT_METRICS_PORT,
            log_format: "json".to_string(),
            watch_restart_delay_after_end_secs: DEFAULT_WATCH_RESTART_DELAY_AFTER_END_SECS,
            volume_manager_endpoint: DEFAULT_VOLUME_MANAGER_ENDPOINT.to_string(),
            vcenter_host: String::new(),
            datacenters: Vec::new(),
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        Self {
            max_worker_threads: parse_worker_threads(std::env::var(WORKER_THREADS_ENV).ok().as_deref()),
            backoff_floor_ms: parse_backoff_floor_ms(std::env::var("BACKOFF_FLOOR_MS").ok().as_deref()),
            backoff_max_secs: env_var_or_default("BACKOFF_MAX_SECS", DEFAULT_BACKOFF_MAX_SECS),
            volume_id_poll_interval_secs: env_var_or_default(
                "VOLUME_ID_POLL_INTERVAL_SECS",
                DEFAULT_VOLUME_ID_POLL_INTERVAL_SECS,
            ),
            volume_id_poll_timeout_secs: env_var_or_default(
                "VOLUME_ID_POLL_TIMEOUT_SECS",
                DEFAULT_VOLUME_ID_POLL_TIMEOUT_SECS,
            ),
            metrics_port: env_var_or_default("METRICS_PORT", DEFAULT_METRICS_PORT),
            log_format: env_var_or_default_str("LOG_FORMAT", "json"),
            watch_restart_delay_after_end_secs: env_var_or_default(
                "WATCH_RESTART_DELAY_AFTER_END_SECS",
                DEFAULT_WATCH_RESTART_DELAY_AFTER_END_SECS,
            ),
            volume_manager_endpoint: env_var_or_default_str(
                "VOLUME_MANAGER_ENDPOINT",
                DEFAULT_VOLUME_MANAGER_ENDPOINT,
            ),
            vcenter_host: env_var_or_default_str("VSPHERE_VCENTER_HOST", ""),
            datacenters: parse_datacenters(&env_var_or_default_str("VSPHERE_DATACENTERS", "")),
        }
    }

    /// Get backoff floor duration
    pub fn backoff_floor(&self) -> Duration {
        Duration::from_millis(self.backoff_floor_ms)
    }

    /// Get backoff ceiling duration
    pub fn backoff_max(&self) -> Duration {
        Duration::from_secs(self.backoff_max_secs)
    }

    pub fn volume_id_poll_interval(&self) -> Duration {
        Duration::from_secs(self.volume_id_poll_interval_secs)
    }

    pub fn volume_id_poll_timeout(&self) -> Duration {
        Duration::from_secs(self.volume_id_poll_timeout_secs)
    }

    /// Get watch restart delay after end duration
    pub fn watch_restart_delay_after_end_duration(&self) -> Duration {
        Duration::from_secs(self.watch_restart_delay_after_end_secs)
    }
}

/// Resolve the worker pool size from the raw value of `WORKER_THREADS_NODEVM_ATTACH`
///
/// Unset, unparsable, non-positive or larger-than-default values fall back to the
/// default. Every fallback except "unset" is logged as a warning.
pub fn parse_worker_threads(raw: Option<&str>) -> usize {
    let Some(raw) = raw.filter(|v| !v.is_empty()) else {
        debug!(
            "{} is not set. Picking the default value {}",
            WORKER_THREADS_ENV, DEFAULT_MAX_WORKER_THREADS
        );
        return DEFAULT_MAX_WORKER_THREADS;
    };

    match raw.trim().parse::<i64>() {
        Ok(value) if value <= 0 => {
            warn!(
                "Maximum number of worker threads set in env variable {} ({}) is less than 1, will use the default value {}",
                WORKER_THREADS_ENV, raw, DEFAULT_MAX_WORKER_THREADS
            );
            DEFAULT_MAX_WORKER_THREADS
        }
        Ok(value) if value > DEFAULT_MAX_WORKER_THREADS as i64 => {
            warn!(
                "Maximum number of worker threads set in env variable {} ({}) is greater than {}, will use the default value {}",
                WORKER_THREADS_ENV, raw, DEFAULT_MAX_WORKER_THREADS, DEFAULT_MAX_WORKER_THREADS
            );
            DEFAULT_MAX_WORKER_THREADS
        }
        Ok(value) => {
            debug!(
                "Maximum number of worker threads to reconcile CnsNodeVmAttachment instances is set to {}",
                value
            );
            // Bounded by DEFAULT_MAX_WORKER_THREADS above
            usize::try_from(value).unwrap_or(DEFAULT_MAX_WORKER_THREADS)
        }
        Err(_) => {
            warn!(
                "Maximum number of worker threads set in env variable {} ({}) is invalid, will use the default value {}",
                WORKER_THREADS_ENV, raw, DEFAULT_MAX_WORKER_THREADS
            );
            DEFAULT_MAX_WORKER_THREADS
        }
    }
}

/// Resolve the backoff floor from the raw value of `BACKOFF_FLOOR_MS`
///
/// A zero floor would never grow when doubled, so zero and unparsable values
/// fall back to the default with a warning.
pub fn parse_backoff_floor_ms(raw: Option<&str>) -> u64 {
    let Some(raw) = raw.filter(|v| !v.is_empty()) else {
        return DEFAULT_BACKOFF_FLOOR_MS;
    };

    match raw.trim().parse::<u64>() {
        Ok(value) if value > 0 => value,
        _ => {
            warn!(
                "Backoff floor set in env variable BACKOFF_FLOOR_MS ({}) must be a positive number of milliseconds, will use the default value {}",
                raw, DEFAULT_BACKOFF_FLOOR_MS
            );
            DEFAULT_BACKOFF_FLOOR_MS
        }
    }
}

/// Split a comma separated datacenter list, dropping blank entries
pub fn parse_datacenters(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|dc| !dc.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// Read environment variable or return default value
fn env_var_or_default<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Read environment variable as string or return default
fn env_var_or_default_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
