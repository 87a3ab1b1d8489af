//! # Metrics
//!
//! Prometheus metrics for monitoring the controller.
//!
//! ## Metrics Exposed
//!
//! - `cns_attachment_reconciliations_total` - Total number of reconciliation passes
//! - `cns_attachment_reconciliation_errors_total` - Passes that failed to read the attachment
//! - `cns_attachment_control_ops_duration_seconds` - Attach/detach pass duration by op type, outcome and fault
//! - `cns_attachment_requeues_total` - Requeues by reason
//! - `cns_attachment_backend_operation_duration_seconds` - Volume manager call duration

use crate::backend::FaultKind;
use crate::constants::VOLUME_TYPE_BLOCK;
use anyhow::Result;
use prometheus::{HistogramVec, IntCounter, IntCounterVec, Registry};
use std::sync::LazyLock;

// Metrics
pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILIATIONS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "cns_attachment_reconciliations_total",
        "Total number of reconciliations",
    )
    .expect("Failed to create RECONCILIATIONS_TOTAL metric - this should never happen")
});

static RECONCILIATION_ERRORS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "cns_attachment_reconciliation_errors_total",
        "Total number of reconciliation errors",
    )
    .expect("Failed to create RECONCILIATION_ERRORS_TOTAL metric - this should never happen")
});

static CONTROL_OPS_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        prometheus::HistogramOpts::new(
            "cns_attachment_control_ops_duration_seconds",
            "Duration of attach/detach reconciliation passes in seconds",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 120.0]),
        &["volume_type", "op_type", "status", "fault_type"],
    )
    .expect("Failed to create CONTROL_OPS_DURATION metric - this should never happen")
});

static REQUEUES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "cns_attachment_requeues_total",
            "Total number of requeues by reason",
        ),
        &["reason"],
    )
    .expect("Failed to create REQUEUES_TOTAL metric - this should never happen")
});

static BACKEND_OPERATION_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        prometheus::HistogramOpts::new(
            "cns_attachment_backend_operation_duration_seconds",
            "Duration of volume manager operations in seconds",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]),
        &["operation", "status"],
    )
    .expect("Failed to create BACKEND_OPERATION_DURATION metric - this should never happen")
});

pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(RECONCILIATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(CONTROL_OPS_DURATION.clone()))?;
    REGISTRY.register(Box::new(REQUEUES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(BACKEND_OPERATION_DURATION.clone()))?;

    Ok(())
}

pub fn increment_reconciliations() {
    RECONCILIATIONS_TOTAL.inc();
}

pub fn increment_reconciliation_errors() {
    RECONCILIATION_ERRORS_TOTAL.inc();
}

/// Observe the outcome of one attach or detach pass
///
/// A pass that ends in a requeue counts as a failure with its fault kind;
/// anything else is a pass with an empty fault label.
pub fn observe_control_op(op_type: &str, fault: Option<FaultKind>, duration: f64) {
    let (status, fault_type) = match fault {
        Some(fault) => ("fail", fault.as_str()),
        None => ("pass", ""),
    };
    CONTROL_OPS_DURATION
        .with_label_values(&[VOLUME_TYPE_BLOCK, op_type, status, fault_type])
        .observe(duration);
}

pub fn increment_requeues_total(reason: &str) {
    REQUEUES_TOTAL.with_label_values(&[reason]).inc();
}

pub fn record_backend_operation(operation: &str, success: bool, duration: f64) {
    let status = if success { "success" } else { "error" };
    BACKEND_OPERATION_DURATION
        .with_label_values(&[operation, status])
        .observe(duration);
}
