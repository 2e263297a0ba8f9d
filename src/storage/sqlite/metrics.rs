//! Metrics for identity store operations.

use std::time::Instant;

/// Records a count and a latency sample for one store operation.
///
/// Emits `vitalwatch_store_operations_total` and
/// `vitalwatch_store_operation_duration_ms`, labelled by backend, operation and
/// status (`"success"` or `"error"`).
pub fn record_operation_metrics(
    backend: &'static str,
    operation: &'static str,
    start: Instant,
    status: &'static str,
) {
    metrics::counter!(
        "vitalwatch_store_operations_total",
        "backend" => backend,
        "operation" => operation,
        "status" => status
    )
    .increment(1);
    metrics::histogram!(
        "vitalwatch_store_operation_duration_ms",
        "backend" => backend,
        "operation" => operation,
        "status" => status
    )
    .record(start.elapsed().as_secs_f64() * 1000.0);
}
