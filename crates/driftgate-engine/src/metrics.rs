//! Observability metrics for the decision-and-dispatch engines.
//!
//! This module provides Prometheus-compatible metrics for monitoring the
//! gate. Metrics are designed to support:
//!
//! - **Alerting**: SLO-based alerts on dispatch latency and regional failure
//!   rates
//! - **Dashboards**: Real-time visibility into veto and dispatch activity
//! - **Debugging**: Correlating dropped regions with logs
//!
//! ## Metrics Exported
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `driftgate_dispatches_total` | Counter | `status` | Dispatch outcomes |
//! | `driftgate_dispatch_duration_seconds` | Histogram | - | End-to-end dispatch time |
//! | `driftgate_regional_submission_failures_total` | Counter | `region` | Regional submissions dropped from results |
//! | `driftgate_veto_denials_total` | Counter | `veto` | Denials per veto check |
//!
//! ## Integration
//!
//! Metrics are exposed via the `metrics` crate facade. To export to
//! Prometheus, install a recorder in the embedding binary:
//!
//! ```rust,ignore
//! use metrics_exporter_prometheus::PrometheusBuilder;
//!
//! PrometheusBuilder::new()
//!     .with_http_listener(([0, 0, 0, 0], 9090))
//!     .install()
//!     .expect("failed to install Prometheus recorder");
//! ```

use std::time::{Duration, Instant};

use metrics::{counter, histogram};

/// Metric names as constants for consistency.
pub mod names {
    /// Counter: Dispatch outcomes by status.
    pub const DISPATCHES_TOTAL: &str = "driftgate_dispatches_total";
    /// Histogram: End-to-end dispatch duration in seconds.
    pub const DISPATCH_DURATION_SECONDS: &str = "driftgate_dispatch_duration_seconds";
    /// Counter: Regional submissions dropped from the result map.
    pub const REGIONAL_SUBMISSION_FAILURES_TOTAL: &str =
        "driftgate_regional_submission_failures_total";
    /// Counter: Denials per veto check.
    pub const VETO_DENIALS_TOTAL: &str = "driftgate_veto_denials_total";
}

/// Label keys used across metrics.
pub mod labels {
    /// Dispatch outcome status (completed, failed).
    pub const STATUS: &str = "status";
    /// Deployment region.
    pub const REGION: &str = "region";
    /// Veto check name.
    pub const VETO: &str = "veto";
}

/// High-level interface for recording gate metrics.
///
/// This struct provides ergonomic methods for recording metrics with proper
/// labeling. It's designed to be cheap to clone and share across tasks.
#[derive(Debug, Clone, Default)]
pub struct EngineMetrics {
    /// Optional prefix for metric names (reserved for multi-tenant
    /// deployments).
    _prefix: Option<String>,
}

impl EngineMetrics {
    /// Creates a new metrics recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a dispatch outcome.
    ///
    /// Increments the `driftgate_dispatches_total` counter.
    pub fn record_dispatch(&self, status: &str) {
        counter!(
            names::DISPATCHES_TOTAL,
            labels::STATUS => status.to_string(),
        )
        .increment(1);
    }

    /// Records end-to-end dispatch duration.
    ///
    /// Records the duration in the `driftgate_dispatch_duration_seconds`
    /// histogram.
    pub fn observe_dispatch_duration(&self, duration: Duration) {
        histogram!(names::DISPATCH_DURATION_SECONDS).record(duration.as_secs_f64());
    }

    /// Records a regional submission that was dropped from the result map.
    ///
    /// Increments the `driftgate_regional_submission_failures_total`
    /// counter.
    pub fn record_regional_submission_failure(&self, region: &str) {
        counter!(
            names::REGIONAL_SUBMISSION_FAILURES_TOTAL,
            labels::REGION => region.to_string(),
        )
        .increment(1);
    }

    /// Records a veto denial.
    ///
    /// Increments the `driftgate_veto_denials_total` counter.
    pub fn record_veto_denial(&self, veto: &str) {
        counter!(
            names::VETO_DENIALS_TOTAL,
            labels::VETO => veto.to_string(),
        )
        .increment(1);
    }
}

/// RAII guard for timing operations.
///
/// Automatically records duration when dropped.
///
/// ## Example
///
/// ```rust,no_run
/// use driftgate_engine::metrics::{EngineMetrics, TimingGuard};
///
/// let metrics = EngineMetrics::new();
///
/// {
///     let _guard = TimingGuard::new(|duration| {
///         metrics.observe_dispatch_duration(duration);
///     });
///
///     // Do work...
/// } // Duration recorded automatically on drop
/// ```
pub struct TimingGuard<F>
where
    F: FnOnce(Duration),
{
    start: Instant,
    on_drop: Option<F>,
}

impl<F> TimingGuard<F>
where
    F: FnOnce(Duration),
{
    /// Creates a new timing guard that will call `on_drop` with the elapsed
    /// duration.
    pub fn new(on_drop: F) -> Self {
        Self {
            start: Instant::now(),
            on_drop: Some(on_drop),
        }
    }

    /// Returns the elapsed time since the guard was created.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl<F> Drop for TimingGuard<F>
where
    F: FnOnce(Duration),
{
    fn drop(&mut self) {
        if let Some(on_drop) = self.on_drop.take() {
            on_drop(self.start.elapsed());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn timing_guard_fires_on_drop() {
        let fired = Arc::new(AtomicBool::new(false));
        {
            let fired = Arc::clone(&fired);
            let _guard = TimingGuard::new(move |_| {
                fired.store(true, Ordering::SeqCst);
            });
        }
        assert!(fired.load(Ordering::SeqCst));
    }

    #[test]
    fn recording_without_a_recorder_is_a_no_op() {
        // The metrics facade drops records when no recorder is installed.
        let metrics = EngineMetrics::new();
        metrics.record_dispatch("completed");
        metrics.record_regional_submission_failure("us-west-2");
        metrics.record_veto_denial("ApplicationVeto");
        metrics.observe_dispatch_duration(Duration::from_millis(5));
    }
}
