//! Prometheus metrics for the triage pipeline.
//!
//! Metrics are process-wide counters; they never carry decision state.
//! Call [`init_metrics`] once at startup to register them with
//! [`PROMETHEUS_REGISTRY`], then expose [`gather_metrics`] however the host
//! application prefers.
//!
//! # Example
//! ```no_run
//! use hotel_incident_triage::metrics::{gather_metrics, init_metrics};
//!
//! init_metrics().expect("metrics registration");
//! println!("{}", gather_metrics());
//! ```

use lazy_static::lazy_static;
use prometheus::{CounterVec, Gauge, Histogram, HistogramOpts, HistogramVec, Opts, Registry};

const NAMESPACE: &str = "hotel_triage";

lazy_static! {
    /// Global Prometheus registry for all metrics
    pub static ref PROMETHEUS_REGISTRY: Registry = Registry::new();

    /// Completed triage runs
    ///
    /// Labels: outcome
    pub static ref TRIAGE_RUNS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("runs_total", "Total number of triage runs by outcome").namespace(NAMESPACE),
        &["outcome"]
    ).expect("Failed to create TRIAGE_RUNS_TOTAL metric");

    /// Stage duration in seconds
    ///
    /// Labels: stage
    pub static ref TRIAGE_STAGE_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new("stage_duration_seconds", "Triage stage duration in seconds")
            .namespace(NAMESPACE)
            .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
        &["stage"]
    ).expect("Failed to create TRIAGE_STAGE_DURATION_SECONDS metric");

    /// Stage retries at the stage boundary
    ///
    /// Labels: stage
    pub static ref TRIAGE_STAGE_RETRIES_TOTAL: CounterVec = CounterVec::new(
        Opts::new("stage_retries_total", "Stage retries after a recoverable failure").namespace(NAMESPACE),
        &["stage"]
    ).expect("Failed to create TRIAGE_STAGE_RETRIES_TOTAL metric");

    /// Distribution of clamped risk scores
    pub static ref TRIAGE_RISK_SCORE: Histogram = Histogram::with_opts(
        HistogramOpts::new("risk_score", "Clamped risk score per incident")
            .namespace(NAMESPACE)
            .buckets(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0])
    ).expect("Failed to create TRIAGE_RISK_SCORE metric");

    /// Dispatched actions
    ///
    /// Labels: system, result
    pub static ref TRIAGE_ACTIONS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("actions_total", "Actions dispatched to external systems").namespace(NAMESPACE),
        &["system", "result"]
    ).expect("Failed to create TRIAGE_ACTIONS_TOTAL metric");

    /// Runs currently suspended waiting for a human decision
    pub static ref TRIAGE_PENDING_APPROVALS: Gauge = Gauge::with_opts(
        Opts::new("pending_approvals", "Runs awaiting human approval").namespace(NAMESPACE)
    ).expect("Failed to create TRIAGE_PENDING_APPROVALS metric");
}

/// Register all metrics with the global registry. Safe to call repeatedly.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(TRIAGE_RUNS_TOTAL.clone()),
        Box::new(TRIAGE_STAGE_DURATION_SECONDS.clone()),
        Box::new(TRIAGE_STAGE_RETRIES_TOTAL.clone()),
        Box::new(TRIAGE_RISK_SCORE.clone()),
        Box::new(TRIAGE_ACTIONS_TOTAL.clone()),
        Box::new(TRIAGE_PENDING_APPROVALS.clone()),
    ];

    for collector in collectors {
        match PROMETHEUS_REGISTRY.register(collector) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(e),
        }
    }

    tracing::debug!("Triage metrics registered");
    Ok(())
}

/// Text exposition of all registered metrics
pub fn gather_metrics() -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let metric_families = PROMETHEUS_REGISTRY.gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::from("# Error encoding metrics\n");
    }

    String::from_utf8(buffer).unwrap_or_else(|e| {
        tracing::error!("Failed to convert metrics to string: {}", e);
        String::from("# Error converting metrics\n")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        assert!(init_metrics().is_ok());
        assert!(init_metrics().is_ok());
    }

    #[test]
    fn test_gather_contains_runs_counter() {
        init_metrics().unwrap();
        TRIAGE_RUNS_TOTAL.with_label_values(&["completed"]).inc();
        let output = gather_metrics();
        assert!(output.contains("hotel_triage_runs_total"));
    }
}
