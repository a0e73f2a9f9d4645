use once_cell::sync::Lazy;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, Encoder, Histogram,
    IntCounter, IntCounterVec, TextEncoder,
};

// Metrics registry
static RATE_LIMIT_EXCEEDED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "rate_limit_exceeded_total",
        "Total number of rate limit rejections",
        &["identifier_type"]
    )
    .unwrap()
});

static RATE_LIMIT_FAIL_OPEN_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "rate_limit_fail_open_total",
        "Rate limit checks answered permissively because the counter store was unreachable"
    )
    .unwrap()
});

static SPIKE_DETECTIONS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "spike_detections_total",
        "Total number of usage spikes detected"
    )
    .unwrap()
});

static SUSPENSIONS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "suspensions_total",
        "Total number of automatic project suspensions"
    )
    .unwrap()
});

static AUDIT_EVENTS_WRITTEN_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "audit_events_written_total",
        "Audit events durably written"
    )
    .unwrap()
});

static AUDIT_FLUSH_FAILURES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "audit_flush_failures_total",
        "Audit batches dropped after a storage write failure"
    )
    .unwrap()
});

static SPIKE_RUN_DURATION: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "spike_run_duration_seconds",
        "Spike detection run duration in seconds",
        vec![0.05, 0.1, 0.5, 1.0, 5.0, 15.0, 60.0]
    )
    .unwrap()
});

pub fn record_rate_limit_exceeded(identifier_type: &str) {
    RATE_LIMIT_EXCEEDED_TOTAL
        .with_label_values(&[identifier_type])
        .inc();
}

pub fn record_rate_limit_fail_open() {
    RATE_LIMIT_FAIL_OPEN_TOTAL.inc();
}

pub fn record_spike_run(spikes_detected: usize, suspensions: usize) {
    SPIKE_DETECTIONS_TOTAL.inc_by(spikes_detected as u64);
    SUSPENSIONS_TOTAL.inc_by(suspensions as u64);
}

pub fn observe_spike_run_duration(seconds: f64) {
    SPIKE_RUN_DURATION.observe(seconds);
}

pub fn record_audit_events_written(count: usize) {
    AUDIT_EVENTS_WRITTEN_TOTAL.inc_by(count as u64);
}

pub fn record_audit_flush_failure() {
    AUDIT_FLUSH_FAILURES_TOTAL.inc();
}

/// Render the registry in the Prometheus text exposition format
pub fn gather() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recorders_do_not_panic() {
        record_rate_limit_exceeded("ip");
        record_rate_limit_fail_open();
        record_spike_run(3, 1);
        observe_spike_run_duration(0.25);
        record_audit_events_written(10);
        record_audit_flush_failure();

        let exposition = gather();
        assert!(exposition.contains("rate_limit_exceeded_total"));
        assert!(exposition.contains("spike_detections_total"));
    }
}
