//! Metrics and observability utilities
//!
//! Prometheus metrics for activations, license issuance and bulk intake.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};

/// Metrics prefix for all LicenseCore metrics
pub const METRICS_PREFIX: &str = "licensecore";

/// Histogram buckets for request and activation latency (in seconds)
pub const LATENCY_BUCKETS: &[f64] = &[
    0.001,  // 1ms
    0.005,  // 5ms
    0.010,  // 10ms
    0.025,  // 25ms
    0.050,  // 50ms
    0.100,  // 100ms
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    2.500,  // 2.5s
];

/// Register all metric descriptions
pub fn register_metrics() {
    // Activation metrics
    describe_counter!(
        format!("{}_activations_total", METRICS_PREFIX),
        Unit::Count,
        "Activation attempts by outcome"
    );

    describe_histogram!(
        format!("{}_activation_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Activation engine latency in seconds"
    );

    // Registry metrics
    describe_counter!(
        format!("{}_licenses_created_total", METRICS_PREFIX),
        Unit::Count,
        "Licenses issued, manually or through bulk intake"
    );

    // Intake metrics
    describe_counter!(
        format!("{}_intake_rows_total", METRICS_PREFIX),
        Unit::Count,
        "Bulk intake rows by result"
    );

    // Gateway metrics
    describe_counter!(
        format!("{}_rate_limited_total", METRICS_PREFIX),
        Unit::Count,
        "Validate requests refused by the rate limiter"
    );

    tracing::info!("Metrics registered");
}

/// Record one pass through the activation engine
pub fn record_activation(outcome: &'static str, duration_secs: f64) {
    counter!(
        format!("{}_activations_total", METRICS_PREFIX),
        "outcome" => outcome
    )
    .increment(1);

    histogram!(format!("{}_activation_duration_seconds", METRICS_PREFIX)).record(duration_secs);
}

/// Record an issued license
pub fn record_license_created(source: &'static str) {
    counter!(
        format!("{}_licenses_created_total", METRICS_PREFIX),
        "source" => source
    )
    .increment(1);
}

/// Record the result of a bulk intake batch
pub fn record_intake(imported: u64, skipped: u64) {
    counter!(
        format!("{}_intake_rows_total", METRICS_PREFIX),
        "result" => "imported"
    )
    .increment(imported);

    counter!(
        format!("{}_intake_rows_total", METRICS_PREFIX),
        "result" => "skipped"
    )
    .increment(skipped);
}
