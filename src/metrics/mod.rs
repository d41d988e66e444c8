//! Metrics module
//!
//! Prometheus counters and histograms for uploads, authentication and HTTP
//! responses, registered in the default registry.

pub mod server;

use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, HistogramVec,
};

lazy_static! {
    // Upload metrics
    pub static ref UPLOADS_TOTAL: CounterVec = register_counter_vec!(
        "tubely_uploads_total",
        "Total number of uploads",
        &["kind", "status"]  // kind: "thumbnail" or "video"
    ).unwrap();

    pub static ref UPLOAD_BYTES_TOTAL: CounterVec = register_counter_vec!(
        "tubely_upload_bytes_total",
        "Total bytes accepted",
        &["kind"]
    ).unwrap();

    pub static ref UPLOAD_DURATION: HistogramVec = register_histogram_vec!(
        "tubely_upload_duration_seconds",
        "Upload duration in seconds",
        &["kind"],
        vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 60.0]
    ).unwrap();

    // Auth metrics
    pub static ref AUTH_ATTEMPTS: CounterVec = register_counter_vec!(
        "tubely_auth_attempts_total",
        "Authentication attempts",
        &["status"]
    ).unwrap();

    // HTTP metrics
    pub static ref HTTP_RESPONSES: CounterVec = register_counter_vec!(
        "tubely_http_responses_total",
        "HTTP responses by route and status code",
        &["route", "status"]
    ).unwrap();

    // Error metrics
    pub static ref ERRORS_TOTAL: CounterVec = register_counter_vec!(
        "tubely_errors_total",
        "Total errors",
        &["type"]
    ).unwrap();
}

/// Record an accepted upload
pub fn record_upload_success(kind: &str, bytes: u64) {
    UPLOADS_TOTAL.with_label_values(&[kind, "success"]).inc();
    UPLOAD_BYTES_TOTAL
        .with_label_values(&[kind])
        .inc_by(bytes as f64);
}

/// Record a rejected or failed upload
pub fn record_upload_failure(kind: &str) {
    UPLOADS_TOTAL.with_label_values(&[kind, "failure"]).inc();
}

/// Record upload duration
pub fn record_upload_duration(kind: &str, duration_secs: f64) {
    UPLOAD_DURATION
        .with_label_values(&[kind])
        .observe(duration_secs);
}

/// Record authentication attempt
pub fn record_auth_attempt(success: bool) {
    let status = if success { "success" } else { "failure" };
    AUTH_ATTEMPTS.with_label_values(&[status]).inc();
}

/// Record a response sent for `route`
pub fn record_response(route: &str, status: u16) {
    HTTP_RESPONSES
        .with_label_values(&[route, &status.to_string()])
        .inc();
}

/// Record an error
pub fn record_error(error_type: &str) {
    ERRORS_TOTAL.with_label_values(&[error_type]).inc();
}
