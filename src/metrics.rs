// =============================================================================
// METRICS MODULE
// =============================================================================
// Prometheus metrics, scraped from /metrics.
//
// NOTES:
// - Counters only go up (requests, errors, denials)
// - Gauges go up and down (stock levels)
// - Histograms bucket latencies
// - Entity code never records metrics; the HTTP middleware, the inventory
//   layer and the Postgres adapter do
// =============================================================================

use anyhow::Result;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

use crate::error::ErrorKind;
use crate::permission::{Operation, Resource};

// =============================================================================
// METRIC NAMES
// =============================================================================

/// HTTP request counter
/// Labels: method, endpoint, status
pub const HTTP_REQUESTS_TOTAL: &str = "http_requests_total";

/// HTTP request duration histogram
/// Labels: method, endpoint
pub const HTTP_REQUEST_DURATION_SECONDS: &str = "http_request_duration_seconds";

/// Database query duration histogram
/// Labels: operation (select/insert/update/delete/count)
pub const DB_QUERY_DURATION_SECONDS: &str = "db_query_duration_seconds";

/// Stock level gauge of a part, set after every stock change
/// Labels: part_id
pub const STOCK_LEVEL: &str = "partdb_stock_level";

/// Stock change counter
/// Labels: kind (decrease/increase/set), status (success/failed)
pub const STOCK_ADJUSTMENTS_TOTAL: &str = "partdb_stock_adjustments_total";

/// Denied permission checks
/// Labels: resource, operation
pub const PERMISSION_DENIED_TOTAL: &str = "partdb_permission_denied_total";

/// Error responses by kind
/// Labels: kind
pub const ERRORS_TOTAL: &str = "partdb_errors_total";

// =============================================================================
// SETUP FUNCTION
// =============================================================================
/// Installs the global Prometheus recorder and returns the handle that
/// renders the scrape output.
pub fn setup_metrics() -> Result<PrometheusHandle> {
    // 1ms .. 10s
    let latency_buckets = &[
        0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
    ];

    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(HTTP_REQUEST_DURATION_SECONDS.to_string()),
            latency_buckets,
        )?
        .set_buckets_for_metric(
            Matcher::Full(DB_QUERY_DURATION_SECONDS.to_string()),
            latency_buckets,
        )?
        .install_recorder()?;

    describe_counter!(HTTP_REQUESTS_TOTAL, "Total number of HTTP requests received");
    describe_histogram!(HTTP_REQUEST_DURATION_SECONDS, "HTTP request latency in seconds");
    describe_histogram!(DB_QUERY_DURATION_SECONDS, "Database query latency in seconds");
    describe_gauge!(STOCK_LEVEL, "Current stock level per part (unknown stock is not reported)");
    describe_counter!(STOCK_ADJUSTMENTS_TOTAL, "Total number of stock changes");
    describe_counter!(PERMISSION_DENIED_TOTAL, "Total number of denied permission checks");
    describe_counter!(ERRORS_TOTAL, "Total number of error responses by kind");

    Ok(handle)
}

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Record an HTTP request
pub fn record_http_request(method: &str, endpoint: &str, status: u16, duration_secs: f64) {
    counter!(
        HTTP_REQUESTS_TOTAL,
        "method" => method.to_string(),
        "endpoint" => endpoint.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(
        HTTP_REQUEST_DURATION_SECONDS,
        "method" => method.to_string(),
        "endpoint" => endpoint.to_string()
    )
    .record(duration_secs);
}

/// Record database query duration
pub fn record_db_query(operation: &str, duration_secs: f64) {
    histogram!(
        DB_QUERY_DURATION_SECONDS,
        "operation" => operation.to_string()
    )
    .record(duration_secs);
}

pub fn set_stock_level(part_id: i64, level: u32) {
    gauge!(STOCK_LEVEL, "part_id" => part_id.to_string()).set(f64::from(level));
}

/// `kind` is one of decrease, increase, set
pub fn record_stock_adjustment(kind: &'static str, success: bool) {
    let status = if success { "success" } else { "failed" };
    counter!(
        STOCK_ADJUSTMENTS_TOTAL,
        "kind" => kind,
        "status" => status
    )
    .increment(1);
}

pub fn record_permission_denied(resource: Resource, operation: Operation) {
    counter!(
        PERMISSION_DENIED_TOTAL,
        "resource" => resource.as_str(),
        "operation" => operation.as_str()
    )
    .increment(1);
}

pub fn record_error(kind: ErrorKind) {
    counter!(ERRORS_TOTAL, "kind" => kind.as_str()).increment(1);
}
