//! Metrics and observability utilities
//!
//! Provides Prometheus metrics with SLO-aligned histograms
//! and standardized naming conventions.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all Quotebook metrics
pub const METRICS_PREFIX: &str = "quotebook";

/// SLO-aligned histogram buckets for request latency (in seconds)
/// Targets: P50 < 50ms, P99 < 250ms
pub const LATENCY_BUCKETS: &[f64] = &[
    0.001, // 1ms
    0.005, // 5ms
    0.010, // 10ms
    0.025, // 25ms
    0.050, // 50ms - P50 target
    0.100, // 100ms
    0.250, // 250ms - P99 target
    0.500, // 500ms
    1.000, // 1s
    2.500, // 2.5s
    5.000, // 5s
];

/// Register all metric descriptions
pub fn register_metrics() {
    // Request metrics
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    describe_counter!(
        format!("{}_rate_limited_total", METRICS_PREFIX),
        Unit::Count,
        "Requests rejected by the rate limiter"
    );

    // Content metrics
    describe_counter!(
        format!("{}_content_operations_total", METRICS_PREFIX),
        Unit::Count,
        "Content lifecycle operations by kind and operation"
    );

    // Queue metrics
    describe_counter!(
        format!("{}_queue_messages_sent_total", METRICS_PREFIX),
        Unit::Count,
        "Messages accepted by an outbox"
    );

    describe_counter!(
        format!("{}_queue_messages_dropped_total", METRICS_PREFIX),
        Unit::Count,
        "Messages dropped because an outbox was full or closed"
    );

    describe_counter!(
        format!("{}_queue_messages_processed_total", METRICS_PREFIX),
        Unit::Count,
        "Messages delivered to their handler"
    );

    describe_counter!(
        format!("{}_queue_messages_failed_total", METRICS_PREFIX),
        Unit::Count,
        "Messages abandoned after retries"
    );

    // Search index metrics
    describe_counter!(
        format!("{}_search_index_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Search index update and delete calls"
    );

    // Cache metrics
    describe_counter!(
        format!("{}_cache_hits_total", METRICS_PREFIX),
        Unit::Count,
        "Total cache hits"
    );

    describe_counter!(
        format!("{}_cache_misses_total", METRICS_PREFIX),
        Unit::Count,
        "Total cache misses"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record request metrics
pub struct RequestMetrics {
    start: Instant,
    endpoint: String,
    method: String,
}

impl RequestMetrics {
    /// Start tracking a request
    pub fn start(method: &str, endpoint: &str) -> Self {
        Self {
            start: Instant::now(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
        }
    }

    /// Record request completion
    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_request_duration_seconds", METRICS_PREFIX),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

/// Record a content lifecycle operation
pub fn record_content_op(kind: &str, op: &str) {
    counter!(
        format!("{}_content_operations_total", METRICS_PREFIX),
        "kind" => kind.to_string(),
        "op" => op.to_string()
    )
    .increment(1);
}

/// Record an outbox send attempt
pub fn record_queue_send(queue: &str, accepted: bool) {
    let name = if accepted {
        "queue_messages_sent_total"
    } else {
        "queue_messages_dropped_total"
    };
    counter!(
        format!("{}_{}", METRICS_PREFIX, name),
        "queue" => queue.to_string()
    )
    .increment(1);
}

/// Record the final outcome of a dispatched message
pub fn record_queue_delivery(queue: &str, success: bool) {
    let name = if success {
        "queue_messages_processed_total"
    } else {
        "queue_messages_failed_total"
    };
    counter!(
        format!("{}_{}", METRICS_PREFIX, name),
        "queue" => queue.to_string()
    )
    .increment(1);
}

/// Record a search index call
pub fn record_search_index(action: &str, success: bool) {
    let status = if success { "success" } else { "error" };
    counter!(
        format!("{}_search_index_requests_total", METRICS_PREFIX),
        "action" => action.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Helper to record cache metrics
pub fn record_cache(hit: bool, cache_name: &str) {
    if hit {
        counter!(
            format!("{}_cache_hits_total", METRICS_PREFIX),
            "cache" => cache_name.to_string()
        )
        .increment(1);
    } else {
        counter!(
            format!("{}_cache_misses_total", METRICS_PREFIX),
            "cache" => cache_name.to_string()
        )
        .increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latency_buckets() {
        let mut prev = 0.0;
        for &bucket in LATENCY_BUCKETS {
            assert!(bucket > prev);
            prev = bucket;
        }
        assert!(LATENCY_BUCKETS.contains(&0.050));
    }

    #[test]
    fn test_recorders_without_exporter() {
        // No recorder installed: calls must be no-ops
        RequestMetrics::start("GET", "/v1/quotes").finish(200);
        record_content_op("quote", "close");
        record_queue_send("activity", false);
        record_queue_delivery("activity", true);
        record_search_index("update", true);
        record_cache(true, "sitemap");
    }
}
