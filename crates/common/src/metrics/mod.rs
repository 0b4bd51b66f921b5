//! Metrics and observability utilities
//!
//! Provides Prometheus metrics for the query pipeline and the HTTP surface,
//! with standardized naming conventions.

use metrics::{
    counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit,
};
use std::time::Instant;

/// Metrics prefix for all GraphRAG metrics
pub const METRICS_PREFIX: &str = "graphrag";

/// Histogram buckets for pipeline stages (in seconds)
/// Retrieval stages are dominated by network round trips; synthesis streams for seconds.
pub const STAGE_BUCKETS: &[f64] = &[
    0.010,  // 10ms
    0.050,  // 50ms
    0.100,  // 100ms
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    2.500,  // 2.5s
    5.000,  // 5s
    10.00,  // 10s
    30.00,  // 30s
    60.00,  // 60s
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

    // Pipeline metrics
    describe_counter!(
        format!("{}_queries_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of queries entering the pipeline"
    );

    describe_histogram!(
        format!("{}_stage_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Pipeline stage latency in seconds"
    );

    describe_counter!(
        format!("{}_external_call_errors_total", METRICS_PREFIX),
        Unit::Count,
        "External collaborator calls that degraded to an empty result"
    );

    describe_gauge!(
        format!("{}_evidence_items", METRICS_PREFIX),
        Unit::Count,
        "Evidence items after fusion and after ranking"
    );

    describe_counter!(
        format!("{}_synthesis_total", METRICS_PREFIX),
        Unit::Count,
        "Synthesis outcomes (completed, failed, fallback, cancelled)"
    );

    // Embedding metrics
    describe_counter!(
        format!("{}_embedding_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total embedding API requests"
    );

    describe_histogram!(
        format!("{}_embedding_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Embedding generation latency in seconds"
    );

    // Session metrics
    describe_gauge!(
        format!("{}_active_sessions", METRICS_PREFIX),
        Unit::Count,
        "Conversation sessions currently held in memory"
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

/// Count a query entering the pipeline
pub fn record_query() {
    counter!(format!("{}_queries_total", METRICS_PREFIX)).increment(1);
}

/// Helper to record a pipeline stage duration
pub fn record_stage(stage: &str, duration_secs: f64) {
    histogram!(
        format!("{}_stage_duration_seconds", METRICS_PREFIX),
        "stage" => stage.to_string()
    )
    .record(duration_secs);
}

/// Helper to record an external call that was absorbed by the pipeline
pub fn record_external_error(service: &str) {
    counter!(
        format!("{}_external_call_errors_total", METRICS_PREFIX),
        "service" => service.to_string()
    )
    .increment(1);
}

/// Helper to record evidence set sizes
pub fn record_evidence(stage: &str, count: usize) {
    gauge!(
        format!("{}_evidence_items", METRICS_PREFIX),
        "stage" => stage.to_string()
    )
    .set(count as f64);
}

/// Helper to record how a synthesis ended
pub fn record_synthesis(outcome: &str) {
    counter!(
        format!("{}_synthesis_total", METRICS_PREFIX),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Helper to record embedding metrics
pub fn record_embedding(duration_secs: f64, model: &str, success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(
        format!("{}_embedding_requests_total", METRICS_PREFIX),
        "model" => model.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    if success {
        histogram!(
            format!("{}_embedding_duration_seconds", METRICS_PREFIX),
            "model" => model.to_string()
        )
        .record(duration_secs);
    }
}

/// Helper to record the session gauge
pub fn record_sessions(active: usize) {
    gauge!(format!("{}_active_sessions", METRICS_PREFIX)).set(active as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_buckets_sorted() {
        let mut prev = 0.0;
        for &bucket in STAGE_BUCKETS {
            assert!(bucket > prev);
            prev = bucket;
        }
    }

    #[test]
    fn test_recorders_without_exporter() {
        // No recorder installed: every helper must be a no-op
        let metrics = RequestMetrics::start("POST", "/v1/sessions/{id}/chat");
        metrics.finish(200);
        record_query();
        record_stage("retrieve", 0.12);
        record_external_error("vector_store");
        record_evidence("fused", 7);
        record_synthesis("completed");
        record_embedding(0.05, "nomic-embed-text", true);
        record_sessions(3);
    }
}
