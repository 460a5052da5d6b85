//! Prometheus Metrics Definitions
//!
//! HTTP request metrics are recorded per request. Cache metrics mirror the
//! read-through cache's own counters and are refreshed when `/metrics` is
//! scraped.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge, register_histogram_vec, register_int_counter,
    register_int_gauge_vec, CounterVec, Encoder, Gauge, HistogramVec, IntCounter, IntGaugeVec,
    TextEncoder,
};
use sirius_storage::CacheStats;

use crate::catalog::CachedCatalog;
use crate::error::{ApiError, ApiResult};

/// HTTP request latency buckets (seconds)
/// Covers: 1ms, 5ms, 10ms, 25ms, 50ms, 100ms, 250ms, 500ms, 1s, 2.5s, 5s, 10s
const HTTP_LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0, 10.0,
];

/// Global metrics instance - initialized once at startup
pub static METRICS: Lazy<ApiResult<SiriusMetrics>> = Lazy::new(SiriusMetrics::new);

/// Container for all Sirius metrics.
#[derive(Clone)]
pub struct SiriusMetrics {
    /// HTTP request counter - labels: method, route, status
    pub http_requests_total: CounterVec,

    /// HTTP request duration histogram - labels: method, route
    pub http_request_duration_seconds: HistogramVec,

    /// Cache counters snapshot - labels: outcome
    pub cache_operations: IntGaugeVec,

    /// Share of cache lookups answered without the store
    pub cache_hit_ratio: Gauge,

    /// Cache keys that could not be evicted after a committed mutation
    pub cache_invalidation_failures_total: IntCounter,
}

fn registration_error(name: &str, e: prometheus::Error) -> ApiError {
    ApiError::internal_error(format!("Failed to register {}: {}", name, e))
}

impl SiriusMetrics {
    /// Create and register all metrics with Prometheus.
    pub fn new() -> ApiResult<Self> {
        Ok(Self {
            http_requests_total: register_counter_vec!(
                "sirius_http_requests_total",
                "Total number of HTTP requests",
                &["method", "route", "status"]
            )
            .map_err(|e| registration_error("http_requests_total", e))?,

            http_request_duration_seconds: register_histogram_vec!(
                "sirius_http_request_duration_seconds",
                "HTTP request duration in seconds",
                &["method", "route"],
                HTTP_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| registration_error("http_request_duration_seconds", e))?,

            cache_operations: register_int_gauge_vec!(
                "sirius_cache_operations",
                "Read-through cache counters since start-up",
                &["outcome"]
            )
            .map_err(|e| registration_error("cache_operations", e))?,

            cache_hit_ratio: register_gauge!(
                "sirius_cache_hit_ratio",
                "Fraction of cache lookups served without a store call"
            )
            .map_err(|e| registration_error("cache_hit_ratio", e))?,

            cache_invalidation_failures_total: register_int_counter!(
                "sirius_cache_invalidation_failures_total",
                "Cache keys left unevicted after a committed mutation"
            )
            .map_err(|e| registration_error("cache_invalidation_failures_total", e))?,
        })
    }

    /// Record an HTTP request.
    pub fn record_http_request(&self, method: &str, route: &str, status: u16, duration_secs: f64) {
        let status_str = status.to_string();
        self.http_requests_total
            .with_label_values(&[method, route, status_str.as_str()])
            .inc();
        self.http_request_duration_seconds
            .with_label_values(&[method, route])
            .observe(duration_secs);
    }

    /// Copy a cache counters snapshot into the gauges.
    pub fn observe_cache(&self, stats: &CacheStats) {
        let outcomes = [
            ("hit", stats.hits),
            ("negative_hit", stats.negative_hits),
            ("miss", stats.misses),
            ("backend_error", stats.backend_errors),
            ("eviction", stats.evictions),
        ];
        for (outcome, value) in outcomes {
            self.cache_operations
                .with_label_values(&[outcome])
                .set(i64::try_from(value).unwrap_or(i64::MAX));
        }
        self.cache_hit_ratio.set(stats.hit_rate());
    }

    pub fn record_invalidation_failures(&self, keys: usize) {
        self.cache_invalidation_failures_total.inc_by(keys as u64);
    }
}

/// Count keys an invalidation pass failed to evict.
pub fn record_invalidation_failures(keys: usize) {
    if let Ok(metrics) = METRICS.as_ref() {
        metrics.record_invalidation_failures(keys);
    }
}

/// Handler for GET /metrics endpoint.
///
/// Returns Prometheus text format metrics.
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/metrics",
    tag = "Observability",
    responses(
        (status = 200, description = "Prometheus metrics in text format", content_type = "text/plain"),
        (status = 500, description = "Failed to encode metrics"),
    ),
))]
pub async fn metrics_handler(State(catalog): State<CachedCatalog>) -> impl IntoResponse {
    match METRICS.as_ref() {
        Ok(metrics) => metrics.observe_cache(&catalog.cache_stats()),
        Err(e) => tracing::warn!(error = %e, "Metrics registry unavailable"),
    }

    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    match encoder.encode(&metric_families, &mut buffer) {
        Ok(_) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                format!("Failed to encode metrics: {}", e).into_bytes(),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::core::Collector;

    fn metrics() -> Result<&'static SiriusMetrics, String> {
        METRICS
            .as_ref()
            .map_err(|e| format!("Metrics init failed: {}", e.message))
    }

    #[test]
    fn test_metrics_creation() -> Result<(), String> {
        let metrics = metrics()?;
        assert!(!metrics.http_requests_total.desc().is_empty());
        Ok(())
    }

    #[test]
    fn test_record_http_request() -> Result<(), String> {
        let metrics = metrics()?;
        metrics.record_http_request("GET", "/dishes/:id", 200, 0.015);
        let count = metrics
            .http_requests_total
            .with_label_values(&["GET", "/dishes/:id", "200"])
            .get();
        assert!(count >= 1.0);
        Ok(())
    }

    #[test]
    fn test_observe_cache_snapshot() -> Result<(), String> {
        let metrics = metrics()?;
        let stats = CacheStats {
            hits: 3,
            negative_hits: 1,
            misses: 4,
            backend_errors: 0,
            evictions: 2,
        };
        metrics.observe_cache(&stats);
        assert_eq!(metrics.cache_operations.with_label_values(&["hit"]).get(), 3);
        assert_eq!(metrics.cache_operations.with_label_values(&["eviction"]).get(), 2);
        assert!((metrics.cache_hit_ratio.get() - stats.hit_rate()).abs() < f64::EPSILON);
        Ok(())
    }

    #[test]
    fn test_invalidation_failures_accumulate() -> Result<(), String> {
        let metrics = metrics()?;
        let before = metrics.cache_invalidation_failures_total.get();
        record_invalidation_failures(2);
        assert!(metrics.cache_invalidation_failures_total.get() >= before + 2);
        Ok(())
    }
}
