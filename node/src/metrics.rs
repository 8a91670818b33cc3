//! # Prometheus Metrics
//!
//! Exposes operational metrics for the wallet node. Scraped by Prometheus
//! at the `/metrics` HTTP endpoint on the configured metrics port.
//!
//! All metrics are registered in a dedicated [`prometheus::Registry`] so
//! they do not collide with any default global registry consumers.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Registry, TextEncoder};
use std::sync::Arc;

/// Holds all Prometheus metric handles for the node.
///
/// Clone-friendly (wraps `Arc` internally via prometheus handles) so it
/// can be shared across request handlers and background tasks.
#[derive(Clone)]
pub struct NodeMetrics {
    /// Prometheus registry that owns all metrics below.
    registry: Registry,
    /// Total number of color resolutions served.
    pub resolutions_total: IntCounter,
    /// Current number of entries in the resolution cache.
    pub resolution_cache_entries: IntGauge,
    /// Total number of transactions indexed into the local store.
    pub transactions_indexed_total: IntCounter,
    /// Current number of transactions held by the local store.
    pub store_transactions: IntGauge,
    /// Number of asset definitions in the registry.
    pub assets_registered: IntGauge,
    /// Total number of unsigned drafts composed (transfers and issuances).
    pub drafts_composed_total: IntCounter,
    /// Histogram of resolution latency in seconds.
    pub resolution_latency_seconds: Histogram,
}

impl NodeMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Self {
        let registry = Registry::new_custom(Some("chroma".into()), None)
            .expect("failed to create prometheus registry");

        let resolutions_total = IntCounter::new(
            "resolutions_total",
            "Total number of color resolutions served",
        )
        .expect("metric creation");
        registry
            .register(Box::new(resolutions_total.clone()))
            .expect("metric registration");

        let resolution_cache_entries = IntGauge::new(
            "resolution_cache_entries",
            "Current number of entries in the resolution cache",
        )
        .expect("metric creation");
        registry
            .register(Box::new(resolution_cache_entries.clone()))
            .expect("metric registration");

        let transactions_indexed_total = IntCounter::new(
            "transactions_indexed_total",
            "Total number of transactions indexed into the local store",
        )
        .expect("metric creation");
        registry
            .register(Box::new(transactions_indexed_total.clone()))
            .expect("metric registration");

        let store_transactions = IntGauge::new(
            "store_transactions",
            "Current number of transactions held by the local store",
        )
        .expect("metric creation");
        registry
            .register(Box::new(store_transactions.clone()))
            .expect("metric registration");

        let assets_registered = IntGauge::new(
            "assets_registered",
            "Number of asset definitions in the registry",
        )
        .expect("metric creation");
        registry
            .register(Box::new(assets_registered.clone()))
            .expect("metric registration");

        let drafts_composed_total = IntCounter::new(
            "drafts_composed_total",
            "Total number of unsigned drafts composed",
        )
        .expect("metric creation");
        registry
            .register(Box::new(drafts_composed_total.clone()))
            .expect("metric registration");

        let resolution_latency_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "resolution_latency_seconds",
                "End-to-end color resolution latency in seconds",
            )
            .buckets(vec![
                0.0001, 0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
            ]),
        )
        .expect("metric creation");
        registry
            .register(Box::new(resolution_latency_seconds.clone()))
            .expect("metric registration");

        Self {
            registry,
            resolutions_total,
            resolution_cache_entries,
            transactions_indexed_total,
            store_transactions,
            assets_registered,
            drafts_composed_total,
            resolution_latency_seconds,
        }
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer).expect("prometheus output is valid utf-8"))
    }
}

impl Default for NodeMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared metrics state passed to axum handlers via extension.
pub type SharedMetrics = Arc<NodeMetrics>;

/// Axum handler that renders `/metrics` in Prometheus text format.
///
/// Returns HTTP 500 if encoding fails (should never happen in practice).
pub async fn metrics_handler(
    axum::extract::State(metrics): axum::extract::State<SharedMetrics>,
) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_register_and_encode() {
        let metrics = NodeMetrics::new();
        metrics.resolutions_total.inc();
        metrics.resolution_cache_entries.set(7);
        metrics.drafts_composed_total.inc_by(3);

        let text = metrics.encode().unwrap();
        assert!(text.contains("chroma_resolutions_total 1"));
        assert!(text.contains("chroma_resolution_cache_entries 7"));
        assert!(text.contains("chroma_drafts_composed_total 3"));
    }
}
