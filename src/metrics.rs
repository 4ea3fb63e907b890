// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Prometheus metrics for the Nacos bridge.
//!
//! Every metric carries the prefix `nacosbridge_io_` (prometheus-safe version
//! of "nacosbridge.io").
//!
//! # Metrics Categories
//!
//! - **Rebuild Metrics** - Cycles run by the scheduler and their outcome
//! - **Registry Metrics** - Register/deregister calls against each backend
//! - **Write-back Metrics** - Corrections applied to cluster objects
//! - **Cache Metrics** - Objects currently admitted into the cache
//!
//! # Example
//!
//! ```rust,no_run
//! use nacos_bridge::metrics::{gather_metrics, record_registry_operation};
//!
//! record_registry_operation("nacos", "register", true);
//! let text = gather_metrics().unwrap_or_default();
//! ```

use prometheus::{
    CounterVec, Encoder, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::sync::LazyLock;
use std::time::Duration;
use tracing::warn;

use crate::constants::{KIND_CONFIG_MAP, KIND_NODE, KIND_SERVICE};

// ============================================================================
// Metric Name Constants
// ============================================================================

/// Namespace prefix for all metrics (prometheus-safe)
const METRICS_NAMESPACE: &str = "nacosbridge_io";

// ============================================================================
// Global Metrics Registry
// ============================================================================

/// Global Prometheus metrics registry
///
/// All metrics are registered in this registry and exposed via `/metrics` endpoint.
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

/// Collectors, created and registered on first use.
///
/// `None` when registration failed; recording then becomes a no-op.
static METRICS: LazyLock<Option<Metrics>> = LazyLock::new(|| match Metrics::register() {
    Ok(metrics) => Some(metrics),
    Err(e) => {
        warn!(error = %e, "Failed to register metrics, metrics disabled");
        None
    }
});

struct Metrics {
    /// Labels: `outcome` (`success`, `partial`, `error`)
    rebuilds_total: CounterVec,
    /// Labels: `outcome`
    rebuild_duration_seconds: HistogramVec,
    /// Labels: `registry`, `operation` (`register`, `deregister`), `outcome`
    registry_operations_total: CounterVec,
    /// Labels: `kind`, `outcome` (`written`, `unchanged`, `failed`, `dropped`)
    write_backs_total: CounterVec,
    /// Labels: `kind`
    cached_objects: GaugeVec,
}

impl Metrics {
    fn register() -> Result<Self, prometheus::Error> {
        let rebuilds_total = CounterVec::new(
            Opts::new(
                format!("{METRICS_NAMESPACE}_rebuilds_total"),
                "Total number of rebuild cycles by outcome",
            ),
            &["outcome"],
        )?;

        let rebuild_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                format!("{METRICS_NAMESPACE}_rebuild_duration_seconds"),
                "Duration of rebuild cycles in seconds by outcome",
            )
            .buckets(vec![0.001, 0.01, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]),
            &["outcome"],
        )?;

        let registry_operations_total = CounterVec::new(
            Opts::new(
                format!("{METRICS_NAMESPACE}_registry_operations_total"),
                "Total number of registry calls by registry, operation and outcome",
            ),
            &["registry", "operation", "outcome"],
        )?;

        let write_backs_total = CounterVec::new(
            Opts::new(
                format!("{METRICS_NAMESPACE}_write_backs_total"),
                "Total number of write-back requests by kind and outcome",
            ),
            &["kind", "outcome"],
        )?;

        let cached_objects = GaugeVec::new(
            Opts::new(
                format!("{METRICS_NAMESPACE}_cached_objects"),
                "Number of objects admitted into the resource cache by kind",
            ),
            &["kind"],
        )?;

        METRICS_REGISTRY.register(Box::new(rebuilds_total.clone()))?;
        METRICS_REGISTRY.register(Box::new(rebuild_duration_seconds.clone()))?;
        METRICS_REGISTRY.register(Box::new(registry_operations_total.clone()))?;
        METRICS_REGISTRY.register(Box::new(write_backs_total.clone()))?;
        METRICS_REGISTRY.register(Box::new(cached_objects.clone()))?;

        Ok(Self {
            rebuilds_total,
            rebuild_duration_seconds,
            registry_operations_total,
            write_backs_total,
            cached_objects,
        })
    }
}

// ============================================================================
// Recording Helpers
// ============================================================================

/// Record a finished rebuild cycle
pub fn record_rebuild(outcome: &str, duration: Duration) {
    if let Some(m) = METRICS.as_ref() {
        m.rebuilds_total.with_label_values(&[outcome]).inc();
        m.rebuild_duration_seconds
            .with_label_values(&[outcome])
            .observe(duration.as_secs_f64());
    }
}

/// Record one register or deregister call against a registry backend
pub fn record_registry_operation(registry: &str, operation: &str, success: bool) {
    let outcome = if success { "success" } else { "error" };
    if let Some(m) = METRICS.as_ref() {
        m.registry_operations_total
            .with_label_values(&[registry, operation, outcome])
            .inc();
    }
}

/// Record the fate of one write-back request
pub fn record_write_back(kind: &str, outcome: &str) {
    if let Some(m) = METRICS.as_ref() {
        m.write_backs_total.with_label_values(&[kind, outcome]).inc();
    }
}

/// Publish the cache size, as returned by `ResourceCache::counts`
#[allow(clippy::cast_precision_loss)]
pub fn record_cache_counts((configmaps, services, nodes): (usize, usize, usize)) {
    if let Some(m) = METRICS.as_ref() {
        m.cached_objects
            .with_label_values(&[KIND_CONFIG_MAP])
            .set(configmaps as f64);
        m.cached_objects
            .with_label_values(&[KIND_SERVICE])
            .set(services as f64);
        m.cached_objects.with_label_values(&[KIND_NODE]).set(nodes as f64);
    }
}

/// Gather and encode all metrics in Prometheus text format
///
/// # Errors
/// Returns error if encoding fails
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    LazyLock::force(&METRICS);
    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(format!("UTF-8 error: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registered() -> &'static Metrics {
        METRICS.as_ref().unwrap()
    }

    #[test]
    fn test_record_rebuild() {
        let before = registered().rebuilds_total.with_label_values(&["success"]).get();

        record_rebuild("success", Duration::from_millis(250));

        let after = registered().rebuilds_total.with_label_values(&["success"]).get();
        assert!(after >= before + 1.0);
    }

    #[test]
    fn test_record_registry_operation_outcomes() {
        let failed = || {
            registered()
                .registry_operations_total
                .with_label_values(&["test-registry", "deregister", "error"])
                .get()
        };
        let before = failed();

        record_registry_operation("test-registry", "deregister", false);

        assert!(failed() >= before + 1.0);
    }

    #[test]
    fn test_record_cache_counts_exports_every_kind() {
        record_cache_counts((1, 7, 3));

        let output = gather_metrics().unwrap();
        for kind in ["ConfigMap", "Service", "Node"] {
            assert!(output.contains(&format!("nacosbridge_io_cached_objects{{kind=\"{kind}\"}}")));
        }
    }

    #[test]
    fn test_gather_metrics_contains_prefix() {
        record_write_back("TestKind", "written");

        let output = gather_metrics().unwrap();
        assert!(output.contains("nacosbridge_io_write_backs_total"));
    }
}
