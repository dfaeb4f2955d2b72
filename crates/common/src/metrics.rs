//! Metrics collection for QGate
//!
//! This module provides Prometheus metrics for observability.
//! Selection counters are updated on every request and never take a lock.

use lazy_static::lazy_static;
use prometheus::{Histogram, IntCounter, IntCounterVec, IntGauge, Opts, Registry};
use std::sync::Arc;

/// Metrics registry for QGate
#[derive(Debug, Clone)]
pub struct MetricsRegistry {
    pub registry: Arc<Registry>,
    pub coordinator: RegistryMetrics,
}

/// Coordinator registry metrics
#[derive(Debug, Clone)]
pub struct RegistryMetrics {
    /// Coordinators handed out
    pub selections: IntCounter,

    /// Selections rejected because the registry was empty
    pub no_coordinator: IntCounter,

    /// Selections retried after racing a removal
    pub selection_retries: IntCounter,

    /// Coordinators currently registered
    pub coordinators: IntGauge,

    /// Liveness probes issued
    pub probes: IntCounter,

    /// Liveness probes that reported not active
    pub probe_failures: IntCounter,

    /// Liveness probe duration
    pub probe_duration: Histogram,

    /// Failed add/remove/reload calls by error kind
    pub admin_failures: IntCounterVec,
}

lazy_static! {
    /// Global metrics registry instance
    pub static ref METRICS: MetricsRegistry = MetricsRegistry::new();
}

impl MetricsRegistry {
    /// Create a new metrics registry
    pub fn new() -> Self {
        let registry = Arc::new(Registry::new());

        let selections = IntCounter::new(
            "registry_selections_total",
            "Total number of coordinators selected"
        ).unwrap();

        let no_coordinator = IntCounter::new(
            "registry_no_coordinator_total",
            "Total selections rejected because no coordinator was registered"
        ).unwrap();

        let selection_retries = IntCounter::new(
            "registry_selection_retries_total",
            "Total selections retried after a concurrent removal"
        ).unwrap();

        let coordinators = IntGauge::new(
            "registry_coordinators",
            "Current number of registered coordinators"
        ).unwrap();

        let probes = IntCounter::new(
            "registry_probes_total",
            "Total number of liveness probes"
        ).unwrap();

        let probe_failures = IntCounter::new(
            "registry_probe_failures_total",
            "Total number of liveness probes reporting not active"
        ).unwrap();

        let probe_duration = Histogram::with_opts(
            prometheus::HistogramOpts::new(
                "registry_probe_duration_seconds",
                "Liveness probe duration in seconds"
            ).buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5])
        ).unwrap();

        let admin_failures = IntCounterVec::new(
            Opts::new(
                "registry_admin_failures_total",
                "Total failed administrative operations by error kind"
            ),
            &["kind"],
        ).unwrap();

        // Register all metrics
        registry.register(Box::new(selections.clone())).unwrap();
        registry.register(Box::new(no_coordinator.clone())).unwrap();
        registry.register(Box::new(selection_retries.clone())).unwrap();
        registry.register(Box::new(coordinators.clone())).unwrap();
        registry.register(Box::new(probes.clone())).unwrap();
        registry.register(Box::new(probe_failures.clone())).unwrap();
        registry.register(Box::new(probe_duration.clone())).unwrap();
        registry.register(Box::new(admin_failures.clone())).unwrap();

        let coordinator = RegistryMetrics {
            selections,
            no_coordinator,
            selection_retries,
            coordinators,
            probes,
            probe_failures,
            probe_duration,
            admin_failures,
        };

        MetricsRegistry {
            registry,
            coordinator,
        }
    }

    /// Gather all metrics as text
    pub fn gather(&self) -> String {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            return format!("# metrics encoding failed: {}\n", e);
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistryMetrics {
    /// Count a failed administrative operation
    pub fn record_admin_failure(&self, kind: &str) {
        self.admin_failures.with_label_values(&[kind]).inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_registry() {
        let metrics = MetricsRegistry::new();

        metrics.coordinator.selections.inc();
        metrics.coordinator.coordinators.set(3);
        metrics.coordinator.record_admin_failure("removal_failed");

        let output = metrics.gather();
        assert!(output.contains("registry_selections_total"));
        assert!(output.contains("registry_coordinators 3"));
        assert!(output.contains("kind=\"removal_failed\""));
    }
}
