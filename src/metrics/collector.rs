// src/metrics/collector.rs
use crate::health::{AggregateStatus, HealthResult};
use anyhow::Result;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;
use std::time::Duration;

pub struct MetricsRegistry {
    registry: Registry,
    collector: Arc<MetricsCollector>,
}

impl MetricsRegistry {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        let collector = Arc::new(MetricsCollector::new(&registry)?);

        Ok(Self {
            registry,
            collector,
        })
    }

    pub fn collector(&self) -> Arc<MetricsCollector> {
        self.collector.clone()
    }

    /// Text exposition of every registered metric.
    pub fn gather(&self) -> Result<Vec<u8>> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(buffer)
    }
}

pub struct MetricsCollector {
    // Probe metrics
    pub probes_total: IntCounterVec,
    pub probe_duration_seconds: HistogramVec,
    pub target_up: IntGaugeVec,

    // Aggregate metrics
    pub checks_total: IntCounterVec,
    pub overall_up: IntGauge,
    pub targets_total: IntGauge,
}

impl MetricsCollector {
    pub fn new(registry: &Registry) -> Result<Self> {
        let probes_total = IntCounterVec::new(
            Opts::new("health_probes_total", "Total number of target probes"),
            &["target", "status"],
        )?;
        registry.register(Box::new(probes_total.clone()))?;

        let probe_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "health_probe_duration_seconds",
                "Target probe duration in seconds",
            ),
            &["target"],
        )?;
        registry.register(Box::new(probe_duration_seconds.clone()))?;

        let target_up = IntGaugeVec::new(
            Opts::new(
                "health_target_up",
                "Target health status (1=up, 0=down)",
            ),
            &["target"],
        )?;
        registry.register(Box::new(target_up.clone()))?;

        let checks_total = IntCounterVec::new(
            Opts::new("health_checks_total", "Total aggregate health checks"),
            &["status"],
        )?;
        registry.register(Box::new(checks_total.clone()))?;

        let overall_up = IntGauge::new(
            "health_overall_up",
            "Aggregate health status (1=up, 0=down)",
        )?;
        registry.register(Box::new(overall_up.clone()))?;

        let targets_total =
            IntGauge::new("health_targets_total", "Number of configured targets")?;
        registry.register(Box::new(targets_total.clone()))?;

        Ok(Self {
            probes_total,
            probe_duration_seconds,
            target_up,
            checks_total,
            overall_up,
            targets_total,
        })
    }

    pub fn record_probe(&self, result: &HealthResult, duration: Duration) {
        self.probes_total
            .with_label_values(&[result.target.as_str(), result.status.as_str()])
            .inc();

        self.probe_duration_seconds
            .with_label_values(&[result.target.as_str()])
            .observe(duration.as_secs_f64());

        self.target_up
            .with_label_values(&[result.target.as_str()])
            .set(if result.is_up() { 1 } else { 0 });
    }

    pub fn record_check(&self, aggregate: &AggregateStatus) {
        self.checks_total
            .with_label_values(&[aggregate.status.as_str()])
            .inc();
        self.overall_up.set(if aggregate.is_up() { 1 } else { 0 });
        self.targets_total.set(aggregate.components.len() as i64);
    }
}
