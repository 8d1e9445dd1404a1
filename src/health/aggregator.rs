// src/health/aggregator.rs
use crate::config::HealthCheckConfig;
use crate::health::probe::probe;
use crate::health::{AggregateStatus, HealthResult, Target};
use crate::metrics::MetricsCollector;
use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{watch, OnceCell};
use tracing::{debug, error, info, warn};

use super::HealthProvider;

#[derive(Debug, thiserror::Error)]
pub enum HealthError {
    #[error("Failed to create HTTP client: {0}")]
    ClientBuild(#[from] reqwest::Error),

    #[error("Duplicate target name: {0}")]
    DuplicateTarget(String),

    #[error("Health check cancelled")]
    Cancelled,
}

/// Fans a health probe out to every target and folds the results into one verdict.
pub struct CompositeHealthIndicator {
    targets: Vec<Target>,
    config: Arc<HealthCheckConfig>,
    client: OnceCell<Client>,
    metrics: Option<Arc<MetricsCollector>>,
}

impl CompositeHealthIndicator {
    pub fn new(targets: Vec<Target>, config: HealthCheckConfig) -> Result<Self, HealthError> {
        let mut seen = HashSet::new();
        for target in &targets {
            if !seen.insert(target.name.as_str()) {
                return Err(HealthError::DuplicateTarget(target.name.clone()));
            }
        }

        Ok(Self {
            targets,
            config: Arc::new(config),
            client: OnceCell::new(),
            metrics: None,
        })
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    pub fn config(&self) -> &HealthCheckConfig {
        &self.config
    }

    /// Shared client, built on first use. A failed build is retried on the next call.
    async fn client(&self) -> Result<&Client, HealthError> {
        self.client
            .get_or_try_init(|| async {
                debug!("Creating health check HTTP client");
                Client::builder()
                    .timeout(self.config.timeout())
                    .connect_timeout(self.config.timeout())
                    .build()
            })
            .await
            .map_err(HealthError::from)
    }

    /// Probe every target concurrently and wait for all of them.
    pub async fn check_health(&self) -> Result<AggregateStatus, HealthError> {
        let client = self.client().await?;
        let mut tasks = Vec::with_capacity(self.targets.len());

        for target in &self.targets {
            let client = client.clone();
            let config = self.config.clone();
            let target = target.clone();
            let metrics = self.metrics.clone();

            tasks.push(tokio::spawn(async move {
                let start = Instant::now();
                let result = probe(&client, &target, &config).await;
                if let Some(metrics) = &metrics {
                    metrics.record_probe(&result, start.elapsed());
                }
                result
            }));
        }

        let joined = futures::future::join_all(tasks).await;

        // zip keeps every target even when its task died
        let results = self
            .targets
            .iter()
            .zip(joined)
            .map(|(target, joined)| match joined {
                Ok(result) => result,
                Err(e) => {
                    error!("Probe task for {} failed: {}", target.name, e);
                    HealthResult::down(&target.name, format!("Probe task failed: {}", e))
                }
            });

        let aggregate = AggregateStatus::from_results(results);

        for result in aggregate.down_targets() {
            warn!(
                "Target {} is down: {}",
                result.target,
                result.error.as_deref().unwrap_or("unknown error")
            );
        }

        if let Some(metrics) = &self.metrics {
            metrics.record_check(&aggregate);
        }

        debug!(
            "Health check complete: {} up, {} down, overall {}",
            aggregate.up_count(),
            aggregate.components.len() - aggregate.up_count(),
            aggregate.status
        );

        Ok(aggregate)
    }

    /// Like [`check_health`](Self::check_health), but gives up with
    /// [`HealthError::Cancelled`] once `true` is sent on `cancel`.
    /// Probes already in flight still finish within their own timeout.
    pub async fn check_health_until(
        &self,
        mut cancel: watch::Receiver<bool>,
    ) -> Result<AggregateStatus, HealthError> {
        tokio::select! {
            result = self.check_health() => result,
            _ = cancelled(&mut cancel) => {
                info!("Health check cancelled by caller");
                Err(HealthError::Cancelled)
            }
        }
    }

    /// Probe a single target by name; `None` when it is not configured.
    pub async fn check_component(&self, name: &str) -> Result<Option<HealthResult>, HealthError> {
        let Some(target) = self.targets.iter().find(|t| t.name == name) else {
            return Ok(None);
        };

        let client = self.client().await?;
        let start = Instant::now();
        let result = probe(client, target, &self.config).await;
        if let Some(metrics) = &self.metrics {
            metrics.record_probe(&result, start.elapsed());
        }

        Ok(Some(result))
    }
}

async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    loop {
        if *cancel.borrow() {
            return;
        }
        if cancel.changed().await.is_err() {
            // sender gone: nobody can cancel any more
            std::future::pending::<()>().await;
        }
    }
}

#[async_trait]
impl HealthProvider for CompositeHealthIndicator {
    async fn check_health(&self) -> Result<AggregateStatus, HealthError> {
        CompositeHealthIndicator::check_health(self).await
    }

    async fn check_component(&self, name: &str) -> Result<Option<HealthResult>, HealthError> {
        CompositeHealthIndicator::check_component(self, name).await
    }
}
