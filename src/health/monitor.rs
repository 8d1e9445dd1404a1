// src/health/monitor.rs
use crate::health::{CompositeHealthIndicator, HealthStatus};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{error, info, warn};

/// Periodically re-runs the composite check so transitions show up in logs
/// and metrics without anyone calling the HTTP endpoint.
pub struct HealthMonitor {
    indicator: Arc<CompositeHealthIndicator>,
    period: Duration,
    last_verdict: RwLock<Option<(HealthStatus, DateTime<Utc>)>>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl HealthMonitor {
    pub fn new(indicator: Arc<CompositeHealthIndicator>, period: Duration) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Self {
            indicator,
            period,
            last_verdict: RwLock::new(None),
            shutdown_tx,
            shutdown_rx,
        }
    }

    pub async fn start(self: Arc<Self>) {
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut shutdown_rx = self.shutdown_rx.clone();

        info!("Starting health monitor with interval: {:?}", self.period);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.run_once().await;
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Health monitor shutting down");
                        break;
                    }
                }
            }
        }
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Run one check and return the overall status, if the check completed.
    pub async fn run_once(&self) -> Option<HealthStatus> {
        let aggregate = match self.indicator.check_health().await {
            Ok(aggregate) => aggregate,
            Err(e) => {
                error!("Health monitor check failed: {}", e);
                return None;
            }
        };

        let now = Utc::now();
        let mut last = self.last_verdict.write().await;

        let previous = *last;

        match previous {
            Some((previous, since)) if previous != aggregate.status => {
                let message = format!(
                    "Overall health changed {} -> {} (previous verdict since {})",
                    previous,
                    aggregate.status,
                    since.to_rfc3339()
                );
                if aggregate.is_up() {
                    info!("{}", message);
                } else {
                    warn!("{}", message);
                }
                *last = Some((aggregate.status, now));
            }
            Some(_) => {}
            None => {
                info!("Initial overall health: {}", aggregate.status);
                *last = Some((aggregate.status, now));
            }
        }

        Some(aggregate.status)
    }

    /// Last observed overall status and when it was first seen.
    pub async fn last_verdict(&self) -> Option<(HealthStatus, DateTime<Utc>)> {
        *self.last_verdict.read().await
    }
}
