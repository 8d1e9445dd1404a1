// src/health/provider.rs
use crate::health::{AggregateStatus, HealthError, HealthResult};
use async_trait::async_trait;

/// Anything that can answer the aggregated health question for the HTTP surface.
#[async_trait]
pub trait HealthProvider: Send + Sync {
    async fn check_health(&self) -> Result<AggregateStatus, HealthError>;

    async fn check_component(&self, name: &str) -> Result<Option<HealthResult>, HealthError>;
}
