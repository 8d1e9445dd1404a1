// src/health/mod.rs
mod aggregator;
mod monitor;
mod probe;
mod provider;
mod status;
mod target;

pub use aggregator::{CompositeHealthIndicator, HealthError};
pub use monitor::HealthMonitor;
pub use probe::{probe, ProbeError};
pub use provider::HealthProvider;
pub use status::{AggregateStatus, HealthResult, HealthStatus};
pub use target::Target;
