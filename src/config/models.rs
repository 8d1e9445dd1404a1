// src/config/models.rs
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::time::Duration;
use url::Url;

/// Services polled when no target list is configured.
const DEFAULT_TARGETS: [&str; 5] = [
    "auth-server",
    "product",
    "recommendation",
    "review",
    "product-composite",
];
const DEFAULT_TARGET_PORT: u16 = 4004;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub health: HealthCheckConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default = "default_targets")]
    pub targets: Vec<TargetConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            health: HealthCheckConfig::default(),
            metrics: MetricsConfig::default(),
            targets: default_targets(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.targets.is_empty() {
            bail!("At least one health check target must be configured");
        }

        let mut seen = HashSet::new();
        for target in &self.targets {
            if target.name.trim().is_empty() {
                bail!("Target name must not be empty (url: {})", target.url);
            }
            if !is_path_segment(&target.name) {
                bail!(
                    "Target name {:?} must be a single URL path segment (letters, digits, '-', '_', '.')",
                    target.name
                );
            }
            if !seen.insert(target.name.as_str()) {
                bail!("Duplicate target name: {}", target.name);
            }
            if !matches!(target.url.scheme(), "http" | "https") {
                bail!(
                    "Target {} must use http or https, got {}",
                    target.name,
                    target.url.scheme()
                );
            }
        }

        self.server.validate()?;
        self.health.validate()?;
        self.metrics.validate()?;

        if self.metrics.enabled && self.metrics.port == self.server.listen_addr.port() {
            bail!(
                "Metrics port {} collides with the health server port",
                self.metrics.port
            );
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    pub name: String,
    pub url: Url,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
    /// Path the aggregated health document is served on.
    #[serde(default = "default_health_path")]
    pub health_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            health_path: default_health_path(),
        }
    }
}

impl ServerConfig {
    fn validate(&self) -> Result<()> {
        validate_path("server.health_path", &self.health_path)?;
        if self.health_path.len() > 1 && self.health_path.ends_with('/') {
            bail!("server.health_path must not end with '/'");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckConfig {
    /// Path appended to every target's base URL.
    #[serde(default = "default_probe_path")]
    pub path: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Require a `{"status": "UP"}` body instead of accepting any 2xx.
    #[serde(default)]
    pub strict: bool,
    /// Background monitor period; the monitor is off when unset.
    #[serde(default)]
    pub monitor_interval_secs: Option<u64>,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            path: default_probe_path(),
            timeout_ms: default_timeout_ms(),
            strict: false,
            monitor_interval_secs: None,
        }
    }
}

impl HealthCheckConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn monitor_interval(&self) -> Option<Duration> {
        self.monitor_interval_secs.map(Duration::from_secs)
    }

    fn validate(&self) -> Result<()> {
        validate_path("health.path", &self.path)?;
        if self.timeout_ms == 0 {
            bail!("health.timeout_ms must be greater than zero");
        }
        if self.monitor_interval_secs == Some(0) {
            bail!("health.monitor_interval_secs must be greater than zero");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_metrics_port")]
    pub port: u16,
    #[serde(default = "default_metrics_path")]
    pub path: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: default_metrics_port(),
            path: default_metrics_path(),
        }
    }
}

impl MetricsConfig {
    fn validate(&self) -> Result<()> {
        validate_path("metrics.path", &self.path)
    }
}

/// Names are served as `{health_path}/{name}`, so they must fit in one segment.
fn is_path_segment(name: &str) -> bool {
    name != "."
        && name != ".."
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

fn validate_path(field: &str, path: &str) -> Result<()> {
    if !path.starts_with('/') {
        bail!("{} must start with '/', got {:?}", field, path);
    }
    Ok(())
}

fn default_targets() -> Vec<TargetConfig> {
    DEFAULT_TARGETS
        .iter()
        .filter_map(|name| {
            let url = Url::parse(&format!("http://{}:{}", name, DEFAULT_TARGET_PORT)).ok()?;
            Some(TargetConfig {
                name: name.to_string(),
                url,
            })
        })
        .collect()
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_health_path() -> String {
    "/health".to_string()
}

fn default_probe_path() -> String {
    "/actuator/health".to_string()
}

fn default_timeout_ms() -> u64 {
    3000
}

fn default_true() -> bool {
    true
}

fn default_metrics_port() -> u16 {
    9090
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}
