// src/config/mod.rs
mod models;

pub use models::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Prefix for environment overrides, e.g. `GATEWAY_HEALTH__HEALTH__TIMEOUT_MS=5000`.
pub const ENV_PREFIX: &str = "GATEWAY_HEALTH";

/// Load configuration from built-in defaults, an optional file (YAML, JSON or
/// TOML by extension) and `GATEWAY_HEALTH__*` environment variables, in that order.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    load_config_with_prefix(path, ENV_PREFIX)
}

pub fn load_config_with_prefix(path: Option<&Path>, env_prefix: &str) -> Result<Config> {
    let defaults = config::Config::try_from(&Config::default())
        .context("Failed to build default config")?;

    let mut builder = config::Config::builder().add_source(defaults);

    if let Some(path) = path {
        builder = builder.add_source(config::File::from(path).required(true));
    }

    let config: Config = builder
        .add_source(
            config::Environment::with_prefix(env_prefix)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .context("Failed to read config")?
        .try_deserialize()
        .context("Failed to parse config")?;

    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn write_temp(extension: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "gateway-health-{}.{}",
            uuid::Uuid::new_v4(),
            extension
        ));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn loads_defaults_without_file() {
        let config = load_config_with_prefix(None, "GATEWAY_HEALTH_TEST_DEFAULTS").unwrap();
        assert_eq!(config.targets.len(), 5);
        assert_eq!(config.server.health_path, "/health");
    }

    #[test]
    fn file_targets_replace_defaults() {
        let path = write_temp(
            "yaml",
            r#"
health:
  path: /health
  timeout_ms: 500
  strict: true
targets:
  - name: orders
    url: http://orders:8080
  - name: billing
    url: http://billing:8080/api
"#,
        );

        let config = load_config_with_prefix(Some(&path), "GATEWAY_HEALTH_TEST_FILE").unwrap();
        std::fs::remove_file(&path).ok();

        let names: Vec<_> = config.targets.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["orders", "billing"]);
        assert_eq!(config.health.path, "/health");
        assert_eq!(config.health.timeout_ms, 500);
        assert!(config.health.strict);
        // untouched sections keep their defaults
        assert_eq!(config.metrics.port, 9090);
    }

    #[test]
    fn environment_overrides_file() {
        let path = write_temp("json", r#"{"health": {"timeout_ms": 1000}}"#);
        std::env::set_var("GATEWAY_HEALTH_TEST_ENV__HEALTH__TIMEOUT_MS", "4500");

        let config = load_config_with_prefix(Some(&path), "GATEWAY_HEALTH_TEST_ENV").unwrap();
        std::fs::remove_file(&path).ok();
        std::env::remove_var("GATEWAY_HEALTH_TEST_ENV__HEALTH__TIMEOUT_MS");

        assert_eq!(config.health.timeout_ms, 4500);
    }

    #[test]
    fn invalid_file_is_rejected() {
        let path = write_temp(
            "yaml",
            r#"
targets:
  - name: a
    url: http://a:1
  - name: a
    url: http://a:2
"#,
        );

        let result = load_config_with_prefix(Some(&path), "GATEWAY_HEALTH_TEST_INVALID");
        std::fs::remove_file(&path).ok();

        assert!(result.is_err());
    }

    #[test]
    fn missing_file_is_an_error() {
        let path = std::env::temp_dir().join("gateway-health-does-not-exist.yaml");
        assert!(load_config_with_prefix(Some(&path), "GATEWAY_HEALTH_TEST_MISSING").is_err());
    }
}
