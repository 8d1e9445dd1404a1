// src/health/probe.rs
use crate::config::HealthCheckConfig;
use crate::health::{HealthResult, Target};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;
use url::Url;

/// Why a single target was reported down.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timeout after {0:?}")]
    Timeout(Duration),

    #[error("HTTP {0}")]
    Status(StatusCode),

    #[error("Failed to read response body: {0}")]
    Body(String),

    #[error("Target reported status {0}")]
    ReportedStatus(String),

    #[error("Malformed health body: {0}")]
    MalformedBody(String),
}

impl ProbeError {
    fn from_request(error: reqwest::Error, limit: Duration) -> Self {
        if error.is_timeout() {
            ProbeError::Timeout(limit)
        } else {
            ProbeError::Network(error_chain(&error))
        }
    }
}

/// reqwest hides the interesting part ("Connection refused") in the source chain.
/// Causes already spelled out by an outer error are skipped.
fn error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}

/// Probe one target. Never fails: every error becomes a `Down` result.
pub async fn probe(client: &Client, target: &Target, config: &HealthCheckConfig) -> HealthResult {
    let url = target.health_url(&config.path);
    debug!("Will call the health API on URL: {}", url);

    let limit = config.timeout();
    let outcome = match timeout(limit, fetch(client, url, config.strict, limit)).await {
        Ok(outcome) => outcome,
        Err(_) => Err(ProbeError::Timeout(limit)),
    };

    match outcome {
        Ok(()) => {
            debug!("Target {} is up", target.name);
            HealthResult::up(&target.name)
        }
        Err(e) => {
            debug!("Target {} is down: {}", target.name, e);
            HealthResult::down(&target.name, e)
        }
    }
}

async fn fetch(client: &Client, url: Url, strict: bool, limit: Duration) -> Result<(), ProbeError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| ProbeError::from_request(e, limit))?;

    let status = response.status();
    if !status.is_success() {
        return Err(ProbeError::Status(status));
    }

    let body = response.text().await.map_err(|e| {
        if e.is_timeout() {
            ProbeError::Timeout(limit)
        } else {
            ProbeError::Body(error_chain(&e))
        }
    })?;

    if strict {
        check_reported_status(&body)?;
    }

    Ok(())
}

/// Strict mode: the body must be JSON carrying `"status": "UP"`.
fn check_reported_status(body: &str) -> Result<(), ProbeError> {
    let value: serde_json::Value =
        serde_json::from_str(body).map_err(|e| ProbeError::MalformedBody(e.to_string()))?;

    match value.get("status").and_then(serde_json::Value::as_str) {
        Some("UP") => Ok(()),
        Some(status) => Err(ProbeError::ReportedStatus(status.to_string())),
        None => Err(ProbeError::MalformedBody(
            "missing \"status\" field".to_string(),
        )),
    }
}
