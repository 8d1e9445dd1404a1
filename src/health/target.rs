// src/health/target.rs
use crate::config::TargetConfig;
use url::Url;

/// A named downstream service whose health endpoint is polled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub name: String,
    pub base_url: Url,
}

impl Target {
    pub fn new(name: impl Into<String>, base_url: Url) -> Self {
        Self {
            name: name.into(),
            base_url,
        }
    }

    /// Appends `path` to the base URL's own path, so `http://svc/api` and
    /// `/health` give `http://svc/api/health`.
    pub fn health_url(&self, path: &str) -> Url {
        let mut url = self.base_url.clone();
        let joined = format!(
            "{}/{}",
            self.base_url.path().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        url.set_path(&joined);
        url.set_query(None);
        url.set_fragment(None);
        url
    }
}

impl From<TargetConfig> for Target {
    fn from(config: TargetConfig) -> Self {
        Self::new(config.name, config.url)
    }
}

impl From<&TargetConfig> for Target {
    fn from(config: &TargetConfig) -> Self {
        Self::new(config.name.clone(), config.url.clone())
    }
}
