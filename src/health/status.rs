// src/health/status.rs
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HealthStatus {
    Up,
    Down,
}

impl HealthStatus {
    pub fn is_up(self) -> bool {
        self == HealthStatus::Up
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HealthStatus::Up => "UP",
            HealthStatus::Down => "DOWN",
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of probing a single target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthResult {
    #[serde(skip)]
    pub target: String,
    pub status: HealthStatus,
    #[serde(
        rename = "details",
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_error_details"
    )]
    pub error: Option<String>,
}

impl HealthResult {
    pub fn up(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            status: HealthStatus::Up,
            error: None,
        }
    }

    pub fn down(target: impl Into<String>, error: impl fmt::Display) -> Self {
        Self {
            target: target.into(),
            status: HealthStatus::Down,
            error: Some(error.to_string()),
        }
    }

    pub fn is_up(&self) -> bool {
        self.status.is_up()
    }
}

fn serialize_error_details<S>(error: &Option<String>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    #[derive(Serialize)]
    struct Details<'a> {
        error: &'a str,
    }

    match error {
        Some(error) => Details { error }.serialize(serializer),
        None => serializer.serialize_none(),
    }
}

/// Combined verdict over every configured target.
///
/// Serializes as `{"status": "UP", "components": {"<name>": {"status": "UP"}}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregateStatus {
    pub status: HealthStatus,
    pub components: BTreeMap<String, HealthResult>,
}

impl AggregateStatus {
    /// Overall status is `Up` iff every result is `Up`; an empty set is `Up`.
    pub fn from_results<I>(results: I) -> Self
    where
        I: IntoIterator<Item = HealthResult>,
    {
        let components: BTreeMap<_, _> = results
            .into_iter()
            .map(|result| (result.target.clone(), result))
            .collect();

        let status = if components.values().all(HealthResult::is_up) {
            HealthStatus::Up
        } else {
            HealthStatus::Down
        };

        Self { status, components }
    }

    pub fn is_up(&self) -> bool {
        self.status.is_up()
    }

    pub fn get(&self, target: &str) -> Option<&HealthResult> {
        self.components.get(target)
    }

    pub fn down_targets(&self) -> impl Iterator<Item = &HealthResult> {
        self.components.values().filter(|result| !result.is_up())
    }

    pub fn up_count(&self) -> usize {
        self.components.values().filter(|result| result.is_up()).count()
    }
}
