mod client;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use client::Client;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Transport error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Pebble api error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("Change {id} failed: {err}")]
    Change { id: String, err: String },
    #[error("Failed to push '{path}': {message}")]
    Push { path: String, message: String },
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(&'static str),
    #[error("Json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Override {
    Merge,
    Replace,
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Startup {
    Enabled,
    Disabled,
}

/// A service entry inside a layer or plan.
///
/// Only the fields this operator manages are modelled, anything else the
/// plan carries is ignored on decode.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct Service {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(
        default,
        rename = "override",
        skip_serializing_if = "Option::is_none"
    )]
    pub override_: Option<Override>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub startup: Option<Startup>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub environment: BTreeMap<String, String>,
}

impl Service {
    /// Applies `other` on top of `self` the way Pebble combines a layer with
    /// `override: merge`: provided fields replace, environment maps are merged.
    ///
    /// `override` itself is a layering directive and is left untouched.
    pub fn merge(&mut self, other: &Service) {
        if other.summary.is_some() {
            self.summary = other.summary.clone();
        }
        if other.command.is_some() {
            self.command = other.command.clone();
        }
        if other.startup.is_some() {
            self.startup = other.startup;
        }
        self.environment.extend(
            other
                .environment
                .iter()
                .map(|(key, value)| (key.clone(), value.clone())),
        );
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
pub struct Layer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub services: BTreeMap<String, Service>,
}

/// The combined plan, as returned by `GET /v1/plan`.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Plan {
    #[serde(default)]
    pub services: BTreeMap<String, Service>,
}

#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    Active,
    Inactive,
    Backoff,
    Error,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ServiceInfo {
    pub name: String,
    pub current: ServiceStatus,
}

/// File-push and process-supervisor operations against one workload
/// container.
#[async_trait]
pub trait Container: Send + Sync {
    /// Writes `contents` to `path`, creating parent directories.
    async fn push(&self, path: &str, contents: &[u8]) -> Result<()>;

    /// Adds a layer with `combine` semantics under `label`.
    async fn add_layer(&self, label: &str, layer: &Layer) -> Result<()>;

    /// The service definition from the current combined plan, if any.
    async fn planned_service(&self, name: &str) -> Result<Option<Service>>;

    async fn is_running(&self, name: &str) -> Result<bool>;

    async fn stop(&self, name: &str) -> Result<()>;

    async fn start(&self, name: &str) -> Result<()>;
}
