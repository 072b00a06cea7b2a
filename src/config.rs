#[cfg(test)]
use std::collections::HashMap;

use config::Environment;
use serde::{Deserialize, Deserializer};

use crate::signal::{Signal, UnknownSignal};
use crate::{Error, Result};

fn empty_if_null<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Operator overrides, as emitted by `config-get --format=json`.
///
/// An empty value means "not overridden".
#[derive(Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct LocalConfig {
    #[serde(default, deserialize_with = "empty_if_null")]
    pub keystone_url: String,
    #[serde(default, deserialize_with = "empty_if_null")]
    pub tls_server_cert: String,
    #[serde(default, deserialize_with = "empty_if_null")]
    pub tls_server_key: String,
    #[serde(default, rename = "tls-server-ca", deserialize_with = "empty_if_null")]
    pub keystone_ca: String,
    #[serde(default, deserialize_with = "empty_if_null")]
    pub authorization_policy: String,
}

impl LocalConfig {
    pub fn from_json(json: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(json)?)
    }
}

fn default_pebble_url() -> String {
    "http://localhost:4000".to_string()
}

fn default_field_manager() -> String {
    "keystone-auth-operator".to_string()
}

/// Process-level settings handed to every hook invocation.
#[derive(Deserialize, Clone, Debug)]
pub struct ControllerConfig {
    pub unit_name: String,
    #[serde(rename = "model_name")]
    pub namespace: String,
    pub dispatch_path: String,
    #[serde(default = "default_pebble_url")]
    pub pebble_url: String,
    #[serde(default = "default_field_manager")]
    pub field_manager: String,
}

impl ControllerConfig {
    pub fn load() -> Result<Self> {
        Self::from_sources(
            Environment::with_prefix("JUJU"),
            Environment::with_prefix("KEYSTONE_AUTH"),
        )
    }

    fn from_sources(juju: Environment, operator: Environment) -> Result<Self> {
        Ok(config::Config::builder()
            .add_source(juju)
            .add_source(operator)
            .build()?
            .try_deserialize()?)
    }

    #[cfg(test)]
    fn from_env_map(juju: HashMap<String, String>, operator: HashMap<String, String>) -> Result<Self> {
        Self::from_sources(
            Environment::with_prefix("JUJU").source(Some(juju)),
            Environment::with_prefix("KEYSTONE_AUTH").source(Some(operator)),
        )
    }

    /// The application part of `<app>/<n>`.
    pub fn app_name(&self) -> Result<&str> {
        self.unit_name
            .split_once('/')
            .map(|(app, _)| app)
            .filter(|app| !app.is_empty())
            .ok_or_else(|| Error::InvalidUnitName(self.unit_name.clone()))
    }

    pub fn signal(&self) -> Result<Signal, UnknownSignal> {
        Signal::from_dispatch_path(&self.dispatch_path)
    }
}
