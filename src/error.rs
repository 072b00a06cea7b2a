use crate::{hook, signal};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Kube api error: {0}")]
    Kube(#[from] kube::Error),
    #[error("Pebble error: {0}")]
    Pebble(#[from] pebble::Error),
    #[error("Hook tool error: {0}")]
    Hook(#[from] hook::Error),
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("Json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Signal(#[from] signal::UnknownSignal),
    #[error("Service '{namespace}/{name}' not found")]
    ServiceNotFound { name: String, namespace: String },
    #[error("Service '{namespace}/{name}' has no cluster address")]
    ServiceAddressMissing { name: String, namespace: String },
    #[error("Invalid unit name: '{0}'")]
    InvalidUnitName(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
