//! Resolution of the webhook's desired state.
//!
//! Every item is looked up independently: a non-empty local override wins,
//! otherwise the governing relation is searched, otherwise the item is
//! unresolved. The CA bundle and the authorization policy are only ever taken
//! from local configuration.

use std::fmt;

use tracing::{debug, trace};

use crate::config::LocalConfig;
use crate::relation::{Participant, RelationSnapshot};
use crate::signal::RelationName;
use crate::status::UnitStatus;

const CREDENTIALS_PROTOCOL: &str = "credentials_protocol";
const CREDENTIALS_HOST: &str = "credentials_host";
const CREDENTIALS_PORT: &str = "credentials_port";
const API_VERSION: &str = "api_version";

/// The configuration the webhook should run with.
#[derive(Clone, PartialEq, Eq)]
pub struct DesiredState {
    pub server_cert: String,
    pub server_key: String,
    pub keystone_ca: String,
    pub policy: String,
    pub keystone_url: String,
}

impl fmt::Debug for DesiredState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DesiredState")
            .field("server_cert", &format_args!("{} bytes", self.server_cert.len()))
            .field("server_key", &"<redacted>")
            .field("keystone_ca", &format_args!("{} bytes", self.keystone_ca.len()))
            .field("policy", &format_args!("{} bytes", self.policy.len()))
            .field("keystone_url", &self.keystone_url)
            .finish()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    Ready(DesiredState),
    /// A mandatory item is missing; the status explains which and why.
    Pending(UnitStatus),
}

#[derive(Debug)]
enum Lookup {
    Found(String),
    Missing {
        option: &'static str,
        relation: RelationName,
        relation_absent: bool,
    },
}

impl Lookup {
    fn status(&self) -> Option<UnitStatus> {
        match self {
            Lookup::Found(_) => None,
            Lookup::Missing {
                option,
                relation,
                relation_absent: true,
            } => Some(UnitStatus::blocked(format!(
                "missing {relation} relation and no {option} override"
            ))),
            Lookup::Missing {
                relation,
                relation_absent: false,
                ..
            } => Some(UnitStatus::waiting(format!(
                "waiting for {relation} relation data"
            ))),
        }
    }
}

fn overridden(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_owned())
}

/// Unit names are used inside relation keys with `/` replaced.
pub fn normalize_unit_name(unit_name: &str) -> String {
    unit_name.replace('/', "_")
}

fn credentials_url(participant: &Participant) -> Option<String> {
    let protocol = participant.get(CREDENTIALS_PROTOCOL)?;
    let host = participant.get(CREDENTIALS_HOST)?;
    let port = participant.get(CREDENTIALS_PORT)?;
    let api_version = participant.get(API_VERSION)?;

    Some(format!("{protocol}://{host}:{port}/v{api_version}"))
}

pub struct Resolver {
    unit_key: String,
}

impl Resolver {
    pub fn new(unit_name: &str) -> Self {
        Self {
            unit_key: normalize_unit_name(unit_name),
        }
    }

    pub fn resolve(&self, config: &LocalConfig, relations: &RelationSnapshot) -> Resolution {
        let lookups = [
            self.certificate_item(
                &config.tls_server_cert,
                "tls-server-cert",
                "server.cert",
                relations,
            ),
            self.certificate_item(
                &config.tls_server_key,
                "tls-server-key",
                "server.key",
                relations,
            ),
            Self::keystone_url(config, relations),
        ];

        match lookups {
            [Lookup::Found(server_cert), Lookup::Found(server_key), Lookup::Found(keystone_url)] => {
                debug!(keystone_url, "Desired state resolved");
                Resolution::Ready(DesiredState {
                    server_cert,
                    server_key,
                    keystone_ca: config.keystone_ca.clone(),
                    policy: config.authorization_policy.clone(),
                    keystone_url,
                })
            }
            lookups => {
                // Certificate and key are checked before the URL.
                let status = lookups
                    .iter()
                    .find_map(Lookup::status)
                    .unwrap_or_else(|| UnitStatus::waiting("waiting for relation data"));
                debug!(%status, "Desired state unresolved");
                Resolution::Pending(status)
            }
        }
    }

    fn certificate_item(
        &self,
        value: &str,
        option: &'static str,
        suffix: &str,
        relations: &RelationSnapshot,
    ) -> Lookup {
        if let Some(value) = overridden(value) {
            trace!(option, "Using local override");
            return Lookup::Found(value);
        }

        let relation = RelationName::TlsCertificates;
        let key = format!("{}.{suffix}", self.unit_key);

        relations
            .participants(relation)
            .iter()
            .find_map(|participant| participant.get(&key))
            .map(|value| Lookup::Found(value.to_owned()))
            .unwrap_or(Lookup::Missing {
                option,
                relation,
                relation_absent: relations.is_absent(relation),
            })
    }

    fn keystone_url(config: &LocalConfig, relations: &RelationSnapshot) -> Lookup {
        if let Some(url) = overridden(&config.keystone_url) {
            trace!("Using keystone-url override");
            return Lookup::Found(url);
        }

        let relation = RelationName::KeystoneCredentials;

        // Participants with a partial set of credentials are skipped.
        relations
            .participants(relation)
            .iter()
            .find_map(credentials_url)
            .map(Lookup::Found)
            .unwrap_or(Lookup::Missing {
                option: "keystone-url",
                relation,
                relation_absent: relations.is_absent(relation),
            })
    }
}
