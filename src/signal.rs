use std::fmt;
use std::str::FromStr;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("Unknown signal: '{0}'")]
pub struct UnknownSignal(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RelationName {
    KeystoneCredentials,
    TlsCertificates,
}

impl RelationName {
    pub const ALL: [RelationName; 2] = [Self::KeystoneCredentials, Self::TlsCertificates];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::KeystoneCredentials => "keystone-credentials",
            Self::TlsCertificates => "tls-certificates",
        }
    }
}

impl fmt::Display for RelationName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelationName {
    type Err = UnknownSignal;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|relation| relation.as_str() == s)
            .ok_or_else(|| UnknownSignal(s.to_owned()))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RelationEvent {
    Joined,
    Changed,
    Broken,
    Departed,
}

impl FromStr for RelationEvent {
    type Err = UnknownSignal;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "joined" => Ok(Self::Joined),
            "changed" => Ok(Self::Changed),
            "broken" => Ok(Self::Broken),
            "departed" => Ok(Self::Departed),
            _ => Err(UnknownSignal(s.to_owned())),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Signal {
    Install,
    ConfigChanged,
    Relation {
        relation: RelationName,
        event: RelationEvent,
    },
}

/// The controller handler a signal is routed to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Handler {
    Install,
    ConfigChanged,
    KeystoneCredentials,
    TlsCertificates,
}

impl Signal {
    /// Parses the hook name out of a dispatch path such as `hooks/install`.
    pub fn from_dispatch_path(path: &str) -> Result<Self, UnknownSignal> {
        path.rsplit('/').next().unwrap_or(path).parse()
    }

    pub fn handler(&self) -> Handler {
        match self {
            Self::Install => Handler::Install,
            Self::ConfigChanged => Handler::ConfigChanged,
            Self::Relation {
                relation: RelationName::KeystoneCredentials,
                ..
            } => Handler::KeystoneCredentials,
            Self::Relation {
                relation: RelationName::TlsCertificates,
                ..
            } => Handler::TlsCertificates,
        }
    }
}

impl FromStr for Signal {
    type Err = UnknownSignal;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "install" => Ok(Self::Install),
            "config-changed" => Ok(Self::ConfigChanged),
            _ => {
                let (relation, event) = s
                    .rsplit_once("-relation-")
                    .ok_or_else(|| UnknownSignal(s.to_owned()))?;
                let unknown = |_| UnknownSignal(s.to_owned());

                Ok(Self::Relation {
                    relation: relation.parse().map_err(unknown)?,
                    event: event.parse().map_err(unknown)?,
                })
            }
        }
    }
}
