use std::fmt;

use async_trait::async_trait;

use crate::Result;

/// Operator-visible state of this unit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UnitStatus {
    Waiting(String),
    Blocked(String),
    Maintenance(String),
    Active,
}

impl UnitStatus {
    pub fn waiting(message: impl Into<String>) -> Self {
        Self::Waiting(message.into())
    }

    pub fn blocked(message: impl Into<String>) -> Self {
        Self::Blocked(message.into())
    }

    pub fn maintenance(message: impl Into<String>) -> Self {
        Self::Maintenance(message.into())
    }

    /// The state name as understood by `status-set`.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Waiting(_) => "waiting",
            Self::Blocked(_) => "blocked",
            Self::Maintenance(_) => "maintenance",
            Self::Active => "active",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Waiting(message) | Self::Blocked(message) | Self::Maintenance(message) => {
                message
            }
            Self::Active => "",
        }
    }

    /// Inverse of [`UnitStatus::name`]; `None` for states this unit never sets
    /// itself (`unknown`, `error`, ...).
    pub fn from_parts(name: &str, message: &str) -> Option<Self> {
        match name {
            "waiting" => Some(Self::waiting(message)),
            "blocked" => Some(Self::blocked(message)),
            "maintenance" => Some(Self::maintenance(message)),
            "active" => Some(Self::Active),
            _ => None,
        }
    }
}

impl fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.message() {
            "" => f.write_str(self.name()),
            message => write!(f, "{}: {message}", self.name()),
        }
    }
}

#[async_trait]
pub trait StatusReporter: Send + Sync {
    /// The status currently shown to the operator, if it is one of ours.
    async fn current(&self) -> Result<Option<UnitStatus>>;

    async fn set(&self, status: &UnitStatus) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_through_hook_tool_parts() {
        let status = UnitStatus::blocked("missing relation");
        assert_eq!(
            UnitStatus::from_parts(status.name(), status.message()),
            Some(status)
        );
        assert_eq!(UnitStatus::from_parts("unknown", ""), None);
    }

    #[test]
    fn display() {
        assert_eq!(UnitStatus::Active.to_string(), "active");
        assert_eq!(
            UnitStatus::waiting("waiting for tls-certificates relation data").to_string(),
            "waiting: waiting for tls-certificates relation data"
        );
    }
}
