//! Relation, status and configuration access through the Juju hook tools.

use std::path::PathBuf;
use std::process::Output;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, trace};

use crate::config::LocalConfig;
use crate::relation::{DataBag, Participant, Relation, RelationView};
use crate::signal::RelationName;
use crate::status::{StatusReporter, UnitStatus};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Failed to run '{tool}': {source}")]
    Spawn {
        tool: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("'{tool}' exited with {status}: {stderr}")]
    Failed {
        tool: &'static str,
        status: std::process::ExitStatus,
        stderr: String,
    },
}

#[derive(Deserialize, Debug)]
struct StatusOutput {
    status: String,
    #[serde(default)]
    message: String,
}

#[derive(Clone, Debug)]
pub struct HookTools {
    unit_name: String,
    /// Looked up on `PATH` when unset.
    tool_dir: Option<PathBuf>,
}

impl HookTools {
    pub fn new(unit_name: &str) -> Self {
        Self {
            unit_name: unit_name.into(),
            tool_dir: None,
        }
    }

    pub fn with_tool_dir(unit_name: &str, tool_dir: impl Into<PathBuf>) -> Self {
        Self {
            unit_name: unit_name.into(),
            tool_dir: Some(tool_dir.into()),
        }
    }

    fn program(&self, tool: &str) -> PathBuf {
        match &self.tool_dir {
            Some(dir) => dir.join(tool),
            None => PathBuf::from(tool),
        }
    }

    async fn run(&self, tool: &'static str, args: &[&str]) -> Result<Vec<u8>, Error> {
        trace!(tool, ?args, "Running hook tool");

        let Output {
            status,
            stdout,
            stderr,
        } = Command::new(self.program(tool))
            .args(args)
            .output()
            .await
            .map_err(|source| Error::Spawn { tool, source })?;

        if !status.success() {
            return Err(Error::Failed {
                tool,
                status,
                stderr: String::from_utf8_lossy(&stderr).trim().to_owned(),
            });
        }

        Ok(stdout)
    }

    async fn run_json<T: DeserializeOwned + Default>(
        &self,
        tool: &'static str,
        args: &[&str],
    ) -> crate::Result<T> {
        let output = self.run(tool, args).await?;
        // Tools print `null` (or nothing) when there is nothing to report.
        if output.iter().all(u8::is_ascii_whitespace) {
            return Ok(T::default());
        }

        Ok(serde_json::from_slice::<Option<T>>(&output)?.unwrap_or_default())
    }

    async fn relation_ids(&self, name: RelationName) -> crate::Result<Vec<String>> {
        self.run_json("relation-ids", &[name.as_str(), "--format=json"])
            .await
    }

    async fn relation_get(&self, id: &str, unit: &str) -> crate::Result<DataBag> {
        self.run_json("relation-get", &["-r", id, "-", unit, "--format=json"])
            .await
    }

    pub async fn config(&self) -> crate::Result<LocalConfig> {
        let output = self.run("config-get", &["--format=json"]).await?;
        LocalConfig::from_json(&output)
    }
}

#[async_trait]
impl RelationView for HookTools {
    async fn relation(&self, name: RelationName) -> crate::Result<Relation> {
        let mut participants = Vec::new();

        for id in self.relation_ids(name).await? {
            let units: Vec<String> = self
                .run_json("relation-list", &["-r", id.as_str(), "--format=json"])
                .await?;

            for unit in units {
                let data = self.relation_get(&id, &unit).await?;
                participants.push(Participant { unit, data });
            }
        }

        Ok(Relation { participants })
    }

    /// Reads this unit's bag on the first established id of `name`.
    async fn local_data(&self, name: RelationName) -> crate::Result<DataBag> {
        match self.relation_ids(name).await?.first() {
            Some(id) => self.relation_get(id, &self.unit_name).await,
            None => Ok(DataBag::new()),
        }
    }

    /// Writes into the same id `local_data` reads from.
    async fn publish(&self, name: RelationName, data: &DataBag) -> crate::Result<()> {
        let Some(id) = self.relation_ids(name).await?.into_iter().next() else {
            debug!(%name, "Relation not established, nothing published");
            return Ok(());
        };

        let settings: Vec<String> = data
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect();
        let mut args = vec!["-r", id.as_str()];
        args.extend(settings.iter().map(String::as_str));
        self.run("relation-set", &args).await?;

        Ok(())
    }
}

#[async_trait]
impl StatusReporter for HookTools {
    async fn current(&self) -> crate::Result<Option<UnitStatus>> {
        let output = self.run("status-get", &["--format=json"]).await?;
        let StatusOutput { status, message } = serde_json::from_slice(&output)?;

        Ok(UnitStatus::from_parts(&status, &message))
    }

    async fn set(&self, status: &UnitStatus) -> crate::Result<()> {
        self.run("status-set", &[status.name(), status.message()])
            .await?;

        Ok(())
    }
}
