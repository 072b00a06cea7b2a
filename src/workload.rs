use std::collections::BTreeMap;

use pebble::{Container, Layer, Override, Service, Startup};
use sha2::{Digest, Sha256};
use tracing::{debug, trace};

use crate::resolver::DesiredState;
use crate::Result;

pub const SERVICE_NAME: &str = "k8s-keystone-auth";
pub const LAYER_LABEL: &str = "keystone-auth";
pub const EXECUTABLE: &str = "/bin/k8s-keystone-auth";

pub const SERVER_CERT_PATH: &str = "/etc/k8s-keystone-auth/tls.crt";
pub const SERVER_KEY_PATH: &str = "/etc/k8s-keystone-auth/tls.key";
pub const KEYSTONE_CA_PATH: &str = "/etc/k8s-keystone-auth/ca.crt";
pub const POLICY_PATH: &str = "/etc/k8s-keystone-auth/policy.json";

pub const DIGEST_ENV: &str = "KEYSTONE_AUTH_CONFIG_DIGEST";

fn artifacts(state: &DesiredState) -> [(&'static str, &str); 4] {
    [
        (SERVER_CERT_PATH, state.server_cert.as_str()),
        (SERVER_KEY_PATH, state.server_key.as_str()),
        (KEYSTONE_CA_PATH, state.keystone_ca.as_str()),
        (POLICY_PATH, state.policy.as_str()),
    ]
}

pub fn launch_command(state: &DesiredState) -> String {
    let mut command = format!(
        "{EXECUTABLE} --tls-cert-file={SERVER_CERT_PATH} --tls-private-key-file={SERVER_KEY_PATH} \
         --keystone-policy-file={POLICY_PATH} --keystone-url={}",
        state.keystone_url
    );
    if !state.keystone_ca.is_empty() {
        command.push_str(&format!(" --keystone-ca-file={KEYSTONE_CA_PATH}"));
    }

    command
}

/// Fingerprint of everything the running process reads at start-up.
fn config_digest(state: &DesiredState, command: &str) -> String {
    let mut hasher = Sha256::new();
    for (path, contents) in artifacts(state) {
        hasher.update(path.as_bytes());
        hasher.update((contents.len() as u64).to_be_bytes());
        hasher.update(contents.as_bytes());
    }
    hasher.update(command.as_bytes());

    format!("{:x}", hasher.finalize())
}

pub fn service_definition(state: &DesiredState) -> Service {
    let command = launch_command(state);

    Service {
        summary: Some("Keystone authentication webhook".into()),
        override_: Some(Override::Merge),
        environment: BTreeMap::from([(DIGEST_ENV.to_owned(), config_digest(state, &command))]),
        command: Some(command),
        startup: Some(Startup::Enabled),
    }
}

pub fn layer(state: &DesiredState) -> Layer {
    Layer {
        summary: Some("keystone auth webhook layer".into()),
        description: None,
        services: BTreeMap::from([(SERVICE_NAME.to_owned(), service_definition(state))]),
    }
}

/// What [`WorkloadReconciler::replan`] ended up doing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Replan {
    Unchanged,
    Started,
    Restarted,
}

pub struct WorkloadReconciler<'a> {
    container: &'a dyn Container,
}

impl<'a> WorkloadReconciler<'a> {
    pub fn new(container: &'a dyn Container) -> Self {
        Self { container }
    }

    pub async fn push_artifacts(&self, state: &DesiredState) -> Result<()> {
        for (path, contents) in artifacts(state) {
            trace!(path, "Pushing artifact");
            self.container.push(path, contents.as_bytes()).await?;
        }

        Ok(())
    }

    /// Merges the service definition into the plan and (re)starts the
    /// service when the definition changed or it is not running.
    pub async fn replan(&self, state: &DesiredState) -> Result<Replan> {
        let desired = service_definition(state);

        let changed = match self.container.planned_service(SERVICE_NAME).await? {
            Some(current) => {
                let mut merged = current.clone();
                merged.merge(&desired);
                merged != current
            }
            None => true,
        };

        if changed {
            debug!(service = SERVICE_NAME, "Service definition changed");
            self.container.add_layer(LAYER_LABEL, &layer(state)).await?;
        }

        let running = self.container.is_running(SERVICE_NAME).await?;
        if !changed && running {
            trace!(service = SERVICE_NAME, "Service up to date");
            return Ok(Replan::Unchanged);
        }

        if running {
            debug!(service = SERVICE_NAME, "Stopping service");
            self.container.stop(SERVICE_NAME).await?;
        }
        debug!(service = SERVICE_NAME, "Starting service");
        self.container.start(SERVICE_NAME).await?;

        Ok(if running {
            Replan::Restarted
        } else {
            Replan::Started
        })
    }

    pub async fn apply(&self, state: &DesiredState) -> Result<Replan> {
        self.push_artifacts(state).await?;
        self.replan(state).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{desired_state, FakeContainer};

    #[test]
    fn command_without_ca() {
        let state = DesiredState {
            keystone_ca: String::new(),
            ..desired_state()
        };

        assert_eq!(
            launch_command(&state),
            "/bin/k8s-keystone-auth --tls-cert-file=/etc/k8s-keystone-auth/tls.crt \
             --tls-private-key-file=/etc/k8s-keystone-auth/tls.key \
             --keystone-policy-file=/etc/k8s-keystone-auth/policy.json \
             --keystone-url=http://10.0.0.5:5000/v3"
        );
    }

    #[test]
    fn command_with_ca() {
        let command = launch_command(&desired_state());

        assert!(command.ends_with(" --keystone-ca-file=/etc/k8s-keystone-auth/ca.crt"));
    }

    #[test]
    fn digest_tracks_artifact_contents() {
        let state = desired_state();
        let rotated = DesiredState {
            server_cert: "ROTATED CERT".into(),
            ..desired_state()
        };

        let digest = |state: &DesiredState| service_definition(state).environment[DIGEST_ENV].clone();

        assert_eq!(digest(&state), digest(&desired_state()));
        assert_ne!(digest(&state), digest(&rotated));
        assert_eq!(digest(&state).len(), 64);
    }

    #[tokio::test]
    async fn first_apply_pushes_and_starts() {
        let container = FakeContainer::default();
        let state = desired_state();

        let outcome = WorkloadReconciler::new(&container).apply(&state).await.unwrap();

        assert_eq!(outcome, Replan::Started);
        assert_eq!(container.file(SERVER_CERT_PATH).as_deref(), Some("CERT"));
        assert_eq!(container.file(SERVER_KEY_PATH).as_deref(), Some("KEY"));
        assert_eq!(container.file(KEYSTONE_CA_PATH).as_deref(), Some("CA"));
        assert_eq!(container.file(POLICY_PATH).as_deref(), Some("[]"));
        assert_eq!(container.actions(), vec!["start"]);
        assert!(container.running(SERVICE_NAME));
    }

    #[tokio::test]
    async fn repeated_apply_restarts_at_most_once() {
        let container = FakeContainer::default();
        container.set_running(SERVICE_NAME);
        let reconciler = WorkloadReconciler::new(&container);
        let state = desired_state();

        assert_eq!(reconciler.apply(&state).await.unwrap(), Replan::Restarted);
        assert_eq!(reconciler.apply(&state).await.unwrap(), Replan::Unchanged);

        assert_eq!(container.actions(), vec!["stop", "start"]);
        assert_eq!(container.layers(), 1);
        assert_eq!(container.file(SERVER_CERT_PATH).as_deref(), Some("CERT"));
    }

    #[tokio::test]
    async fn stopped_service_is_started_without_a_stop() {
        let container = FakeContainer::default();
        let reconciler = WorkloadReconciler::new(&container);
        let state = desired_state();

        reconciler.apply(&state).await.unwrap();
        container.set_stopped(SERVICE_NAME);

        assert_eq!(reconciler.apply(&state).await.unwrap(), Replan::Started);
        assert_eq!(container.actions(), vec!["start", "start"]);
        assert_eq!(container.layers(), 1);
    }

    #[tokio::test]
    async fn new_ca_replans_and_restarts() {
        let container = FakeContainer::default();
        let reconciler = WorkloadReconciler::new(&container);

        reconciler
            .apply(&DesiredState {
                keystone_ca: String::new(),
                ..desired_state()
            })
            .await
            .unwrap();
        reconciler.apply(&desired_state()).await.unwrap();

        assert_eq!(container.actions(), vec!["start", "stop", "start"]);
        let command = container
            .planned(SERVICE_NAME)
            .and_then(|service| service.command)
            .unwrap();
        assert!(command.contains("--keystone-ca-file="));
    }

    #[tokio::test]
    async fn unrelated_plan_fields_are_preserved() {
        let container = FakeContainer::default();
        container.plan_service(
            SERVICE_NAME,
            Service {
                environment: BTreeMap::from([("HTTPS_PROXY".into(), "http://proxy:3128".into())]),
                ..Default::default()
            },
        );

        WorkloadReconciler::new(&container)
            .apply(&desired_state())
            .await
            .unwrap();

        let service = container.planned(SERVICE_NAME).unwrap();
        assert_eq!(service.environment["HTTPS_PROXY"], "http://proxy:3128");
        assert!(service.environment.contains_key(DIGEST_ENV));
    }
}
