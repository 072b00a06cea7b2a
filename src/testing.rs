//! In-memory collaborators shared by the unit tests.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use async_trait::async_trait;
use pebble::{Container, Layer, Service};

use crate::cluster::ServiceDescriptor;
use crate::context::ControllerEvents;
use crate::relation::{DataBag, Participant, Relation, RelationView};
use crate::resolver::DesiredState;
use crate::signal::RelationName;
use crate::status::{StatusReporter, UnitStatus};
use crate::Result;

pub fn desired_state() -> DesiredState {
    DesiredState {
        server_cert: "CERT".into(),
        server_key: "KEY".into(),
        keystone_ca: "CA".into(),
        policy: "[]".into(),
        keystone_url: "http://10.0.0.5:5000/v3".into(),
    }
}

#[derive(Default)]
struct RelationState {
    remote: BTreeMap<RelationName, Vec<Participant>>,
    local: BTreeMap<RelationName, DataBag>,
    writes: Vec<DataBag>,
}

#[derive(Default)]
pub struct FakeRelations {
    state: Mutex<RelationState>,
}

impl FakeRelations {
    pub fn join(&self, name: RelationName, unit: &str, data: &[(&str, &str)]) {
        self.state
            .lock()
            .unwrap()
            .remote
            .entry(name)
            .or_default()
            .push(Participant {
                unit: unit.into(),
                data: data
                    .iter()
                    .map(|(key, value)| (key.to_string(), value.to_string()))
                    .collect(),
            });
    }

    pub fn depart(&self, name: RelationName) {
        self.state.lock().unwrap().remote.remove(&name);
    }

    pub fn local(&self, name: RelationName) -> DataBag {
        self.state
            .lock()
            .unwrap()
            .local
            .get(&name)
            .cloned()
            .unwrap_or_default()
    }

    pub fn writes(&self) -> usize {
        self.state.lock().unwrap().writes.len()
    }

    pub fn last_write(&self) -> Option<DataBag> {
        self.state.lock().unwrap().writes.last().cloned()
    }
}

#[async_trait]
impl RelationView for FakeRelations {
    async fn relation(&self, name: RelationName) -> Result<Relation> {
        Ok(Relation {
            participants: self
                .state
                .lock()
                .unwrap()
                .remote
                .get(&name)
                .cloned()
                .unwrap_or_default(),
        })
    }

    async fn local_data(&self, name: RelationName) -> Result<DataBag> {
        Ok(self.local(name))
    }

    async fn publish(&self, name: RelationName, data: &DataBag) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.local.entry(name).or_default().extend(data.clone());
        state.writes.push(data.clone());
        Ok(())
    }
}

#[derive(Default)]
struct ContainerState {
    files: BTreeMap<String, Vec<u8>>,
    plan: BTreeMap<String, Service>,
    running: BTreeSet<String>,
    layers: usize,
    actions: Vec<&'static str>,
    fail_start: bool,
}

#[derive(Default)]
pub struct FakeContainer {
    state: Mutex<ContainerState>,
}

impl FakeContainer {
    pub fn file(&self, path: &str) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .files
            .get(path)
            .map(|contents| String::from_utf8_lossy(contents).into_owned())
    }

    pub fn files(&self) -> usize {
        self.state.lock().unwrap().files.len()
    }

    pub fn planned(&self, name: &str) -> Option<Service> {
        self.state.lock().unwrap().plan.get(name).cloned()
    }

    pub fn plan_service(&self, name: &str, service: Service) {
        self.state.lock().unwrap().plan.insert(name.into(), service);
    }

    pub fn running(&self, name: &str) -> bool {
        self.state.lock().unwrap().running.contains(name)
    }

    pub fn set_running(&self, name: &str) {
        self.state.lock().unwrap().running.insert(name.into());
    }

    pub fn set_stopped(&self, name: &str) {
        self.state.lock().unwrap().running.remove(name);
    }

    pub fn fail_start(&self) {
        self.state.lock().unwrap().fail_start = true;
    }

    pub fn layers(&self) -> usize {
        self.state.lock().unwrap().layers
    }

    pub fn actions(&self) -> Vec<&'static str> {
        self.state.lock().unwrap().actions.clone()
    }
}

#[async_trait]
impl Container for FakeContainer {
    async fn push(&self, path: &str, contents: &[u8]) -> pebble::Result<()> {
        self.state
            .lock()
            .unwrap()
            .files
            .insert(path.into(), contents.to_vec());
        Ok(())
    }

    async fn add_layer(&self, _label: &str, layer: &Layer) -> pebble::Result<()> {
        let mut state = self.state.lock().unwrap();
        state.layers += 1;
        for (name, service) in &layer.services {
            state.plan.entry(name.clone()).or_default().merge(service);
        }
        Ok(())
    }

    async fn planned_service(&self, name: &str) -> pebble::Result<Option<Service>> {
        Ok(self.planned(name))
    }

    async fn is_running(&self, name: &str) -> pebble::Result<bool> {
        Ok(self.running(name))
    }

    async fn stop(&self, name: &str) -> pebble::Result<()> {
        let mut state = self.state.lock().unwrap();
        state.actions.push("stop");
        state.running.remove(name);
        Ok(())
    }

    async fn start(&self, name: &str) -> pebble::Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_start {
            return Err(pebble::Error::Change {
                id: "7".into(),
                err: format!("cannot start service \"{name}\""),
            });
        }
        state.actions.push("start");
        state.running.insert(name.into());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingStatus {
    history: Mutex<Vec<UnitStatus>>,
}

impl RecordingStatus {
    pub fn history(&self) -> Vec<UnitStatus> {
        self.history.lock().unwrap().clone()
    }
}

#[async_trait]
impl StatusReporter for RecordingStatus {
    async fn current(&self) -> Result<Option<UnitStatus>> {
        Ok(self.history.lock().unwrap().last().cloned())
    }

    async fn set(&self, status: &UnitStatus) -> Result<()> {
        self.history.lock().unwrap().push(status.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingEvents {
    events: Mutex<Vec<String>>,
}

impl RecordingEvents {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl ControllerEvents for RecordingEvents {
    async fn service_applied(&self, descriptor: &ServiceDescriptor) -> Result<()> {
        self.events
            .lock()
            .unwrap()
            .push(format!("ServiceApplied {}", descriptor.name));
        Ok(())
    }

    async fn workload_restarted(&self, descriptor: &ServiceDescriptor) -> Result<()> {
        self.events
            .lock()
            .unwrap()
            .push(format!("WorkloadRestarted {}", descriptor.name));
        Ok(())
    }
}
