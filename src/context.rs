use std::sync::Arc;

use async_trait::async_trait;
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use pebble::Container;

use crate::cluster::{ClusterObjects, ServiceDescriptor};
use crate::relation::RelationView;
use crate::status::StatusReporter;
use crate::Result;

/// Everything a handler needs: who this unit is and how to reach the
/// collaborators it drives.
pub struct Context {
    pub unit_name: String,
    pub app_name: String,
    pub descriptor: ServiceDescriptor,
    pub relations: Arc<dyn RelationView>,
    pub cluster: Arc<dyn ClusterObjects>,
    pub container: Arc<dyn Container>,
    pub status: Arc<dyn StatusReporter>,
    pub events: Arc<dyn ControllerEvents>,
}

#[async_trait]
pub trait ControllerEvents: Send + Sync {
    async fn service_applied(&self, descriptor: &ServiceDescriptor) -> Result<()>;

    async fn workload_restarted(&self, descriptor: &ServiceDescriptor) -> Result<()>;
}

/// Publishes controller events against the webhook Service.
pub struct ServiceEvents {
    recorder: Recorder,
}

impl ServiceEvents {
    pub fn new(client: kube::Client, controller_name: &str) -> Self {
        let reporter: Reporter = controller_name.into();

        Self {
            recorder: Recorder::new(client, reporter),
        }
    }
}

#[async_trait]
impl ControllerEvents for ServiceEvents {
    async fn service_applied(&self, descriptor: &ServiceDescriptor) -> Result<()> {
        self.recorder
            .publish(
                &Event {
                    type_: EventType::Normal,
                    reason: "ServiceApplied".into(),
                    note: Some(format!("Applied service '{}'", descriptor.name)),
                    action: "ServiceApplied".into(),
                    secondary: None,
                },
                &descriptor.object_ref(),
            )
            .await?;

        Ok(())
    }

    async fn workload_restarted(&self, descriptor: &ServiceDescriptor) -> Result<()> {
        self.recorder
            .publish(
                &Event {
                    type_: EventType::Normal,
                    reason: "WorkloadRestarted".into(),
                    note: Some("Restarted keystone auth webhook with new configuration".into()),
                    action: "WorkloadRestarted".into(),
                    secondary: None,
                },
                &descriptor.object_ref(),
            )
            .await?;

        Ok(())
    }
}
