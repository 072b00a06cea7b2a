use std::collections::BTreeMap;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{ObjectReference, Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::api::{ObjectMeta, Patch, PatchParams};
use kube::Api;
use tracing::{debug, trace};

#[cfg(test)]
use mockall::automock;

use crate::{Error, Result};

pub const WEBHOOK_PORT: i32 = 8443;
const SELECTOR_LABEL: &str = "app.kubernetes.io/name";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PortSpec {
    pub name: String,
    pub port: i32,
    pub protocol: String,
}

/// The cluster Service fronting the webhook.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceDescriptor {
    pub name: String,
    pub namespace: String,
    pub selector: BTreeMap<String, String>,
    pub ports: Vec<PortSpec>,
}

impl ServiceDescriptor {
    pub fn for_app(app_name: &str, namespace: &str) -> Self {
        Self {
            name: format!("{app_name}-webhook"),
            namespace: namespace.to_owned(),
            selector: BTreeMap::from([(SELECTOR_LABEL.to_owned(), app_name.to_owned())]),
            ports: vec![PortSpec {
                name: "webhook".into(),
                port: WEBHOOK_PORT,
                protocol: "TCP".into(),
            }],
        }
    }

    pub fn to_service(&self) -> Service {
        Service {
            metadata: ObjectMeta {
                name: Some(self.name.clone()),
                namespace: Some(self.namespace.clone()),
                labels: Some(self.selector.clone()),
                ..Default::default()
            },
            spec: Some(ServiceSpec {
                type_: Some("ClusterIP".into()),
                selector: Some(self.selector.clone()),
                ports: Some(
                    self.ports
                        .iter()
                        .map(|port| ServicePort {
                            name: Some(port.name.clone()),
                            port: port.port,
                            protocol: Some(port.protocol.clone()),
                            target_port: Some(IntOrString::Int(port.port)),
                            ..Default::default()
                        })
                        .collect(),
                ),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    pub fn object_ref(&self) -> ObjectReference {
        ObjectReference {
            api_version: Some("v1".into()),
            kind: Some("Service".into()),
            name: Some(self.name.clone()),
            namespace: Some(self.namespace.clone()),
            ..Default::default()
        }
    }

    fn not_found(&self) -> Error {
        Error::ServiceNotFound {
            name: self.name.clone(),
            namespace: self.namespace.clone(),
        }
    }

    fn address_missing(&self) -> Error {
        Error::ServiceAddressMissing {
            name: self.name.clone(),
            namespace: self.namespace.clone(),
        }
    }
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClusterObjects: Send + Sync {
    /// Creates or updates the Service described by `descriptor`.
    async fn apply(&self, descriptor: &ServiceDescriptor) -> Result<()>;

    /// The cluster-assigned address of the live Service.
    ///
    /// Fails with [`Error::ServiceNotFound`] if the object does not exist and
    /// [`Error::ServiceAddressMissing`] if it has no usable address.
    async fn resolve_address(&self, descriptor: &ServiceDescriptor) -> Result<String>;
}

pub struct KubeServiceApplier {
    client: kube::Client,
    field_manager: String,
}

impl KubeServiceApplier {
    pub fn new(client: kube::Client, field_manager: &str) -> Self {
        Self {
            client,
            field_manager: field_manager.into(),
        }
    }

    fn api(&self, descriptor: &ServiceDescriptor) -> Api<Service> {
        Api::namespaced(self.client.clone(), &descriptor.namespace)
    }
}

#[async_trait]
impl ClusterObjects for KubeServiceApplier {
    async fn apply(&self, descriptor: &ServiceDescriptor) -> Result<()> {
        debug!(name = descriptor.name, namespace = descriptor.namespace, "Applying service");

        self.api(descriptor)
            .patch(
                &descriptor.name,
                &PatchParams::apply(&self.field_manager).force(),
                &Patch::Apply(&descriptor.to_service()),
            )
            .await?;

        Ok(())
    }

    async fn resolve_address(&self, descriptor: &ServiceDescriptor) -> Result<String> {
        trace!(name = descriptor.name, "Resolving service address");

        let service = self
            .api(descriptor)
            .get_opt(&descriptor.name)
            .await?
            .ok_or_else(|| descriptor.not_found())?;

        service
            .spec
            .and_then(|spec| spec.cluster_ip)
            .filter(|ip| !ip.is_empty() && ip != "None")
            .ok_or_else(|| descriptor.address_missing())
    }
}
