use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, trace};

use crate::{Container, Error, Layer, Plan, Result, Service, ServiceInfo, ServiceStatus};

#[derive(Deserialize, Debug)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(rename = "status-code")]
    status_code: u16,
    #[serde(default)]
    change: Option<String>,
    #[serde(default)]
    result: Value,
}

#[derive(Deserialize, Debug)]
struct ApiError {
    message: String,
}

#[derive(Deserialize, Debug)]
struct FileResult {
    path: String,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Deserialize, Debug)]
struct Change {
    id: String,
    ready: bool,
    #[serde(default)]
    err: Option<String>,
}

/// Pebble REST client for a daemon listening on HTTP.
#[derive(Clone, Debug)]
pub struct Client {
    http: reqwest::Client,
    base_url: String,
}

impl Client {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_owned(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Envelope> {
        let envelope: Envelope = request.send().await?.json().await?;

        if envelope.kind == "error" {
            let message = serde_json::from_value::<ApiError>(envelope.result)
                .map(|err| err.message)
                .unwrap_or_default();
            return Err(Error::Api {
                status: envelope.status_code,
                message,
            });
        }

        Ok(envelope)
    }

    async fn sync<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let envelope = self.send(request).await?;
        Ok(serde_json::from_value(envelope.result)?)
    }

    /// Submits an async request and blocks until its change is ready.
    async fn change(&self, request: RequestBuilder) -> Result<()> {
        let id = self
            .send(request)
            .await?
            .change
            .ok_or(Error::UnexpectedResponse("async response without change id"))?;

        trace!(id, "Waiting for change");
        let Change { id, ready, err } = self
            .sync::<Change>(self.http.get(self.url(&format!("/v1/changes/{id}/wait"))))
            .await?;

        match (err, ready) {
            (Some(err), _) => Err(Error::Change { id, err }),
            (None, false) => Err(Error::Change {
                id,
                err: "change not ready".into(),
            }),
            (None, true) => Ok(()),
        }
    }

    async fn services(&self, name: &str) -> Result<Vec<ServiceInfo>> {
        self.sync(
            self.http
                .get(self.url("/v1/services"))
                .query(&[("names", name)]),
        )
        .await
    }

    async fn service_action(&self, action: &str, name: &str) -> Result<()> {
        debug!(action, name, "Service action");
        self.change(
            self.http
                .post(self.url("/v1/services"))
                .json(&json!({ "action": action, "services": [name] })),
        )
        .await
    }
}

#[async_trait]
impl Container for Client {
    async fn push(&self, path: &str, contents: &[u8]) -> Result<()> {
        let request = json!({
            "action": "write",
            "files": [{ "path": path, "make-dirs": true, "permissions": "644" }],
        });
        let form = Form::new()
            .part(
                "request",
                Part::text(request.to_string()).mime_str("application/json")?,
            )
            .part(
                "files",
                Part::bytes(contents.to_vec()).file_name(path.to_owned()),
            );

        trace!(path, "Pushing file");
        let results: Vec<FileResult> = self
            .sync(self.http.post(self.url("/v1/files")).multipart(form))
            .await?;

        match results.into_iter().find_map(|result| {
            result
                .error
                .map(|err| Error::Push {
                    path: result.path,
                    message: err.message,
                })
        }) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn add_layer(&self, label: &str, layer: &Layer) -> Result<()> {
        let body = json!({
            "action": "add",
            "combine": true,
            "label": label,
            "format": "yaml",
            "layer": serde_yaml::to_string(layer)?,
        });

        debug!(label, "Adding layer");
        self.send(self.http.post(self.url("/v1/layers")).json(&body))
            .await?;

        Ok(())
    }

    async fn planned_service(&self, name: &str) -> Result<Option<Service>> {
        let plan: String = self
            .sync(
                self.http
                    .get(self.url("/v1/plan"))
                    .query(&[("format", "yaml")]),
            )
            .await?;
        let mut plan: Plan = serde_yaml::from_str(&plan)?;

        Ok(plan.services.remove(name))
    }

    async fn is_running(&self, name: &str) -> Result<bool> {
        Ok(self
            .services(name)
            .await?
            .iter()
            .any(|info| info.name == name && info.current == ServiceStatus::Active))
    }

    async fn stop(&self, name: &str) -> Result<()> {
        self.service_action("stop", name).await
    }

    async fn start(&self, name: &str) -> Result<()> {
        self.service_action("start", name).await
    }
}
