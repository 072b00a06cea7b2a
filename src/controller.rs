use tracing::{debug, info, instrument, trace, warn};

use crate::config::LocalConfig;
use crate::context::Context;
use crate::publisher;
use crate::relation::RelationSnapshot;
use crate::resolver::{Resolution, Resolver};
use crate::signal::{Handler, Signal};
use crate::status::UnitStatus;
use crate::workload::{Replan, WorkloadReconciler};
use crate::{Error, Result};

pub struct Controller {
    ctx: Context,
    status: Option<UnitStatus>,
}

impl Controller {
    /// `status` is what the operator currently sees, if known.
    pub fn new(ctx: Context, status: Option<UnitStatus>) -> Self {
        Self { ctx, status }
    }

    pub fn status(&self) -> Option<&UnitStatus> {
        self.status.as_ref()
    }

    /// Runs the handler for `signal` to completion.
    ///
    /// On a collaborator failure the status shown before the signal is
    /// restored and the error is returned.
    #[instrument(skip(self, config))]
    pub async fn handle(&mut self, signal: Signal, config: &LocalConfig) -> Result<()> {
        let previous = self.status.clone();

        let result = match signal.handler() {
            Handler::Install => self.install(config).await,
            Handler::ConfigChanged => self.reconcile(config).await,
            Handler::KeystoneCredentials => self.keystone_credentials(config).await,
            Handler::TlsCertificates => self.tls_certificates(config).await,
        };

        if let Err(err) = &result {
            warn!(error = %err, "Handler failed");

            // Never leave a maintenance status from the failed attempt behind.
            let fallback = match previous {
                Some(previous) => Some(previous),
                None if self.status.is_some() => Some(UnitStatus::waiting(err.to_string())),
                None => None,
            };

            if let Some(status) = fallback {
                if let Err(err) = self.set_status(status).await {
                    warn!(error = %err, "Failed to restore status");
                }
            }
        }

        result
    }

    async fn install(&mut self, config: &LocalConfig) -> Result<()> {
        debug!(service = self.ctx.descriptor.name, "Install");
        self.apply_service().await?;

        self.reconcile(config).await
    }

    async fn apply_service(&self) -> Result<()> {
        self.ctx.cluster.apply(&self.ctx.descriptor).await?;
        if let Err(err) = self.ctx.events.service_applied(&self.ctx.descriptor).await {
            warn!(error = %err, "Failed to publish event");
        }

        Ok(())
    }

    async fn request_certificate(&self) -> Result<bool> {
        publisher::publish_certificate_request(
            self.ctx.relations.as_ref(),
            self.ctx.cluster.as_ref(),
            &self.ctx.descriptor,
            &self.ctx.unit_name,
        )
        .await
    }

    async fn keystone_credentials(&mut self, config: &LocalConfig) -> Result<()> {
        trace!(username = self.ctx.app_name, "Publishing username");
        publisher::publish_username(self.ctx.relations.as_ref(), &self.ctx.app_name).await?;

        self.reconcile(config).await
    }

    async fn tls_certificates(&mut self, config: &LocalConfig) -> Result<()> {
        trace!("Publishing certificate request");
        let requested = match self.request_certificate().await {
            // The Service is missing if the install signal failed to apply it.
            Err(Error::ServiceNotFound { .. }) => {
                info!(service = self.ctx.descriptor.name, "Webhook service missing, applying it");
                self.apply_service().await?;
                self.request_certificate().await
            }
            requested => requested,
        };

        match requested {
            Ok(_) => {}
            Err(err @ (Error::ServiceNotFound { .. } | Error::ServiceAddressMissing { .. })) => {
                info!(error = %err, "Webhook address not available yet");
                return self
                    .set_status(UnitStatus::waiting("waiting for webhook service address"))
                    .await;
            }
            Err(err) => return Err(err),
        }

        self.reconcile(config).await
    }

    async fn reconcile(&mut self, config: &LocalConfig) -> Result<()> {
        let relations = RelationSnapshot::read(self.ctx.relations.as_ref()).await?;

        let state = match Resolver::new(&self.ctx.unit_name).resolve(config, &relations) {
            Resolution::Ready(state) => state,
            Resolution::Pending(status) => return self.set_status(status).await,
        };

        let container = self.ctx.container.clone();
        let workload = WorkloadReconciler::new(container.as_ref());

        self.set_status(UnitStatus::maintenance("pushing webhook configuration"))
            .await?;
        workload.push_artifacts(&state).await?;

        self.set_status(UnitStatus::maintenance("starting webhook"))
            .await?;
        let replan = workload.replan(&state).await?;
        debug!(?replan, "Workload reconciled");

        if replan != Replan::Unchanged {
            if let Err(err) = self
                .ctx
                .events
                .workload_restarted(&self.ctx.descriptor)
                .await
            {
                warn!(error = %err, "Failed to publish event");
            }
        }

        self.set_status(UnitStatus::Active).await
    }

    async fn set_status(&mut self, status: UnitStatus) -> Result<()> {
        if self.status.as_ref() == Some(&status) {
            return Ok(());
        }

        info!(%status, "Status");
        self.ctx.status.set(&status).await?;
        self.status = Some(status);

        Ok(())
    }
}
