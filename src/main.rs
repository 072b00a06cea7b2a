use std::sync::Arc;

use keystone_auth_operator::{
    cluster::{KubeServiceApplier, ServiceDescriptor},
    config::ControllerConfig,
    context::{Context, ServiceEvents},
    controller::Controller,
    hook::HookTools,
    status::StatusReporter,
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let logger = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(std::io::stderr);
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .expect("Fallback should be valid");

    Registry::default().with(logger).with(env_filter).init();

    let config = ControllerConfig::load()?;
    let signal = config.signal()?;
    let app_name = config.app_name()?.to_owned();

    info!(unit = config.unit_name, ?signal, "Handling signal");

    let hooks = Arc::new(HookTools::new(&config.unit_name));
    let local_config = hooks.config().await?;
    let status = hooks.current().await?;

    let client = kube::Client::try_default().await?;

    let ctx = Context {
        unit_name: config.unit_name.clone(),
        descriptor: ServiceDescriptor::for_app(&app_name, &config.namespace),
        app_name,
        relations: hooks.clone(),
        cluster: Arc::new(KubeServiceApplier::new(
            client.clone(),
            &config.field_manager,
        )),
        container: Arc::new(pebble::Client::new(config.pebble_url.clone())),
        status: hooks,
        events: Arc::new(ServiceEvents::new(client, &config.field_manager)),
    };

    let mut controller = Controller::new(ctx, status);
    // A failed handler is retried by the next signal, not by the dispatcher.
    match controller.handle(signal, &local_config).await {
        Ok(()) => info!(status = ?controller.status(), "Signal handled"),
        Err(err) => warn!(error = %err, "Signal handling failed"),
    }

    Ok(())
}
