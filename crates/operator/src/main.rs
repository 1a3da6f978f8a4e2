//! Energy operator
//!
//! Runs as a single-replica Deployment, steering workloads toward solar
//! nodes with healthy batteries and scaling the queue workers around
//! low-carbon hours.

use anyhow::{Context, Result};
use energy_operator::{
    api,
    config::{CarbonSourceKind, OperatorConfig, QueueReaderKind},
    shutdown::ShutdownSignal,
};
use operator_lib::{
    battery::BatteryMonitor,
    carbon::{CarbonIntensitySource, ElectricityMapsFeed, StaticProfile},
    cluster::{ClusterGateway, KubeGateway},
    health::{components, HealthRegistry},
    locks::DeploymentLocks,
    observability::{OperatorMetrics, StructuredLogger},
    placement::PlacementController,
    queue::{ExporterLagReader, QueueLag},
    scaling::ScalingController,
    store::{DecisionStore, EventStore},
    telemetry::{PrometheusClient, Telemetry},
    ControlLoopBuilder, EngineMode,
};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const OPERATOR_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting energy-operator");

    let config = OperatorConfig::load()?;
    info!(
        operator = %config.operator_name,
        modes = %config.mode_list(),
        store = %config.store_path.display(),
        "Operator configured"
    );

    let shutdown_signal = ShutdownSignal::install()?;

    let health_registry = HealthRegistry::new();
    health_registry.register_all(components::ALL).await;

    let metrics = OperatorMetrics::new();
    let logger = StructuredLogger::new(&config.operator_name);
    logger.log_startup(OPERATOR_VERSION, &config.mode_list());

    let store = open_store(&config)?;
    let decisions: Arc<dyn DecisionStore> = Arc::new(store.clone());

    let gateway: Arc<dyn ClusterGateway> = Arc::new(
        KubeGateway::try_default()
            .await
            .context("failed to create Kubernetes client")?,
    );
    let telemetry: Arc<dyn Telemetry> = Arc::new(
        PrometheusClient::new(&config.prometheus_url).context("invalid Prometheus URL")?,
    );
    let locks = DeploymentLocks::new();

    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let mut loop_handles = Vec::new();

    for mode in &config.modes {
        let builder = ControlLoopBuilder::new(*mode)
            .config(config.intervals.loop_config())
            .health(health_registry.clone());

        let builder = match mode {
            EngineMode::NodeAffinity => {
                let monitor = Arc::new(BatteryMonitor::new(
                    telemetry.clone(),
                    config.battery.query.clone(),
                    config.battery.lookback(),
                    config.battery.step(),
                ));
                builder.placement(
                    PlacementController::new(
                        gateway.clone(),
                        monitor,
                        decisions.clone(),
                        locks.clone(),
                        config.placement.clone(),
                    )
                    .with_logger(logger.clone()),
                )
            }
            EngineMode::QueueScaling => builder.scaling(
                ScalingController::new(
                    gateway.clone(),
                    queue_reader(&config, telemetry.clone())?,
                    carbon_source(&config)?,
                    decisions.clone(),
                    locks.clone(),
                    config.scaling.clone(),
                )
                .with_logger(logger.clone()),
            ),
        };

        let control = builder.build()?;
        let shutdown = shutdown_tx.subscribe();
        loop_handles.push((*mode, tokio::spawn(control.run(shutdown))));
    }

    let app_state = Arc::new(api::AppState::new(
        health_registry.clone(),
        metrics.clone(),
        decisions.clone(),
    ));

    // Mark operator as ready after initialization
    health_registry.set_ready(true).await;

    let api_handle = tokio::spawn(api::serve(config.api_port, app_state));

    // Wait for SIGINT or SIGTERM; both take the drain path below
    let received = shutdown_signal.recv().await?;
    logger.log_shutdown(&format!("{} received", received));
    health_registry.set_ready(false).await;

    // Loops finish the pass in flight before stopping
    let _ = shutdown_tx.send(());
    for (mode, handle) in loop_handles {
        match handle.await {
            Ok(Ok(())) => info!(mode = %mode, "Control loop stopped"),
            Ok(Err(e)) => error!(mode = %mode, error = %e, "Control loop failed"),
            Err(e) => error!(mode = %mode, error = %e, "Control loop task panicked"),
        }
    }

    store.close();
    api_handle.abort();
    info!("Shutting down");

    Ok(())
}

fn open_store(config: &OperatorConfig) -> Result<EventStore> {
    if let Some(parent) = config.store_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    EventStore::open(&config.store_path)
        .with_context(|| format!("failed to open store at {}", config.store_path.display()))
}

fn carbon_source(config: &OperatorConfig) -> Result<Arc<dyn CarbonIntensitySource>> {
    let settings = &config.carbon;
    let source: Arc<dyn CarbonIntensitySource> = match settings.source {
        CarbonSourceKind::Static if settings.profile.is_empty() => Arc::new(StaticProfile::default()),
        CarbonSourceKind::Static => Arc::new(StaticProfile::new(settings.profile.clone())?),
        CarbonSourceKind::ElectricityMaps => {
            let token = settings
                .auth_token()
                .context("missing ElectricityMaps auth token")?;
            Arc::new(ElectricityMapsFeed::new(
                &settings.base_url,
                settings.zone.clone(),
                token,
            )?)
        }
    };
    Ok(source)
}

fn queue_reader(config: &OperatorConfig, telemetry: Arc<dyn Telemetry>) -> Result<Arc<dyn QueueLag>> {
    match config.queue_reader {
        QueueReaderKind::Exporter => Ok(Arc::new(ExporterLagReader::new(telemetry))),
        #[cfg(feature = "kafka")]
        QueueReaderKind::Kafka => Ok(Arc::new(operator_lib::queue::KafkaLagReader::new(
            std::time::Duration::from_secs(10),
        ))),
        #[cfg(not(feature = "kafka"))]
        QueueReaderKind::Kafka => {
            anyhow::bail!("queue_reader = \"kafka\" needs the operator built with the kafka feature")
        }
    }
}
