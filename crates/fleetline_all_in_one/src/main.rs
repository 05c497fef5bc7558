mod config;

use backlog_worker::backlog_worker::BacklogWorker;
use backlog_worker::domain::BacklogScheduler;
use common::domain::{AnalyticsEventProducer, BacklogRepository, DeviceHeartbeat};
use common::memory::InMemoryBacklogRepository;
use common::nats::NatsClient;
use common::postgres::{MigrationRunner, PostgresBacklogRepository, PostgresClient};
use common::telemetry::{init_telemetry, shutdown_telemetry, PipelineMetrics};
use crate::config::{BacklogBackend, ServiceConfig};
use fleetline_runner::Runner;
use ingestion::domain::{TelemetryQueryService, TelemetryService};
use ingestion::http::HttpState;
use ingestion::ingestion_api::IngestionApi;
use ingestion::nats::NatsAnalyticsEventProducer;
use ingestion::registry::{DeviceRegistryClient, NoopHeartbeat};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

#[tokio::main]
async fn main() {
    let config = match ServiceConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    // Tracing, optional OTel export and the Prometheus recorder
    let telemetry = match init_telemetry(&config.telemetry()) {
        Ok(telemetry) => telemetry,
        Err(e) => {
            eprintln!("Failed to initialize telemetry: {}", e);
            std::process::exit(1);
        }
    };

    info!(
        otel_enabled = config.otel_enabled,
        backlog_backend = ?config.backlog_backend,
        "Starting fleetline service"
    );
    debug!("Configuration: {:?}", config);

    let (backlog, nats_client) = match initialize_shared_dependencies(&config).await {
        Ok(deps) => deps,
        Err(e) => {
            error!("Failed to initialize shared dependencies: {:#}", e);
            std::process::exit(1);
        }
    };

    let heartbeat = match create_heartbeat(&config) {
        Ok(heartbeat) => heartbeat,
        Err(e) => {
            error!("Failed to initialize device registry client: {:#}", e);
            std::process::exit(1);
        }
    };

    let metrics = PipelineMetrics::new();
    let producer: Arc<dyn AnalyticsEventProducer> = Arc::new(NatsAnalyticsEventProducer::new(
        nats_client.create_publisher_client(),
        config.producer(),
        metrics.clone(),
    ));

    // Domain services
    let telemetry_service = Arc::new(
        TelemetryService::new(
            producer.clone(),
            backlog.clone(),
            heartbeat,
            metrics.clone(),
        )
        .with_max_concurrency(config.batch_max_concurrency),
    );
    let query_service = Arc::new(TelemetryQueryService::new(backlog.clone()));
    let scheduler = Arc::new(BacklogScheduler::new(
        backlog,
        producer,
        metrics,
        config.scheduler(),
    ));

    // Application modules
    let ingestion_api = IngestionApi::new(
        HttpState {
            telemetry: telemetry_service,
            queries: query_service,
            metrics_handle: telemetry.metrics_handle,
        },
        config.http_server(),
    );
    let backlog_worker = BacklogWorker::new(scheduler, config.backlog_worker());

    let telemetry_providers = telemetry.providers;
    let runner = Runner::new()
        .with_named_process("ingestion_api", ingestion_api.into_runner_process())
        .with_processes("backlog_worker", backlog_worker.into_runner_processes())
        .with_closer({
            let nats_for_close = Arc::clone(&nats_client);
            move || async move {
                info!("Running cleanup tasks...");
                nats_for_close.close().await;

                // flush pending traces and logs
                shutdown_telemetry(telemetry_providers);

                info!("Cleanup complete");
                Ok(())
            }
        })
        .with_closer_timeout(Duration::from_secs(10));

    std::process::exit(runner.run().await);
}

async fn initialize_shared_dependencies(
    config: &ServiceConfig,
) -> anyhow::Result<(Arc<dyn BacklogRepository>, Arc<NatsClient>)> {
    let backlog: Arc<dyn BacklogRepository> = match config.backlog_backend {
        BacklogBackend::Postgres => {
            info!("Initializing PostgreSQL...");
            let postgres = config.postgres();
            MigrationRunner::postgres(&postgres).run_migrations().await?;
            let client = PostgresClient::new(&postgres)?;
            client.ping().await?;
            Arc::new(PostgresBacklogRepository::new(client))
        }
        BacklogBackend::Memory => {
            warn!("Using in-memory backlog, records do not survive a restart");
            Arc::new(InMemoryBacklogRepository::new())
        }
    };

    info!("Initializing NATS...");
    let nats_client = Arc::new(
        NatsClient::connect(
            &config.nats_url,
            Duration::from_secs(config.startup_timeout_secs),
        )
        .await?,
    );
    nats_client.ensure_stream(&config.stream()).await?;

    Ok((backlog, nats_client))
}

fn create_heartbeat(config: &ServiceConfig) -> anyhow::Result<Arc<dyn DeviceHeartbeat>> {
    match &config.device_registry_url {
        Some(url) if !url.trim().is_empty() => {
            info!(url = %url, "Device heartbeats enabled");
            Ok(Arc::new(DeviceRegistryClient::new(
                url.clone(),
                Duration::from_secs(config.heartbeat_timeout_secs),
            )?))
        }
        _ => {
            debug!("No device registry configured, heartbeats disabled");
            Ok(Arc::new(NoopHeartbeat))
        }
    }
}
