mod config;

use common::clickhouse::{ClickHouseClient, ClickHouseMigrationConfig, ClickHouseMigrator};
use common::grpc::{GrpcLoggingConfig, GrpcServerConfig, GrpcTracingConfig};
use common::nats::NatsClient;
use common::redis::RedisClient;
use common::telemetry::{init_telemetry, shutdown_telemetry, TelemetryConfig, TelemetryProviders};
use config::ServiceConfig;
use enrichment_worker::{EnrichmentWorker, EnrichmentWorkerConfig};
use fleet_runner::Runner;
use ingestion_gateway::{IngestionGateway, IngestionGatewayConfig};
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

    let telemetry_providers: Option<TelemetryProviders> = match init_telemetry(&TelemetryConfig {
        service_name: config.otel_service_name.clone(),
        otel_endpoint: config.otel_endpoint.clone(),
        otel_enabled: config.otel_enabled,
        log_level: config.log_level.clone(),
    }) {
        Ok(providers) => providers,
        Err(e) => {
            eprintln!("Failed to initialize telemetry: {}", e);
            std::process::exit(1);
        }
    };

    info!(
        otel_enabled = config.otel_enabled,
        otel_endpoint = %config.otel_endpoint,
        "Starting fleet-all-in-one service"
    );
    debug!("Configuration: {:?}", config);

    let (redis_client, clickhouse_client, nats_client) =
        match initialize_shared_dependencies(&config).await {
            Ok(deps) => deps,
            Err(e) => {
                error!("Failed to initialize shared dependencies: {:#}", e);
                std::process::exit(1);
            }
        };

    let ingestion_gateway = IngestionGateway::new(
        redis_client,
        &nats_client,
        IngestionGatewayConfig {
            grpc: build_grpc_config(&config),
            api_token: config.api_token.clone(),
            events_stream: config.nats_stream.clone(),
        },
    );

    let enrichment_worker = match EnrichmentWorker::new(
        clickhouse_client,
        &nats_client,
        EnrichmentWorkerConfig {
            events_stream: config.nats_stream.clone(),
            consumer_group: config.nats_consumer_group.clone(),
            nats_batch_size: config.nats_batch_size,
            nats_batch_wait_secs: config.nats_batch_wait_secs,
            clickhouse_table: config.clickhouse_table.clone(),
            pricing_oracle_url: config.pricing_oracle_url.clone(),
            pricing_oracle_timeout: Duration::from_millis(config.pricing_oracle_timeout_ms),
        },
    )
    .await
    {
        Ok(worker) => worker,
        Err(e) => {
            error!("Failed to initialize enrichment worker: {:#}", e);
            std::process::exit(1);
        }
    };

    Runner::new()
        .with_named_process("ingestion_gateway", ingestion_gateway.into_runner_process())
        .with_named_process("enrichment_worker", enrichment_worker.into_runner_process())
        .with_closer({
            let nats_for_close = Arc::clone(&nats_client);
            move || {
                Box::pin(async move {
                    info!("Running cleanup tasks...");
                    if let Err(e) = nats_for_close.close().await {
                        warn!(error = %e, "NATS flush failed during shutdown");
                    }

                    shutdown_telemetry(telemetry_providers);

                    info!("Cleanup complete");
                    Ok(())
                })
            }
        })
        .with_closer_timeout(Duration::from_secs(10))
        .run()
        .await;
}

fn build_grpc_config(config: &ServiceConfig) -> GrpcServerConfig {
    GrpcServerConfig {
        host: config.grpc_host.clone(),
        port: config.grpc_port,
        logging_config: GrpcLoggingConfig::from_comma_separated(&config.grpc_ignored_paths),
        tracing_config: GrpcTracingConfig::from_comma_separated(&config.grpc_ignored_paths),
        http2_keepalive_interval: (config.grpc_keepalive_secs > 0)
            .then(|| Duration::from_secs(config.grpc_keepalive_secs)),
    }
}

async fn initialize_shared_dependencies(
    config: &ServiceConfig,
) -> anyhow::Result<(RedisClient, ClickHouseClient, Arc<NatsClient>)> {
    let startup_timeout = Duration::from_secs(config.startup_timeout_secs);

    info!("Initializing Redis...");
    let redis_client = RedisClient::connect(&config.redis_url, startup_timeout).await?;

    info!("Initializing ClickHouse...");
    run_clickhouse_migrations(config).await?;
    let clickhouse_client = create_clickhouse_client(config).await?;

    info!("Initializing NATS...");
    let nats_client = Arc::new(NatsClient::connect(&config.nats_url, startup_timeout).await?);
    nats_client.ensure_stream(&config.nats_stream).await?;

    Ok((redis_client, clickhouse_client, nats_client))
}

async fn run_clickhouse_migrations(config: &ServiceConfig) -> anyhow::Result<()> {
    ClickHouseMigrator::new(ClickHouseMigrationConfig {
        goose_binary_path: config.clickhouse_goose_binary_path.clone(),
        migrations_dir: config.clickhouse_migrations_dir.clone(),
        native_url: config.clickhouse_native_url.clone(),
        database: config.clickhouse_database.clone(),
        username: config.clickhouse_username.clone(),
        password: config.clickhouse_password.clone(),
    })
    .run_migrations()
    .await
}

async fn create_clickhouse_client(config: &ServiceConfig) -> anyhow::Result<ClickHouseClient> {
    let client = ClickHouseClient::new(
        &config.clickhouse_url,
        &config.clickhouse_database,
        &config.clickhouse_username,
        &config.clickhouse_password,
    );
    client.ping().await?;
    Ok(client)
}
