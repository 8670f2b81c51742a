#![cfg(feature = "integration-tests")]

use anyhow::Result;
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use common::clickhouse::{ClickHouseClient, ClickHouseMigrationConfig, ClickHouseMigrator};
use common::domain::PositionIndex;
use common::grpc::GrpcServerConfig;
use common::nats::NatsClient;
use common::redis::RedisClient;
use enrichment_worker::clickhouse::ClickHouseUsageRecordRepository;
use enrichment_worker::{EnrichmentWorker, EnrichmentWorkerConfig};
use fleet_proto::fleet::v1::fleet_service_client::FleetServiceClient;
use fleet_proto::fleet::v1::{AckStatus, CarStatus};
use fleet_runner::{RunOutcome, Runner};
use ingestion_gateway::redis::RedisPositionIndex;
use ingestion_gateway::{IngestionGateway, IngestionGatewayConfig};
use pricing_oracle::http::pricing_router;
use std::sync::Arc;
use std::time::Duration;
use testcontainers::core::{ContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, GenericImage, Image, ImageExt};
use testcontainers_modules::clickhouse::ClickHouse;
use testcontainers_modules::redis::{Redis, REDIS_PORT};
use tokio::net::TcpListener;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tonic::Request;

const API_TOKEN: &str = "e2e-token";
const STREAM: &str = "fleet_events_e2e";

/// ClickHouse 24.10 with the native port exposed for goose
#[derive(Debug, Clone)]
struct ClickHouse24 {
    inner: ClickHouse,
    ports: Vec<ContainerPort>,
}

impl Default for ClickHouse24 {
    fn default() -> Self {
        Self {
            inner: ClickHouse::default(),
            ports: vec![ContainerPort::Tcp(8123), ContainerPort::Tcp(9000)],
        }
    }
}

impl Image for ClickHouse24 {
    fn name(&self) -> &str {
        "clickhouse/clickhouse-server"
    }

    fn tag(&self) -> &str {
        "24.10"
    }

    fn ready_conditions(&self) -> Vec<WaitFor> {
        self.inner.ready_conditions()
    }

    fn env_vars(
        &self,
    ) -> impl IntoIterator<
        Item = (
            impl Into<std::borrow::Cow<'_, str>>,
            impl Into<std::borrow::Cow<'_, str>>,
        ),
    > {
        self.inner.env_vars()
    }

    fn expose_ports(&self) -> &[ContainerPort] {
        &self.ports
    }
}

struct Containers {
    _redis: ContainerAsync<Redis>,
    _clickhouse: ContainerAsync<ClickHouse24>,
    _nats: ContainerAsync<GenericImage>,
    redis_url: String,
    clickhouse_http_url: String,
    clickhouse_native_url: String,
    nats_url: String,
}

async fn start_containers() -> Result<Containers> {
    let nats_image = GenericImage::new("nats", "latest")
        .with_exposed_port(ContainerPort::Tcp(4222))
        .with_wait_for(WaitFor::message_on_stderr("Server is ready"))
        .with_cmd(["-js"]);

    let (redis, clickhouse, nats) = tokio::join!(
        Redis::default().start(),
        ClickHouse24::default().start(),
        nats_image.start()
    );
    let redis = redis?;
    let clickhouse = clickhouse?;
    let nats = nats?;

    let redis_url = format!(
        "redis://{}:{}",
        redis.get_host().await?,
        redis.get_host_port_ipv4(REDIS_PORT).await?
    );

    let ch_host = clickhouse.get_host().await?;
    let clickhouse_http_url = format!(
        "http://{}:{}",
        ch_host,
        clickhouse.get_host_port_ipv4(8123).await?
    );
    let clickhouse_native_url = format!(
        "{}:{}",
        ch_host,
        clickhouse.get_host_port_ipv4(9000).await?
    );

    let nats_url = format!(
        "nats://{}:{}",
        nats.get_host().await?,
        nats.get_host_port_ipv4(4222).await?
    );

    Ok(Containers {
        _redis: redis,
        _clickhouse: clickhouse,
        _nats: nats,
        redis_url,
        clickhouse_http_url,
        clickhouse_native_url,
        nats_url,
    })
}

async fn run_migrations(clickhouse_native_url: &str) -> Result<()> {
    let goose_path = which::which("goose").expect("goose binary not found");
    let workspace_root = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .and_then(|p| p.parent())
        .expect("Failed to find workspace root");

    ClickHouseMigrator::new(ClickHouseMigrationConfig {
        goose_binary_path: goose_path.to_string_lossy().to_string(),
        migrations_dir: workspace_root
            .join("crates/enrichment_worker/migrations/clickhouse")
            .to_string_lossy()
            .to_string(),
        native_url: clickhouse_native_url.to_string(),
        database: "default".to_string(),
        username: "default".to_string(),
        password: String::new(),
    })
    .run_migrations()
    .await
}

/// Serves the pricing router with the clock pinned to noon UTC
async fn start_pricing_oracle(shutdown: CancellationToken) -> Result<String> {
    let noon: DateTime<Utc> = Utc.with_ymd_and_hms(2023, 12, 2, 12, 0, 0).unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    tokio::spawn(async move {
        axum::serve(listener, pricing_router(Arc::new(move || noon)))
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
            .unwrap();
    });

    Ok(format!("http://{}", addr))
}

async fn free_port() -> Result<u16> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    Ok(listener.local_addr()?.port())
}

fn car_status(battery_level: f64, timestamp: i64) -> CarStatus {
    CarStatus {
        car_id: "CAR-001".to_string(),
        latitude: 40.7234,
        longitude: -73.9876,
        battery_level,
        velocity: 45.2,
        timestamp,
    }
}

#[tokio::test]
async fn test_frames_flow_to_index_and_usage_store() -> Result<()> {
    let containers = start_containers().await?;
    run_migrations(&containers.clickhouse_native_url).await?;

    let shutdown = CancellationToken::new();
    let pricing_url = start_pricing_oracle(shutdown.clone()).await?;

    let redis_client = RedisClient::connect(&containers.redis_url, Duration::from_secs(10)).await?;
    let clickhouse_client =
        ClickHouseClient::new(&containers.clickhouse_http_url, "default", "default", "");
    clickhouse_client.ping().await?;
    let nats_client = NatsClient::connect(&containers.nats_url, Duration::from_secs(10)).await?;
    nats_client.ensure_stream(STREAM).await?;

    let grpc_port = free_port().await?;
    let gateway = IngestionGateway::new(
        redis_client.clone(),
        &nats_client,
        IngestionGatewayConfig {
            grpc: GrpcServerConfig {
                host: "127.0.0.1".to_string(),
                port: grpc_port,
                ..GrpcServerConfig::default()
            },
            api_token: API_TOKEN.to_string(),
            events_stream: STREAM.to_string(),
        },
    );
    let worker = EnrichmentWorker::new(
        clickhouse_client.clone(),
        &nats_client,
        EnrichmentWorkerConfig {
            events_stream: STREAM.to_string(),
            consumer_group: "pricing-worker-group".to_string(),
            nats_batch_size: 10,
            nats_batch_wait_secs: 1,
            clickhouse_table: "charging_sessions".to_string(),
            pricing_oracle_url: pricing_url,
            pricing_oracle_timeout: Duration::from_secs(5),
        },
    )
    .await?;

    let runner = tokio::spawn(
        Runner::new()
            .with_named_process("ingestion_gateway", gateway.into_runner_process())
            .with_named_process("enrichment_worker", worker.into_runner_process())
            .with_cancellation_token(shutdown.clone())
            .without_signal_handlers()
            .run_until_stopped(),
    );

    // Give the gRPC listener a moment to bind
    let mut client = None;
    for _ in 0..50 {
        match FleetServiceClient::connect(format!("http://127.0.0.1:{}", grpc_port)).await {
            Ok(c) => {
                client = Some(c);
                break;
            }
            Err(_) => sleep(Duration::from_millis(100)).await,
        }
    }
    let mut client = client.expect("gateway never came up");

    let base_ts = Utc::now().timestamp_millis();
    let frames = vec![
        car_status(85.3, base_ts),
        car_status(140.0, base_ts + 1),
        car_status(84.9, base_ts + 2),
    ];
    let mut request = Request::new(tokio_stream::iter(frames));
    request
        .metadata_mut()
        .insert("x-api-token", API_TOKEN.parse().unwrap());

    let mut acks = client.stream_telemetry(request).await?.into_inner();
    let mut statuses = Vec::new();
    while let Some(ack) = acks.message().await? {
        assert_eq!(ack.car_id, "CAR-001");
        statuses.push(ack.status());
    }
    assert_eq!(
        statuses,
        vec![AckStatus::Received, AckStatus::Rejected, AckStatus::Received]
    );

    // Positional index holds the last accepted frame
    let index = RedisPositionIndex::new(redis_client);
    let position = index
        .get_position("CAR-001")
        .await?
        .expect("CAR-001 should be indexed");
    assert_eq!(position.battery_level, 84.9);
    assert_eq!(position.last_seen, base_ts + 2);

    // Worker prices both accepted frames at the noon rate
    let repository =
        ClickHouseUsageRecordRepository::new(clickhouse_client, "charging_sessions".to_string());
    let from = DateTime::<Utc>::from_timestamp_millis(base_ts).unwrap();
    let to = from + ChronoDuration::seconds(1);

    let mut records = Vec::new();
    for _ in 0..60 {
        records = repository.list_by_car("CAR-001", from, to).await?;
        if records.len() >= 2 {
            break;
        }
        sleep(Duration::from_millis(500)).await;
    }

    assert_eq!(records.len(), 2, "expected one usage record per accepted frame");
    assert_eq!(records[0].time.timestamp_millis(), base_ts);
    assert_eq!(records[1].time.timestamp_millis(), base_ts + 2);
    for record in &records {
        assert_eq!(record.station_id, "station-9");
        assert_eq!(record.price_rate, 0.36);
        assert!(record.session_id.starts_with("session-"));
    }
    assert!((records[0].kwh_usage - 18.53).abs() < 1e-9);

    shutdown.cancel();
    let outcome = tokio::time::timeout(Duration::from_secs(30), runner).await??;
    assert!(matches!(outcome, RunOutcome::Stopped));

    Ok(())
}
