use crate::domain::TelemetryIngestionService;
use crate::grpc::run_gateway_grpc_server;
use crate::nats::NatsTelemetryEventProducer;
use crate::redis::RedisPositionIndex;
use common::grpc::GrpcServerConfig;
use common::nats::NatsClient;
use common::redis::RedisClient;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub struct IngestionGatewayConfig {
    pub grpc: GrpcServerConfig,
    /// Shared secret agents present in `x-api-token`
    pub api_token: String,
    /// Stream the gateway publishes telemetry events to
    pub events_stream: String,
}

pub struct IngestionGateway {
    ingestion_service: Arc<TelemetryIngestionService>,
    config: IngestionGatewayConfig,
}

impl IngestionGateway {
    pub fn new(
        redis_client: RedisClient,
        nats_client: &NatsClient,
        config: IngestionGatewayConfig,
    ) -> Self {
        debug!("Initializing ingestion gateway module");

        let position_index = Arc::new(RedisPositionIndex::new(redis_client));
        let event_producer = Arc::new(NatsTelemetryEventProducer::new(
            nats_client.create_publisher_client(),
            config.events_stream.clone(),
        ));

        Self {
            ingestion_service: Arc::new(TelemetryIngestionService::new(
                position_index,
                event_producer,
            )),
            config,
        }
    }

    pub fn into_runner_process(
        self,
    ) -> impl FnOnce(
        CancellationToken,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = anyhow::Result<()>> + Send>,
    > {
        move |ctx| {
            Box::pin(async move {
                run_gateway_grpc_server(
                    self.config.grpc,
                    self.ingestion_service,
                    self.config.api_token,
                    ctx,
                )
                .await
            })
        }
    }
}
