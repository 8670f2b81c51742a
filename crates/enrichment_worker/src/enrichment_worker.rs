use crate::clickhouse::ClickHouseUsageRecordRepository;
use crate::domain::EnrichmentService;
use crate::http::HttpPricingOracle;
use crate::nats::TelemetryEventService;
use common::clickhouse::ClickHouseClient;
use common::nats::{
    stream_subject_filter, NatsClient, NatsConsumeLoggingLayer, NatsConsumeLoggingService,
    NatsConsumeTracingConfig, NatsConsumeTracingLayer, NatsConsumeTracingService, TowerConsumer,
    TowerConsumerConfig,
};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tracing::info;

pub struct EnrichmentWorkerConfig {
    /// Stream carrying telemetry events
    pub events_stream: String,
    /// Durable consumer name; workers sharing it split the stream
    pub consumer_group: String,
    pub nats_batch_size: usize,
    pub nats_batch_wait_secs: u64,
    pub clickhouse_table: String,
    pub pricing_oracle_url: String,
    pub pricing_oracle_timeout: Duration,
}

/// Consumer stack: tracing outermost so the logged outcome sits inside the message span
type EventConsumer =
    TowerConsumer<NatsConsumeTracingService<NatsConsumeLoggingService<TelemetryEventService>>>;

pub struct EnrichmentWorker {
    consumer: EventConsumer,
}

impl EnrichmentWorker {
    pub async fn new(
        clickhouse_client: ClickHouseClient,
        nats_client: &NatsClient,
        config: EnrichmentWorkerConfig,
    ) -> anyhow::Result<Self> {
        info!("Initializing enrichment worker module");

        let oracle = Arc::new(HttpPricingOracle::new(
            &config.pricing_oracle_url,
            config.pricing_oracle_timeout,
        )?);
        let repository = Arc::new(ClickHouseUsageRecordRepository::new(
            clickhouse_client,
            config.clickhouse_table.clone(),
        ));
        let enrichment = Arc::new(EnrichmentService::new(
            oracle,
            repository,
            config.pricing_oracle_timeout,
        ));

        let service = ServiceBuilder::new()
            .layer(NatsConsumeTracingLayer::new(NatsConsumeTracingConfig::new(
                "enrich_telemetry_event",
            )))
            .layer(NatsConsumeLoggingLayer::new())
            .service(TelemetryEventService::new(enrichment));

        let consumer = TowerConsumer::new(
            nats_client.create_consumer_client(),
            TowerConsumerConfig {
                stream_name: config.events_stream.clone(),
                consumer_name: config.consumer_group.clone(),
                subject_filter: stream_subject_filter(&config.events_stream),
                batch_size: config.nats_batch_size,
                max_wait: Duration::from_secs(config.nats_batch_wait_secs),
            },
            service,
        )
        .await?;

        info!(
            stream = %config.events_stream,
            consumer_group = %config.consumer_group,
            "Enrichment worker initialized"
        );

        Ok(Self { consumer })
    }

    pub fn into_runner_process(
        self,
    ) -> impl FnOnce(
        CancellationToken,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = anyhow::Result<()>> + Send>,
    > {
        move |ctx| Box::pin(async move { self.consumer.run(ctx).await })
    }
}
