use crate::nats::{ConsumeRequest, ConsumeResponse, InboundMessage, JetStreamConsumer, PullConsumer};
use anyhow::{Context, Result};
use async_nats::jetstream;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower::{Service, ServiceExt};
use tracing::{debug, error, info, warn};

/// Settings for a durable pull consumer
#[derive(Debug, Clone)]
pub struct TowerConsumerConfig {
    pub stream_name: String,
    /// Durable name; every worker sharing it splits the stream's messages
    pub consumer_name: String,
    pub subject_filter: String,
    pub batch_size: usize,
    pub max_wait: Duration,
}

/// A NATS pull consumer that feeds messages one at a time through a Tower service.
///
/// The service decides ack or nak per message. Cancellation is observed while
/// waiting for a batch and between messages, never in the middle of one.
pub struct TowerConsumer<S> {
    consumer: Box<dyn PullConsumer>,
    config: TowerConsumerConfig,
    service: S,
}

impl<S> TowerConsumer<S>
where
    S: Service<ConsumeRequest, Response = ConsumeResponse, Error = anyhow::Error>
        + Send
        + 'static,
    S::Future: Send + 'static,
{
    pub async fn new(
        jetstream: Arc<dyn JetStreamConsumer>,
        config: TowerConsumerConfig,
        service: S,
    ) -> Result<Self> {
        debug!(
            stream = %config.stream_name,
            consumer = %config.consumer_name,
            filter_subject = %config.subject_filter,
            "creating tower nats consumer"
        );

        let pull_config = jetstream::consumer::pull::Config {
            name: Some(config.consumer_name.clone()),
            durable_name: Some(config.consumer_name.clone()),
            filter_subject: config.subject_filter.clone(),
            ack_policy: jetstream::consumer::AckPolicy::Explicit,
            ..Default::default()
        };

        let consumer = jetstream
            .create_consumer(pull_config, &config.stream_name)
            .await
            .context("failed to create consumer")?;

        Ok(Self {
            consumer,
            config,
            service,
        })
    }

    /// Run the consumer loop until cancellation
    pub async fn run(mut self, ctx: CancellationToken) -> Result<()> {
        info!(
            stream = %self.config.stream_name,
            consumer = %self.config.consumer_name,
            "starting tower nats consumer"
        );

        loop {
            let fetched = tokio::select! {
                _ = ctx.cancelled() => break,
                result = self
                    .consumer
                    .fetch_messages(self.config.batch_size, self.config.max_wait) => result,
            };

            match fetched {
                Ok(messages) => self.process_batch(messages, &ctx).await,
                Err(e) => {
                    error!(
                        stream = %self.config.stream_name,
                        consumer = %self.config.consumer_name,
                        error = %e,
                        "error fetching batch"
                    );
                    tokio::select! {
                        _ = ctx.cancelled() => break,
                        _ = tokio::time::sleep(Duration::from_secs(1)) => {}
                    }
                }
            }
        }

        info!(
            stream = %self.config.stream_name,
            consumer = %self.config.consumer_name,
            "consumer stopped gracefully"
        );
        Ok(())
    }

    async fn process_batch(
        &mut self,
        messages: Vec<Box<dyn InboundMessage>>,
        ctx: &CancellationToken,
    ) {
        if messages.is_empty() {
            debug!("no messages in batch");
            return;
        }

        let total = messages.len();
        debug!(message_count = total, "received message batch");

        for (processed, msg) in messages.into_iter().enumerate() {
            if ctx.is_cancelled() {
                // left un-acked so the broker redelivers them
                info!(
                    unprocessed = total - processed,
                    "shutdown requested, leaving remaining messages unacknowledged"
                );
                return;
            }
            self.process_message(msg.as_ref()).await;
        }
    }

    async fn process_message(&mut self, msg: &dyn InboundMessage) {
        let request = ConsumeRequest::new(msg.subject().to_string(), msg.payload(), msg.headers());

        let response = match self.service.ready().await {
            Ok(service) => service.call(request).await,
            Err(e) => Err(e),
        };

        let response = response.unwrap_or_else(|e| {
            error!(subject = %msg.subject(), error = %e, "service error processing message");
            ConsumeResponse::nak(e.to_string())
        });

        match response {
            ConsumeResponse::Ack => {
                if let Err(e) = msg.ack().await {
                    error!(subject = %msg.subject(), error = %e, "failed to acknowledge message");
                }
            }
            ConsumeResponse::Nak(reason) => {
                warn!(
                    subject = %msg.subject(),
                    reason = reason.as_deref().unwrap_or("none"),
                    "rejecting message"
                );
                if let Err(e) = msg.nak().await {
                    error!(subject = %msg.subject(), error = %e, "failed to reject message");
                }
            }
        }
    }
}
