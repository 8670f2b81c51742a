use crate::nats::traits::{InboundMessage, JetStreamConsumer, JetStreamPublisher, PullConsumer};
use anyhow::{Context, Result};
use async_nats::jetstream::{
    self,
    stream::{Config as StreamConfig, StorageType},
};
use async_nats::HeaderMap;
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Telemetry events are replayable for this long; older ones age out
const EVENT_RETENTION: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// JetStream connection shared by the gateway's publisher and the worker's consumer
pub struct NatsClient {
    client: async_nats::Client,
    jetstream: jetstream::Context,
}

impl NatsClient {
    pub async fn connect(url: &str, timeout: Duration) -> Result<Self> {
        info!(%url, timeout_ms = timeout.as_millis() as u64, "connecting to NATS");

        let client = async_nats::ConnectOptions::new()
            .name("fleet")
            .connection_timeout(timeout)
            .connect(url)
            .await
            .with_context(|| format!("Failed to connect to NATS at {}", url))?;

        debug!("NATS connection established");
        Ok(Self {
            jetstream: jetstream::new(client.clone()),
            client,
        })
    }

    /// Create the events stream unless it already exists.
    ///
    /// An existing stream is left as configured.
    pub async fn ensure_stream(&self, stream_name: &str) -> Result<()> {
        let stream = self
            .jetstream
            .get_or_create_stream(events_stream_config(stream_name))
            .await
            .with_context(|| format!("Failed to ensure stream {}", stream_name))?;

        info!(
            stream = %stream_name,
            subjects = ?stream.cached_info().config.subjects,
            "stream ready"
        );
        Ok(())
    }

    pub fn create_consumer_client(&self) -> Arc<dyn JetStreamConsumer> {
        Arc::new(NatsJetStreamConsumer::new(self.jetstream.clone()))
    }

    pub fn create_publisher_client(&self) -> Arc<dyn JetStreamPublisher> {
        Arc::new(NatsJetStreamPublisher::new(self.jetstream.clone()))
    }

    /// Flush pending publishes before the connection is dropped
    pub async fn close(&self) -> Result<()> {
        info!("flushing NATS connection");
        self.client
            .flush()
            .await
            .context("Failed to flush NATS connection")
    }
}

/// Wildcard covering every keyed subject of a stream
pub fn stream_subject_filter(stream_name: &str) -> String {
    format!("{}.*", stream_name)
}

/// File-backed stream holding `<stream>.<car_id>` subjects
fn events_stream_config(stream_name: &str) -> StreamConfig {
    StreamConfig {
        name: stream_name.to_string(),
        subjects: vec![stream_subject_filter(stream_name)],
        description: Some("Fleet telemetry events keyed by car id".to_string()),
        storage: StorageType::File,
        max_age: EVENT_RETENTION,
        ..Default::default()
    }
}

/// `JetStreamConsumer` over a live JetStream context
pub struct NatsJetStreamConsumer {
    context: jetstream::Context,
}

impl NatsJetStreamConsumer {
    pub fn new(context: jetstream::Context) -> Self {
        Self { context }
    }
}

#[async_trait]
impl JetStreamConsumer for NatsJetStreamConsumer {
    async fn create_consumer(
        &self,
        config: jetstream::consumer::pull::Config,
        stream_name: &str,
    ) -> Result<Box<dyn PullConsumer>> {
        let consumer = self
            .context
            .create_consumer_on_stream(config, stream_name)
            .await
            .context("Failed to create consumer")?;

        Ok(Box::new(NatsPullConsumer { consumer }))
    }
}

/// Durable pull consumer bound by `create_consumer`
pub struct NatsPullConsumer {
    consumer: jetstream::consumer::PullConsumer,
}

#[async_trait]
impl PullConsumer for NatsPullConsumer {
    async fn fetch_messages(
        &self,
        max_messages: usize,
        expires: Duration,
    ) -> Result<Vec<Box<dyn InboundMessage>>> {
        let batch = self
            .consumer
            .fetch()
            .max_messages(max_messages)
            .expires(expires)
            .messages()
            .await
            .context("Failed to fetch messages")?;

        // a broken delivery is redelivered after ack_wait; skip it in this batch
        Ok(batch
            .filter_map(|delivery| async move {
                match delivery {
                    Ok(message) => {
                        Some(Box::new(NatsInboundMessage { message }) as Box<dyn InboundMessage>)
                    }
                    Err(e) => {
                        warn!(error = %e, "dropping undeliverable message from batch");
                        None
                    }
                }
            })
            .collect()
            .await)
    }
}

/// JetStream message behind the `InboundMessage` seam
pub struct NatsInboundMessage {
    message: jetstream::Message,
}

#[async_trait]
impl InboundMessage for NatsInboundMessage {
    fn subject(&self) -> &str {
        self.message.subject.as_str()
    }

    fn payload(&self) -> Bytes {
        self.message.payload.clone()
    }

    fn headers(&self) -> Option<HeaderMap> {
        self.message.headers.clone()
    }

    async fn ack(&self) -> Result<()> {
        self.message
            .ack()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to ack message: {}", e))
    }

    async fn nak(&self) -> Result<()> {
        self.message
            .ack_with(jetstream::AckKind::Nak(None))
            .await
            .map_err(|e| anyhow::anyhow!("Failed to nak message: {}", e))
    }
}

/// Publishes and waits for the stream to persist the message
pub struct NatsJetStreamPublisher {
    context: jetstream::Context,
}

impl NatsJetStreamPublisher {
    pub fn new(context: jetstream::Context) -> Self {
        Self { context }
    }
}

#[async_trait]
impl JetStreamPublisher for NatsJetStreamPublisher {
    #[instrument(skip(self, headers, payload), fields(subject = %subject, payload_size = payload.len()))]
    async fn publish_with_headers(
        &self,
        subject: String,
        headers: HeaderMap,
        payload: Bytes,
    ) -> Result<()> {
        let persisted = self
            .context
            .publish_with_headers(subject, headers, payload)
            .await
            .context("Failed to publish message to JetStream")?
            .await
            .context("JetStream did not acknowledge publish")?;

        debug!(
            stream = %persisted.stream,
            sequence = persisted.sequence,
            "publish persisted"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_subject_filter() {
        assert_eq!(stream_subject_filter("fleet_events"), "fleet_events.*");
    }

    #[test]
    fn test_events_stream_config() {
        let config = events_stream_config("fleet_events");
        assert_eq!(config.name, "fleet_events");
        assert_eq!(config.subjects, vec!["fleet_events.*".to_string()]);
        assert_eq!(config.storage, StorageType::File);
        assert_eq!(config.max_age, EVENT_RETENTION);
    }
}
