use async_trait::async_trait;
use common::domain::{DomainError, DomainResult, TelemetryEvent, TelemetryEventProducer};
use common::nats::{JetStreamPublisher, PublishRequest, TracedPublisher};
use std::sync::Arc;
use tower::ServiceExt;
use tracing::debug;

/// Publishes telemetry events as JSON to `<stream>.<car_id>`.
///
/// The car id is the subject's last token, so the bus keeps per-agent order.
pub struct NatsTelemetryEventProducer {
    publisher: TracedPublisher,
    stream: String,
}

impl NatsTelemetryEventProducer {
    pub fn new(jetstream: Arc<dyn JetStreamPublisher>, stream: String) -> Self {
        debug!(stream = %stream, "initialized NatsTelemetryEventProducer");

        Self {
            publisher: TracedPublisher::new(jetstream, "telemetry_event_producer"),
            stream,
        }
    }

    pub fn subject_for(&self, car_id: &str) -> String {
        format!("{}.{}", self.stream, car_id)
    }
}

#[async_trait]
impl TelemetryEventProducer for NatsTelemetryEventProducer {
    async fn publish(&self, event: &TelemetryEvent) -> DomainResult<()> {
        let payload = serde_json::to_vec(event).map_err(|e| {
            DomainError::RepositoryError(anyhow::Error::new(e).context("failed to encode event"))
        })?;

        let request = PublishRequest::new(self.subject_for(&event.car_id), payload);

        self.publisher
            .clone()
            .oneshot(request)
            .await
            .map_err(DomainError::RepositoryError)?;

        Ok(())
    }
}
