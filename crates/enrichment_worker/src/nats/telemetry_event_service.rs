use crate::domain::{EnrichmentOutcome, EnrichmentService};
use common::domain::TelemetryEvent;
use common::nats::{ConsumeRequest, ConsumeResponse};
use futures::future::BoxFuture;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::Service;
use tracing::{debug, warn};

/// Tower service for consuming telemetry events off the bus.
///
/// Every outcome acks: enrichment is best-effort, so a message that cannot be
/// priced or persisted is dropped rather than redelivered.
#[derive(Clone)]
pub struct TelemetryEventService {
    enrichment: Arc<EnrichmentService>,
}

impl TelemetryEventService {
    pub fn new(enrichment: Arc<EnrichmentService>) -> Self {
        Self { enrichment }
    }
}

impl Service<ConsumeRequest> for TelemetryEventService {
    type Response = ConsumeResponse;
    type Error = anyhow::Error;
    type Future = BoxFuture<'static, Result<ConsumeResponse, anyhow::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: ConsumeRequest) -> Self::Future {
        let enrichment = Arc::clone(&self.enrichment);

        Box::pin(async move {
            let event: TelemetryEvent = match serde_json::from_slice(&req.payload) {
                Ok(event) => event,
                Err(e) => {
                    warn!(error = %e, subject = %req.subject, "dropping undecodable event");
                    return Ok(ConsumeResponse::ack());
                }
            };

            if !event.is_telemetry() {
                debug!(event_type = %event.event_type, "ignoring non-telemetry event");
                return Ok(ConsumeResponse::ack());
            }

            match enrichment.enrich(&event).await {
                EnrichmentOutcome::Persisted(_) => {}
                EnrichmentOutcome::Skipped(e) => {
                    debug!(error = %e, car_id = %event.car_id, "event not enriched");
                }
                EnrichmentOutcome::PersistFailed(e) => {
                    debug!(error = %e, car_id = %event.car_id, "event enriched but not stored");
                }
            }

            Ok(ConsumeResponse::ack())
        })
    }
}
