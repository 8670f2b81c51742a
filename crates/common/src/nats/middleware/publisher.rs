use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use crate::nats::trace_context::inject_trace_context;
use crate::nats::JetStreamPublisher;
use async_nats::HeaderMap;
use bytes::Bytes;
use tower::Service;
use tracing::{debug, error, field, info_span, Instrument, Span};

/// One message bound for JetStream
#[derive(Debug, Clone)]
pub struct PublishRequest {
    pub subject: String,
    pub payload: Bytes,
    pub headers: HeaderMap,
}

impl PublishRequest {
    pub fn new(subject: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            subject: subject.into(),
            payload: payload.into(),
            headers: HeaderMap::new(),
        }
    }
}

/// Publishes inside a producer span and stamps that span's W3C context into
/// the message headers, so the consuming worker continues the same trace.
#[derive(Clone)]
pub struct TracedPublisher {
    publisher: Arc<dyn JetStreamPublisher>,
    service_name: Arc<str>,
}

impl TracedPublisher {
    pub fn new(publisher: Arc<dyn JetStreamPublisher>, service_name: impl Into<Arc<str>>) -> Self {
        Self {
            publisher,
            service_name: service_name.into(),
        }
    }
}

impl Service<PublishRequest> for TracedPublisher {
    type Response = ();
    type Error = anyhow::Error;
    type Future = Pin<Box<dyn Future<Output = Result<(), anyhow::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, mut req: PublishRequest) -> Self::Future {
        let payload_bytes = req.payload.len();
        let span = info_span!(
            target: "nats",
            "nats_publish",
            otel.name = "nats_publish",
            otel.kind = "producer",
            otel.status_code = field::Empty,
            messaging.system = "nats",
            messaging.destination.name = %req.subject,
            messaging.message.body.size = payload_bytes,
            service.name = %self.service_name,
        );
        span.in_scope(|| inject_trace_context(&mut req.headers));

        let publisher = Arc::clone(&self.publisher);

        Box::pin(
            async move {
                let started = Instant::now();
                let PublishRequest {
                    subject,
                    payload,
                    headers,
                } = req;

                let result = publisher
                    .publish_with_headers(subject.clone(), headers, payload)
                    .await;
                let duration_ms = started.elapsed().as_millis() as u64;

                // one publish per frame, so successes stay at debug
                match &result {
                    Ok(()) => debug!(%subject, payload_bytes, duration_ms, "event published"),
                    Err(e) => {
                        Span::current().record("otel.status_code", "ERROR");
                        error!(%subject, payload_bytes, duration_ms, error = %e, "publish failed");
                    }
                }

                result
            }
            .instrument(span),
        )
    }
}
