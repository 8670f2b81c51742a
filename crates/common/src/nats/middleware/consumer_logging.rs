use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use crate::nats::{ConsumeRequest, ConsumeResponse};
use tower::{Layer, Service};
use tracing::{debug, error, warn, Instrument, Span};

/// Records how each consumed message was settled.
///
/// Acks are the steady state (one per telemetry event) and log at debug;
/// naks carry their reason at warn.
#[derive(Clone, Default)]
pub struct NatsConsumeLoggingLayer;

impl NatsConsumeLoggingLayer {
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for NatsConsumeLoggingLayer {
    type Service = NatsConsumeLoggingService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        NatsConsumeLoggingService { inner }
    }
}

#[derive(Clone)]
pub struct NatsConsumeLoggingService<S> {
    inner: S,
}

impl<S> Service<ConsumeRequest> for NatsConsumeLoggingService<S>
where
    S: Service<ConsumeRequest, Response = ConsumeResponse> + Clone + Send + 'static,
    S::Error: std::fmt::Display + Send,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: ConsumeRequest) -> Self::Future {
        let subject = req.subject.clone();
        let key = req.subject_key().to_string();
        let payload_bytes = req.payload.len();
        let started = Instant::now();
        let mut inner = self.inner.clone();

        Box::pin(
            async move {
                let result = inner.call(req).await;
                let duration_ms = started.elapsed().as_millis() as u64;

                match &result {
                    Ok(ConsumeResponse::Ack) => debug!(
                        %subject,
                        %key,
                        payload_bytes,
                        duration_ms,
                        "message acked"
                    ),
                    Ok(ConsumeResponse::Nak(reason)) => warn!(
                        %subject,
                        %key,
                        payload_bytes,
                        duration_ms,
                        reason = reason.as_deref().unwrap_or("unspecified"),
                        "message nacked for redelivery"
                    ),
                    Err(e) => error!(
                        %subject,
                        %key,
                        payload_bytes,
                        duration_ms,
                        error = %e,
                        "message handler failed"
                    ),
                }

                result
            }
            .instrument(Span::current()),
        )
    }
}
