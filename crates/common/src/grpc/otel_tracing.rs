use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use http::{HeaderMap, Request, Response};
use opentelemetry::propagation::Extractor;
use opentelemetry::trace::TraceContextExt as _;
use opentelemetry::global;
use tower::{Layer, Service};
use tracing::{field, info_span, Instrument, Span};
use tracing_opentelemetry::OpenTelemetrySpanExt;

use super::call::{header_status, GrpcMethod, IgnoredPaths};

/// grpc-status UNKNOWN, reported when the inner service itself errors
const STATUS_UNKNOWN: i32 = 2;

/// Opens a server span per gRPC call, parented on the W3C trace context the
/// agent sent in its metadata. The span covers the call up to the response
/// headers; session work spawned for a stream records its own spans.
#[derive(Clone)]
pub struct GrpcTracingLayer {
    ignored: IgnoredPaths,
}

impl GrpcTracingLayer {
    pub fn new(ignored: IgnoredPaths) -> Self {
        Self { ignored }
    }
}

impl<S> Layer<S> for GrpcTracingLayer {
    type Service = GrpcTracingService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        GrpcTracingService {
            inner,
            ignored: self.ignored.clone(),
        }
    }
}

#[derive(Clone)]
pub struct GrpcTracingService<S> {
    inner: S,
    ignored: IgnoredPaths,
}

struct MetadataExtractor<'a>(&'a HeaderMap);

impl Extractor for MetadataExtractor<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.to_str().ok())
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(|k| k.as_str()).collect()
    }
}

fn server_span<B>(req: &Request<B>) -> Span {
    let GrpcMethod { service, method } = GrpcMethod::from_path(req.uri().path());
    let span = info_span!(
        target: "grpc",
        "grpc_request",
        otel.name = %method,
        otel.kind = "server",
        otel.status_code = field::Empty,
        rpc.system = "grpc",
        rpc.service = %service,
        rpc.method = %method,
        rpc.grpc.status_code = field::Empty,
        trace_id = field::Empty,
        span_id = field::Empty,
    );

    let parent = global::get_text_map_propagator(|propagator| {
        propagator.extract(&MetadataExtractor(req.headers()))
    });
    span.set_parent(parent);
    span
}

// ids exist only once the otel layer has seen the span entered
fn record_ids(span: &Span) {
    let context = span.context();
    let span_ref = context.span();
    let ids = span_ref.span_context();
    if ids.is_valid() {
        span.record("trace_id", ids.trace_id().to_string());
        span.record("span_id", ids.span_id().to_string());
    }
}

fn record_status(span: &Span, status: Option<i32>) {
    if let Some(code) = status {
        span.record("rpc.grpc.status_code", code);
        if code != 0 {
            span.record("otel.status_code", "ERROR");
        }
    }
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for GrpcTracingService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Error: std::fmt::Display,
    S::Future: Send + 'static,
    ReqBody: Send + 'static,
    ResBody: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        if self.ignored.contains(req.uri().path()) {
            return Box::pin(self.inner.call(req));
        }

        let span = server_span(&req);
        let mut inner = self.inner.clone();

        Box::pin(
            async move {
                let span = Span::current();
                record_ids(&span);

                let result = inner.call(req).await;
                let status = match &result {
                    Ok(response) => header_status(response.headers()),
                    Err(_) => Some(STATUS_UNKNOWN),
                };
                record_status(&span, status);

                result
            }
            .instrument(span),
        )
    }
}
