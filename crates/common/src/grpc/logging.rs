use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use tower::{Layer, Service};
use tracing::{error, info, Instrument, Span};

use super::call::{header_status, GrpcMethod, IgnoredPaths};

/// Logs one line per gRPC call when its response headers are produced.
///
/// An accepted telemetry stream logs here as "opened"; its final status is
/// only known from the trailers.
#[derive(Clone)]
pub struct GrpcLoggingLayer {
    ignored: IgnoredPaths,
}

impl GrpcLoggingLayer {
    pub fn new(ignored: IgnoredPaths) -> Self {
        Self { ignored }
    }
}

impl<S> Layer<S> for GrpcLoggingLayer {
    type Service = GrpcLoggingService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        GrpcLoggingService {
            inner,
            ignored: self.ignored.clone(),
        }
    }
}

#[derive(Clone)]
pub struct GrpcLoggingService<S> {
    inner: S,
    ignored: IgnoredPaths,
}

impl<S, ReqBody, ResBody> Service<http::Request<ReqBody>> for GrpcLoggingService<S>
where
    S: Service<http::Request<ReqBody>, Response = http::Response<ResBody>>,
    S::Error: std::fmt::Display,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: http::Request<ReqBody>) -> Self::Future {
        let path = req.uri().path().to_string();
        let method = (!self.ignored.contains(&path)).then(|| GrpcMethod::from_path(&path));
        let started = Instant::now();
        let response = self.inner.call(req);

        Box::pin(
            async move {
                let result = response.await;
                let Some(method) = method else {
                    return result;
                };
                let duration_ms = started.elapsed().as_millis() as u64;

                match &result {
                    Ok(response) => match header_status(response.headers()) {
                        Some(grpc_status) => info!(
                            %path,
                            service = %method.service,
                            method = %method.method,
                            grpc_status,
                            duration_ms,
                            "gRPC call finished"
                        ),
                        None => info!(
                            %path,
                            service = %method.service,
                            method = %method.method,
                            http_status = response.status().as_u16(),
                            duration_ms,
                            "gRPC stream opened"
                        ),
                    },
                    Err(e) => error!(
                        %path,
                        service = %method.service,
                        method = %method.method,
                        duration_ms,
                        error = %e,
                        "gRPC call failed"
                    ),
                }

                result
            }
            .instrument(Span::current()),
        )
    }
}
