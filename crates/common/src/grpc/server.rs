//! Reusable gRPC server: logging and tracing layers, reflection, graceful shutdown.
//!
//! ```ignore
//! let routes = Routes::new(FleetServiceServer::new(handler));
//!
//! run_grpc_server(config, routes, &[FILE_DESCRIPTOR_SET], token).await?;
//! ```

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tonic::service::Routes;
use tonic::transport::Server;
use tracing::{debug, info};

use super::{GrpcLoggingConfig, GrpcLoggingLayer, GrpcTracingConfig, GrpcTracingLayer};

/// Configuration for the gRPC server.
#[derive(Debug, Clone)]
pub struct GrpcServerConfig {
    pub host: String,
    pub port: u16,
    pub logging_config: GrpcLoggingConfig,
    pub tracing_config: GrpcTracingConfig,
    /// HTTP/2 PING interval; keeps long-lived streams alive through idle proxies
    pub http2_keepalive_interval: Option<Duration>,
}

impl Default for GrpcServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 50051,
            logging_config: GrpcLoggingConfig::default(),
            tracing_config: GrpcTracingConfig::default(),
            http2_keepalive_interval: Some(Duration::from_secs(30)),
        }
    }
}

impl GrpcServerConfig {
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid server address {}:{}", self.host, self.port))
    }
}

fn build_reflection_service(
    descriptors: &[&'static [u8]],
) -> anyhow::Result<
    tonic_reflection::server::ServerReflectionServer<
        impl tonic_reflection::server::ServerReflection,
    >,
> {
    let mut builder = tonic_reflection::server::Builder::configure();
    for descriptor in descriptors {
        builder = builder.register_encoded_file_descriptor_set(descriptor);
    }

    builder
        .build_v1()
        .context("Failed to build reflection service")
}

/// Serve `routes` until `cancellation_token` fires.
///
/// On cancellation the listener stops accepting and in-flight calls are
/// allowed to finish before this returns.
pub async fn run_grpc_server(
    config: GrpcServerConfig,
    routes: Routes,
    reflection_descriptors: &[&'static [u8]],
    cancellation_token: CancellationToken,
) -> anyhow::Result<()> {
    let addr = config.socket_addr()?;
    let reflection_service = build_reflection_service(reflection_descriptors)?;

    info!(address = %addr, "Starting gRPC server");

    let router = Server::builder()
        .http2_keepalive_interval(config.http2_keepalive_interval)
        .layer(GrpcTracingLayer::new(config.tracing_config.clone()))
        .layer(GrpcLoggingLayer::new(config.logging_config.clone()))
        .add_routes(routes)
        .add_service(reflection_service);

    router
        .serve_with_shutdown(addr, async move {
            cancellation_token.cancelled().await;
            debug!("gRPC server shutdown signal received");
        })
        .await
        .map_err(|e| {
            tracing::error!("gRPC server error: {}", e);
            anyhow::Error::from(e)
        })?;

    debug!("gRPC server stopped gracefully");
    Ok(())
}
