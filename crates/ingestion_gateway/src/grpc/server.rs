use crate::domain::TelemetryIngestionService;
use crate::grpc::FleetServiceHandler;
use common::grpc::{run_grpc_server, GrpcServerConfig};
use fleet_proto::fleet::v1::fleet_service_server::FleetServiceServer;
use fleet_proto::fleet::v1::FILE_DESCRIPTOR_SET;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tonic::service::Routes;

pub const REFLECTION_DESCRIPTORS: &[&[u8]] = &[FILE_DESCRIPTOR_SET];

pub fn build_gateway_routes(handler: FleetServiceHandler) -> Routes {
    Routes::new(FleetServiceServer::new(handler))
}

/// Serve the FleetService until `cancellation_token` fires.
///
/// Open sessions observe the same token and close after their current frame.
pub async fn run_gateway_grpc_server(
    config: GrpcServerConfig,
    ingestion_service: Arc<TelemetryIngestionService>,
    api_token: String,
    cancellation_token: CancellationToken,
) -> anyhow::Result<()> {
    let handler =
        FleetServiceHandler::new(ingestion_service, api_token, cancellation_token.clone());
    let routes = build_gateway_routes(handler);

    run_grpc_server(config, routes, REFLECTION_DESCRIPTORS, cancellation_token).await
}
