use crate::domain::TelemetryIngestionService;
use crate::grpc::auth::validate_api_token;
use crate::grpc::session::run_session;
use common::grpc::domain_error_to_status;
use fleet_proto::fleet::v1::fleet_service_server::FleetService;
use fleet_proto::fleet::v1::{CarStatus, TelemetryAck};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tonic::{Request, Response, Status, Streaming};
use tracing::{info_span, instrument, warn, Instrument};

/// Acks buffered per session before the session stops reading frames
const ACK_BUFFER: usize = 32;

/// gRPC handler for FleetService
pub struct FleetServiceHandler {
    ingestion_service: Arc<TelemetryIngestionService>,
    api_token: String,
    shutdown: CancellationToken,
}

impl FleetServiceHandler {
    pub fn new(
        ingestion_service: Arc<TelemetryIngestionService>,
        api_token: String,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            ingestion_service,
            api_token,
            shutdown,
        }
    }
}

#[tonic::async_trait]
impl FleetService for FleetServiceHandler {
    type StreamTelemetryStream = ReceiverStream<Result<TelemetryAck, Status>>;

    #[instrument(
        name = "StreamTelemetry",
        skip(self, request),
        fields(remote_addr = ?request.remote_addr())
    )]
    async fn stream_telemetry(
        &self,
        request: Request<Streaming<CarStatus>>,
    ) -> Result<Response<Self::StreamTelemetryStream>, Status> {
        validate_api_token(request.metadata(), &self.api_token).map_err(|e| {
            warn!(error = %e, "rejecting unauthenticated telemetry session");
            domain_error_to_status(e)
        })?;

        let remote_addr = request.remote_addr();
        let inbound = request.into_inner();
        let (tx, rx) = mpsc::channel(ACK_BUFFER);

        let session_span = info_span!("telemetry_session", remote_addr = ?remote_addr);
        tokio::spawn(
            run_session(
                inbound,
                tx,
                Arc::clone(&self.ingestion_service),
                self.shutdown.child_token(),
            )
            .instrument(session_span),
        );

        Ok(Response::new(ReceiverStream::new(rx)))
    }
}
