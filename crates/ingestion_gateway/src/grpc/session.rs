use crate::domain::TelemetryIngestionService;
use crate::grpc::conversions::{acknowledgment_to_proto, car_status_to_frame};
use fleet_proto::fleet::v1::{CarStatus, TelemetryAck};
use futures::{Stream, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tonic::Status;
use tracing::{debug, info, warn};

/// Why a session's receive loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The agent half-closed its side of the stream
    PeerClosed,
    /// The agent stopped reading acknowledgments
    PeerGone,
    TransportError,
    Shutdown,
}

/// Drive one authenticated telemetry session.
///
/// Frames are handled strictly in arrival order, one at a time. Shutdown is
/// only observed between frames, so a frame that has started is always fully
/// written and acknowledged. Returning drops `outbound`, which closes the
/// response stream.
pub async fn run_session<S>(
    inbound: S,
    outbound: mpsc::Sender<Result<TelemetryAck, Status>>,
    service: Arc<TelemetryIngestionService>,
    shutdown: CancellationToken,
) -> SessionEnd
where
    S: Stream<Item = Result<CarStatus, Status>> + Send,
{
    tokio::pin!(inbound);
    let mut frames: u64 = 0;

    let end = loop {
        let next = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break SessionEnd::Shutdown,
            _ = outbound.closed() => break SessionEnd::PeerGone,
            item = inbound.next() => item,
        };

        let car_status = match next {
            None => break SessionEnd::PeerClosed,
            Some(Err(status)) => {
                warn!(
                    code = ?status.code(),
                    message = %status.message(),
                    "telemetry stream broken"
                );
                break SessionEnd::TransportError;
            }
            Some(Ok(car_status)) => car_status,
        };

        let ack = service.ingest(car_status_to_frame(car_status)).await;
        frames += 1;

        if outbound.send(Ok(acknowledgment_to_proto(ack))).await.is_err() {
            break SessionEnd::PeerGone;
        }
    };

    match end {
        SessionEnd::Shutdown => info!(frames, "closing telemetry session for shutdown"),
        _ => debug!(frames, reason = ?end, "telemetry session ended"),
    }
    end
}
