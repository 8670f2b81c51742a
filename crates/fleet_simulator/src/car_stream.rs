use crate::virtual_car::VirtualCar;
use anyhow::{bail, Context};
use fleet_proto::fleet::v1::fleet_service_client::FleetServiceClient;
use fleet_proto::fleet::v1::{AckStatus, CarStatus};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tonic::metadata::{Ascii, MetadataValue};
use tonic::transport::Channel;
use tonic::{Code, Request};
use tracing::{debug, info, instrument, warn};

const API_TOKEN_METADATA_KEY: &str = "x-api-token";
const RECONNECT_BACKOFF: Duration = Duration::from_secs(2);
const FRAME_BUFFER: usize = 16;
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

pub struct CarStreamConfig {
    pub api_token: MetadataValue<Ascii>,
    pub interval: Duration,
}

/// Stream one car's telemetry until cancelled, reconnecting when the session drops.
///
/// A rejected credential is not retried.
#[instrument(name = "car_stream", skip_all, fields(car_id = %car.car_id))]
pub async fn run_car(
    mut car: VirtualCar,
    channel: Channel,
    config: CarStreamConfig,
    ctx: CancellationToken,
) -> anyhow::Result<()> {
    let mut rng = StdRng::from_entropy();

    while !ctx.is_cancelled() {
        match run_session(&mut car, &mut rng, channel.clone(), &config, &ctx).await {
            Ok(()) => debug!("session closed"),
            Err(status) if status.code() == Code::Unauthenticated => {
                bail!("server rejected credentials: {}", status.message());
            }
            Err(status) => {
                warn!(
                    code = ?status.code(),
                    message = %status.message(),
                    "session failed, reconnecting"
                );
                tokio::select! {
                    _ = ctx.cancelled() => break,
                    _ = tokio::time::sleep(RECONNECT_BACKOFF) => {}
                }
            }
        }
    }

    info!("car stopped");
    Ok(())
}

async fn run_session(
    car: &mut VirtualCar,
    rng: &mut StdRng,
    channel: Channel,
    config: &CarStreamConfig,
    ctx: &CancellationToken,
) -> Result<(), tonic::Status> {
    let (tx, rx) = mpsc::channel::<CarStatus>(FRAME_BUFFER);
    let mut request = Request::new(ReceiverStream::new(rx));
    request
        .metadata_mut()
        .insert(API_TOKEN_METADATA_KEY, config.api_token.clone());

    let mut client = FleetServiceClient::new(channel);
    let mut acks = client.stream_telemetry(request).await?.into_inner();
    info!("telemetry session open");

    let mut ticker = tokio::time::interval(config.interval);

    loop {
        tokio::select! {
            _ = ctx.cancelled() => {
                // half-close, then give the server a moment to ack what it has
                drop(tx);
                let drained = tokio::time::timeout(DRAIN_TIMEOUT, async {
                    while let Ok(Some(_)) = acks.message().await {}
                })
                .await;
                if drained.is_err() {
                    debug!("ack stream not closed before drain timeout");
                }
                return Ok(());
            }
            _ = ticker.tick() => {
                car.step(rng);
                log_car(car);
                let frame = car.to_status(chrono::Utc::now().timestamp_millis());
                if tx.send(frame).await.is_err() {
                    // request stream gone, the session is over
                    return Ok(());
                }
            }
            ack = acks.message() => {
                match ack? {
                    Some(ack) if ack.status() == AckStatus::Rejected => {
                        warn!(ack_id = %ack.ack_id, reason = %ack.message, "frame rejected");
                    }
                    Some(ack) => {
                        debug!(ack_id = %ack.ack_id, message = %ack.message, "frame acknowledged")
                    }
                    None => return Ok(()),
                }
            }
        }
    }
}

fn log_car(car: &VirtualCar) {
    let level = if car.battery_level < 20.0 {
        "low"
    } else if car.battery_level < 50.0 {
        "medium"
    } else {
        "ok"
    };
    info!(
        battery_level = car.battery_level,
        battery = level,
        latitude = car.latitude,
        longitude = car.longitude,
        velocity = car.velocity,
        "sending telemetry"
    );
}
