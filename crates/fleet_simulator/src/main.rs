mod car_stream;
mod config;
mod virtual_car;

use car_stream::{run_car, CarStreamConfig};
use common::telemetry::{init_telemetry, shutdown_telemetry, TelemetryConfig};
use config::SimulatorConfig;
use fleet_runner::Runner;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::time::Duration;
use tonic::metadata::{Ascii, MetadataValue};
use tonic::transport::Endpoint;
use tracing::{error, info};
use virtual_car::{car_id, VirtualCar};

#[tokio::main]
async fn main() {
    let config = match SimulatorConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let telemetry_providers = match init_telemetry(&TelemetryConfig {
        service_name: "fleet-simulator".to_string(),
        log_level: config.log_level.clone(),
        ..TelemetryConfig::default()
    }) {
        Ok(providers) => providers,
        Err(e) => {
            eprintln!("Failed to initialize telemetry: {}", e);
            std::process::exit(1);
        }
    };

    info!(
        server = %config.server_url,
        num_cars = config.num_cars,
        interval_ms = config.interval_ms,
        "Starting fleet simulator"
    );

    // one HTTP/2 connection, multiplexed across every car's stream
    let channel = match Endpoint::from_shared(config.server_url.clone()) {
        Ok(endpoint) => endpoint.connect_lazy(),
        Err(e) => {
            error!(error = %e, "Invalid server URL");
            std::process::exit(1);
        }
    };

    let api_token: MetadataValue<Ascii> = match config.api_token.parse() {
        Ok(token) => token,
        Err(e) => {
            error!(error = %e, "API token is not valid ASCII metadata");
            std::process::exit(1);
        }
    };

    let mut rng = StdRng::from_entropy();
    let mut runner = Runner::new();
    for index in 1..=config.num_cars {
        let car = VirtualCar::spawn(car_id(index), &mut rng);
        let channel = channel.clone();
        let car_config = CarStreamConfig {
            api_token: api_token.clone(),
            interval: Duration::from_millis(config.interval_ms),
        };
        runner = runner.with_named_process(car.car_id.clone(), move |ctx| {
            Box::pin(run_car(car, channel, car_config, ctx))
        });
    }

    runner
        .with_closer(move || {
            Box::pin(async move {
                shutdown_telemetry(telemetry_providers);
                Ok(())
            })
        })
        .with_closer_timeout(Duration::from_secs(5))
        .run()
        .await;
}
