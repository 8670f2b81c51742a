mod config;

use common::telemetry::{init_telemetry, shutdown_telemetry, TelemetryConfig};
use config::OracleConfig;
use fleet_runner::Runner;
use pricing_oracle::{PricingOracleConfig, PricingOracleServer};
use std::time::Duration;
use tracing::info;

#[tokio::main]
async fn main() {
    let config = match OracleConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let telemetry_providers = match init_telemetry(&TelemetryConfig {
        service_name: "pricing-oracle".to_string(),
        log_level: config.log_level.clone(),
        ..TelemetryConfig::default()
    }) {
        Ok(providers) => providers,
        Err(e) => {
            eprintln!("Failed to initialize telemetry: {}", e);
            std::process::exit(1);
        }
    };

    info!(host = %config.host, port = config.port, "Starting pricing oracle");

    let server = PricingOracleServer::new(PricingOracleConfig {
        host: config.host,
        port: config.port,
    });

    Runner::new()
        .with_named_process("pricing_oracle", server.into_runner_process())
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
