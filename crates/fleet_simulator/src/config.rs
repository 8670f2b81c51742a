use config::{Config, ConfigError, Environment};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SimulatorConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Ingestion gateway gRPC endpoint
    #[serde(default = "default_server_url")]
    pub server_url: String,

    #[serde(default = "default_api_token")]
    pub api_token: String,

    #[serde(default = "default_num_cars")]
    pub num_cars: usize,

    /// Delay between frames per car
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_server_url() -> String {
    "http://localhost:50051".to_string()
}

fn default_api_token() -> String {
    "fleet-secret-token".to_string()
}

fn default_num_cars() -> usize {
    5
}

fn default_interval_ms() -> u64 {
    2000
}

impl SimulatorConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(Environment::with_prefix("FLEET_SIM"))
            .build()?
            .try_deserialize()
    }
}
