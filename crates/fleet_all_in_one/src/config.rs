use config::{Config, ConfigError, Environment};
use serde::{Deserialize, Serialize};
use std::fmt;

const REDACTED: &str = "<redacted>";

#[derive(Deserialize, Serialize, Clone)]
pub struct ServiceConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    // gRPC configuration
    #[serde(default = "default_grpc_host")]
    pub grpc_host: String,

    #[serde(default = "default_grpc_port")]
    pub grpc_port: u16,

    /// Comma-separated path prefixes skipped by request logging and tracing
    #[serde(default = "default_grpc_ignored_paths")]
    pub grpc_ignored_paths: String,

    /// HTTP/2 keepalive for long-lived telemetry streams; 0 disables
    #[serde(default = "default_grpc_keepalive_secs")]
    pub grpc_keepalive_secs: u64,

    /// Shared secret agents send in `x-api-token`
    #[serde(default = "default_api_token")]
    pub api_token: String,

    // Redis configuration
    #[serde(default = "default_redis_url")]
    pub redis_url: String,

    // NATS configuration
    #[serde(default = "default_nats_url")]
    pub nats_url: String,

    /// JetStream stream carrying telemetry events
    #[serde(default = "default_nats_stream")]
    pub nats_stream: String,

    /// Durable consumer shared by every worker instance
    #[serde(default = "default_nats_consumer_group")]
    pub nats_consumer_group: String,

    #[serde(default = "default_nats_batch_size")]
    pub nats_batch_size: usize,

    /// Max wait time for batches in seconds
    #[serde(default = "default_nats_batch_wait_secs")]
    pub nats_batch_wait_secs: u64,

    // ClickHouse configuration
    /// ClickHouse HTTP URL (for client connections)
    #[serde(default = "default_clickhouse_url")]
    pub clickhouse_url: String,

    /// ClickHouse native TCP address (for migrations with goose)
    #[serde(default = "default_clickhouse_native_url")]
    pub clickhouse_native_url: String,

    #[serde(default = "default_clickhouse_database")]
    pub clickhouse_database: String,

    #[serde(default = "default_clickhouse_username")]
    pub clickhouse_username: String,

    #[serde(default = "default_clickhouse_password")]
    pub clickhouse_password: String,

    #[serde(default = "default_clickhouse_table")]
    pub clickhouse_table: String,

    #[serde(default = "default_clickhouse_migrations_dir")]
    pub clickhouse_migrations_dir: String,

    #[serde(default = "default_clickhouse_goose_binary_path")]
    pub clickhouse_goose_binary_path: String,

    // Pricing oracle
    #[serde(default = "default_pricing_oracle_url")]
    pub pricing_oracle_url: String,

    #[serde(default = "default_pricing_oracle_timeout_ms")]
    pub pricing_oracle_timeout_ms: u64,

    /// Startup timeout for initialization operations in seconds
    #[serde(default = "default_startup_timeout_secs")]
    pub startup_timeout_secs: u64,

    // OpenTelemetry configuration
    #[serde(default = "default_otel_enabled")]
    pub otel_enabled: bool,

    #[serde(default = "default_otel_endpoint")]
    pub otel_endpoint: String,

    #[serde(default = "default_otel_service_name")]
    pub otel_service_name: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

// gRPC defaults
fn default_grpc_host() -> String {
    "0.0.0.0".to_string()
}

fn default_grpc_port() -> u16 {
    50051
}

fn default_grpc_ignored_paths() -> String {
    "/grpc.reflection.".to_string()
}

fn default_grpc_keepalive_secs() -> u64 {
    30
}

fn default_api_token() -> String {
    "fleet-secret-token".to_string()
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

// NATS defaults
fn default_nats_url() -> String {
    "nats://localhost:4222".to_string()
}

fn default_nats_stream() -> String {
    "fleet_events".to_string()
}

fn default_nats_consumer_group() -> String {
    "pricing-worker-group".to_string()
}

fn default_nats_batch_size() -> usize {
    30
}

fn default_nats_batch_wait_secs() -> u64 {
    5
}

// ClickHouse defaults
fn default_clickhouse_url() -> String {
    "http://localhost:8123".to_string()
}

fn default_clickhouse_native_url() -> String {
    "localhost:9000".to_string()
}

fn default_clickhouse_database() -> String {
    "fleet".to_string()
}

fn default_clickhouse_username() -> String {
    "default".to_string()
}

fn default_clickhouse_password() -> String {
    String::new()
}

fn default_clickhouse_table() -> String {
    "charging_sessions".to_string()
}

fn default_clickhouse_migrations_dir() -> String {
    "/home/fleet/migrations/clickhouse".to_string()
}

fn default_clickhouse_goose_binary_path() -> String {
    "goose".to_string()
}

fn default_pricing_oracle_url() -> String {
    "http://localhost:8081".to_string()
}

fn default_pricing_oracle_timeout_ms() -> u64 {
    5000
}

fn default_startup_timeout_secs() -> u64 {
    30
}

// OpenTelemetry defaults
fn default_otel_enabled() -> bool {
    false
}

fn default_otel_endpoint() -> String {
    "http://localhost:4317".to_string()
}

fn default_otel_service_name() -> String {
    "fleet-all-in-one".to_string()
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(Environment::with_prefix("FLEET"))
            .build()?
            .try_deserialize()
    }
}

// secrets stay out of the startup debug log
impl fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("log_level", &self.log_level)
            .field("grpc_host", &self.grpc_host)
            .field("grpc_port", &self.grpc_port)
            .field("grpc_ignored_paths", &self.grpc_ignored_paths)
            .field("grpc_keepalive_secs", &self.grpc_keepalive_secs)
            .field("api_token", &REDACTED)
            .field("redis_url", &self.redis_url)
            .field("nats_url", &self.nats_url)
            .field("nats_stream", &self.nats_stream)
            .field("nats_consumer_group", &self.nats_consumer_group)
            .field("nats_batch_size", &self.nats_batch_size)
            .field("nats_batch_wait_secs", &self.nats_batch_wait_secs)
            .field("clickhouse_url", &self.clickhouse_url)
            .field("clickhouse_native_url", &self.clickhouse_native_url)
            .field("clickhouse_database", &self.clickhouse_database)
            .field("clickhouse_username", &self.clickhouse_username)
            .field("clickhouse_password", &REDACTED)
            .field("clickhouse_table", &self.clickhouse_table)
            .field("clickhouse_migrations_dir", &self.clickhouse_migrations_dir)
            .field("clickhouse_goose_binary_path", &self.clickhouse_goose_binary_path)
            .field("pricing_oracle_url", &self.pricing_oracle_url)
            .field("pricing_oracle_timeout_ms", &self.pricing_oracle_timeout_ms)
            .field("startup_timeout_secs", &self.startup_timeout_secs)
            .field("otel_enabled", &self.otel_enabled)
            .field("otel_endpoint", &self.otel_endpoint)
            .field("otel_service_name", &self.otel_service_name)
            .finish()
    }
}
