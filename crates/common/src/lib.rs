pub mod clickhouse;
pub mod domain;
pub mod garde;
pub mod grpc;
pub mod nats;
pub mod redis;
pub mod telemetry;
