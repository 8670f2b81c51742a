pub mod domain;
pub mod grpc;
pub mod ingestion_gateway;
pub mod nats;
pub mod redis;

pub use ingestion_gateway::*;
