pub mod clickhouse;
pub mod domain;
pub mod enrichment_worker;
pub mod http;
pub mod nats;

pub use enrichment_worker::*;
