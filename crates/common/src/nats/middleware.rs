mod consumer_logging;
mod consumer_tracing;
mod consumer_types;
mod publisher;

pub use consumer_logging::*;
pub use consumer_tracing::*;
pub use consumer_types::*;
pub use publisher::*;
