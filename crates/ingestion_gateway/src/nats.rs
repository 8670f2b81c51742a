mod telemetry_event_producer;

pub use telemetry_event_producer::*;
