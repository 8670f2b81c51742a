mod telemetry_event_service;

pub use telemetry_event_service::*;
