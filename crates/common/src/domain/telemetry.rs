use crate::domain::result::DomainResult;
use async_trait::async_trait;
use garde::Validate;
use serde::{Deserialize, Serialize};

/// Event type tag carried by every telemetry event on the bus
pub const TELEMETRY_EVENT_TYPE: &str = "telemetry";

/// One observation from one vehicle at one instant.
///
/// Frames are immutable input: the gateway validates them and fans them out,
/// it never rewrites or clamps a field.
#[derive(Debug, Clone, PartialEq, Validate)]
pub struct TelemetryFrame {
    #[garde(length(min = 1), custom(subject_token))]
    pub car_id: String,
    #[garde(custom(finite), range(min = -90.0, max = 90.0))]
    pub latitude: f64,
    #[garde(custom(finite), range(min = -180.0, max = 180.0))]
    pub longitude: f64,
    #[garde(custom(finite), range(min = 0.0, max = 100.0))]
    pub battery_level: f64,
    #[garde(custom(finite), range(min = 0.0))]
    pub velocity: f64,
    /// Capture time in milliseconds since the Unix epoch
    #[garde(range(min = 0))]
    pub timestamp: i64,
}

fn finite(value: &f64, _ctx: &()) -> garde::Result {
    if value.is_finite() {
        Ok(())
    } else {
        Err(garde::Error::new("must be a finite number"))
    }
}

// car_id becomes the last token of the bus subject, so it must be a legal token
fn subject_token(value: &str, _ctx: &()) -> garde::Result {
    if value
        .chars()
        .any(|c| c == '.' || c == '*' || c == '>' || c.is_whitespace())
    {
        Err(garde::Error::new(
            "must not contain '.', '*', '>' or whitespace",
        ))
    } else {
        Ok(())
    }
}

/// Wire representation of a frame on the event bus (JSON, keyed by car_id)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryEvent {
    pub car_id: String,
    pub lat: f64,
    pub lon: f64,
    pub battery: f64,
    pub velocity: f64,
    pub timestamp: i64,
    pub event_type: String,
}

impl TelemetryEvent {
    pub fn is_telemetry(&self) -> bool {
        self.event_type == TELEMETRY_EVENT_TYPE
    }
}

impl From<&TelemetryFrame> for TelemetryEvent {
    fn from(frame: &TelemetryFrame) -> Self {
        Self {
            car_id: frame.car_id.clone(),
            lat: frame.latitude,
            lon: frame.longitude,
            battery: frame.battery_level,
            velocity: frame.velocity,
            timestamp: frame.timestamp,
            event_type: TELEMETRY_EVENT_TYPE.to_string(),
        }
    }
}

/// Outcome reported back to the agent for a single frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckStatus {
    /// Accepted and handed to the index store and event bus; not a durability promise
    Received,
    /// Failed validation and was dropped
    Rejected,
}

/// Per-frame acknowledgment, correlated by `ack_id`
#[derive(Debug, Clone, PartialEq)]
pub struct Acknowledgment {
    pub ack_id: String,
    pub car_id: String,
    pub status: AckStatus,
    pub message: String,
    pub timestamp: i64,
}

impl Acknowledgment {
    pub fn received(car_id: &str, now_ms: i64) -> Self {
        Self {
            ack_id: ack_id(car_id, now_ms),
            car_id: car_id.to_string(),
            status: AckStatus::Received,
            message: "Telemetry received".to_string(),
            timestamp: now_ms,
        }
    }

    pub fn rejected(car_id: &str, now_ms: i64, reason: impl Into<String>) -> Self {
        Self {
            ack_id: ack_id(car_id, now_ms),
            car_id: car_id.to_string(),
            status: AckStatus::Rejected,
            message: reason.into(),
            timestamp: now_ms,
        }
    }
}

fn ack_id(car_id: &str, now_ms: i64) -> String {
    format!("ack-{}-{}", car_id, now_ms)
}

/// Current snapshot for one agent in the positional index
#[derive(Debug, Clone, PartialEq)]
pub struct PositionRecord {
    pub car_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub battery_level: f64,
    pub velocity: f64,
    pub last_seen: i64,
}

/// Radius query against the positional index
#[derive(Debug, Clone, PartialEq)]
pub struct RadiusQuery {
    pub latitude: f64,
    pub longitude: f64,
    pub radius_km: f64,
}

/// One hit of a radius query, nearest first
#[derive(Debug, Clone, PartialEq)]
pub struct AgentLocation {
    pub car_id: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// Positional index store (last-write-wins per agent)
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait PositionIndex: Send + Sync {
    /// Upsert the location and metadata of the frame's agent
    async fn upsert_position(&self, frame: &TelemetryFrame) -> DomainResult<()>;

    /// Read back the current snapshot for an agent
    async fn get_position(&self, car_id: &str) -> DomainResult<Option<PositionRecord>>;

    /// Agents within `radius_km` of a point, nearest first
    async fn agents_within_radius(&self, query: RadiusQuery) -> DomainResult<Vec<AgentLocation>>;
}

/// Trait for publishing telemetry events to the event bus
///
/// Implementations must key the publish on `car_id` so per-agent order is kept.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait TelemetryEventProducer: Send + Sync {
    async fn publish(&self, event: &TelemetryEvent) -> DomainResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DomainError;
    use crate::garde::validate_struct;

    fn frame() -> TelemetryFrame {
        TelemetryFrame {
            car_id: "CAR-001".to_string(),
            latitude: 40.7234,
            longitude: -73.9876,
            battery_level: 85.3,
            velocity: 45.2,
            timestamp: 1_701_532_800_000,
        }
    }

    #[test]
    fn test_valid_frame() {
        assert!(validate_struct(&frame()).is_ok());
    }

    #[test]
    fn test_battery_and_velocity_boundaries_accepted() {
        for battery in [0.0, 100.0] {
            let f = TelemetryFrame {
                battery_level: battery,
                velocity: 0.0,
                ..frame()
            };
            assert!(validate_struct(&f).is_ok(), "battery {battery} rejected");
        }
    }

    #[test]
    fn test_coordinate_boundaries_accepted() {
        let f = TelemetryFrame {
            latitude: -90.0,
            longitude: 180.0,
            ..frame()
        };
        assert!(validate_struct(&f).is_ok());
    }

    #[test]
    fn test_out_of_range_latitude_rejected() {
        let f = TelemetryFrame {
            latitude: 90.0001,
            ..frame()
        };
        let result = validate_struct(&f);
        match result {
            Err(DomainError::ValidationError(msg)) => assert!(msg.contains("latitude")),
            other => panic!("expected ValidationError, got {:?}", other),
        }
    }

    #[test]
    fn test_out_of_range_longitude_rejected() {
        let f = TelemetryFrame {
            longitude: -180.5,
            ..frame()
        };
        assert!(matches!(
            validate_struct(&f),
            Err(DomainError::ValidationError(_))
        ));
    }

    #[test]
    fn test_nan_coordinates_rejected() {
        let f = TelemetryFrame {
            latitude: f64::NAN,
            ..frame()
        };
        assert!(matches!(
            validate_struct(&f),
            Err(DomainError::ValidationError(_))
        ));
    }

    #[test]
    fn test_negative_velocity_rejected() {
        let f = TelemetryFrame {
            velocity: -0.1,
            ..frame()
        };
        match validate_struct(&f) {
            Err(DomainError::ValidationError(msg)) => assert!(msg.contains("velocity")),
            other => panic!("expected ValidationError, got {:?}", other),
        }
    }

    #[test]
    fn test_battery_over_100_rejected() {
        let f = TelemetryFrame {
            battery_level: 100.5,
            ..frame()
        };
        assert!(validate_struct(&f).is_err());
    }

    #[test]
    fn test_car_id_must_be_subject_token() {
        for bad in ["", "CAR.001", "CAR 001", "CAR-*", "CAR>"] {
            let f = TelemetryFrame {
                car_id: bad.to_string(),
                ..frame()
            };
            assert!(validate_struct(&f).is_err(), "{bad:?} accepted");
        }
    }

    #[test]
    fn test_event_from_frame() {
        let event = TelemetryEvent::from(&frame());
        assert_eq!(event.car_id, "CAR-001");
        assert_eq!(event.lat, 40.7234);
        assert_eq!(event.lon, -73.9876);
        assert_eq!(event.event_type, "telemetry");
        assert!(event.is_telemetry());
    }

    #[test]
    fn test_event_json_field_names() {
        let json = serde_json::to_value(TelemetryEvent::from(&frame())).unwrap();
        assert_eq!(json["car_id"], "CAR-001");
        assert_eq!(json["lat"], 40.7234);
        assert_eq!(json["lon"], -73.9876);
        assert_eq!(json["battery"], 85.3);
        assert_eq!(json["velocity"], 45.2);
        assert_eq!(json["timestamp"], 1_701_532_800_000i64);
        assert_eq!(json["event_type"], "telemetry");
    }

    #[test]
    fn test_ack_id_correlates_car_and_time() {
        let ack = Acknowledgment::received("CAR-001", 42);
        assert_eq!(ack.ack_id, "ack-CAR-001-42");
        assert_eq!(ack.status, AckStatus::Received);

        let rejected = Acknowledgment::rejected("CAR-001", 43, "latitude out of range");
        assert_eq!(rejected.status, AckStatus::Rejected);
        assert_eq!(rejected.message, "latitude out of range");
    }
}
