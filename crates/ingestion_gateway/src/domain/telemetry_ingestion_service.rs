use common::domain::{
    Acknowledgment, DomainError, PositionIndex, TelemetryEvent, TelemetryEventProducer,
    TelemetryFrame,
};
use common::garde::validate_struct;
use std::sync::Arc;
use tracing::{debug, error, instrument, warn};

/// Per-frame ingestion: validate, then best-effort dual write to the position
/// index and the event bus.
///
/// The two writes are independent. A failure in one is logged and neither
/// rolls back nor skips the other, and the frame is still acknowledged as
/// received. "Received" does not mean durably indexed or published.
pub struct TelemetryIngestionService {
    position_index: Arc<dyn PositionIndex>,
    event_producer: Arc<dyn TelemetryEventProducer>,
}

impl TelemetryIngestionService {
    pub fn new(
        position_index: Arc<dyn PositionIndex>,
        event_producer: Arc<dyn TelemetryEventProducer>,
    ) -> Self {
        Self {
            position_index,
            event_producer,
        }
    }

    #[instrument(name = "ingest_frame", skip(self, frame), fields(car_id = %frame.car_id))]
    pub async fn ingest(&self, frame: TelemetryFrame) -> Acknowledgment {
        if let Err(e) = validate_struct(&frame) {
            let reason = match e {
                DomainError::ValidationError(violations) => violations,
                other => other.to_string(),
            };
            warn!(reason = %reason, "rejecting telemetry frame");
            return Acknowledgment::rejected(&frame.car_id, now_ms(), reason);
        }

        if let Err(e) = self.position_index.upsert_position(&frame).await {
            error!(error = %e, "position index write failed");
        }

        let event = TelemetryEvent::from(&frame);
        if let Err(e) = self.event_producer.publish(&event).await {
            error!(error = %e, "telemetry event publish failed");
        }

        debug!("telemetry frame processed");
        Acknowledgment::received(&frame.car_id, now_ms())
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::domain::{AckStatus, MockPositionIndex, MockTelemetryEventProducer};

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

    fn service(
        index: MockPositionIndex,
        producer: MockTelemetryEventProducer,
    ) -> TelemetryIngestionService {
        TelemetryIngestionService::new(Arc::new(index), Arc::new(producer))
    }

    #[tokio::test]
    async fn test_valid_frame_is_indexed_and_published() {
        let mut index = MockPositionIndex::new();
        index
            .expect_upsert_position()
            .withf(|f: &TelemetryFrame| {
                f.car_id == "CAR-001" && f.latitude == 40.7234 && f.battery_level == 85.3
            })
            .times(1)
            .returning(|_| Ok(()));

        let mut producer = MockTelemetryEventProducer::new();
        producer
            .expect_publish()
            .withf(|e: &TelemetryEvent| {
                e.car_id == "CAR-001"
                    && e.lat == 40.7234
                    && e.lon == -73.9876
                    && e.event_type == "telemetry"
            })
            .times(1)
            .returning(|_| Ok(()));

        let ack = service(index, producer).ingest(frame()).await;

        assert_eq!(ack.status, AckStatus::Received);
        assert_eq!(ack.car_id, "CAR-001");
        assert!(ack.ack_id.starts_with("ack-CAR-001-"));
        assert_eq!(ack.message, "Telemetry received");
    }

    #[tokio::test]
    async fn test_out_of_range_frame_is_rejected_without_writes() {
        let mut index = MockPositionIndex::new();
        index.expect_upsert_position().never();
        let mut producer = MockTelemetryEventProducer::new();
        producer.expect_publish().never();

        let bad = TelemetryFrame {
            latitude: 91.0,
            ..frame()
        };
        let ack = service(index, producer).ingest(bad).await;

        assert_eq!(ack.status, AckStatus::Rejected);
        assert!(ack.message.contains("latitude"), "{}", ack.message);
    }

    #[tokio::test]
    async fn test_negative_velocity_is_rejected() {
        let mut index = MockPositionIndex::new();
        index.expect_upsert_position().never();
        let mut producer = MockTelemetryEventProducer::new();
        producer.expect_publish().never();

        let bad = TelemetryFrame {
            velocity: -1.0,
            ..frame()
        };
        let ack = service(index, producer).ingest(bad).await;

        assert_eq!(ack.status, AckStatus::Rejected);
    }

    #[tokio::test]
    async fn test_boundary_values_are_accepted() {
        let mut index = MockPositionIndex::new();
        index.expect_upsert_position().times(2).returning(|_| Ok(()));
        let mut producer = MockTelemetryEventProducer::new();
        producer.expect_publish().times(2).returning(|_| Ok(()));
        let service = service(index, producer);

        for battery in [0.0, 100.0] {
            let f = TelemetryFrame {
                battery_level: battery,
                velocity: 0.0,
                ..frame()
            };
            assert_eq!(service.ingest(f).await.status, AckStatus::Received);
        }
    }

    #[tokio::test]
    async fn test_index_failure_still_publishes_and_acks() {
        let mut index = MockPositionIndex::new();
        index
            .expect_upsert_position()
            .times(1)
            .returning(|_| Err(DomainError::RepositoryError(anyhow::anyhow!("redis down"))));
        let mut producer = MockTelemetryEventProducer::new();
        producer.expect_publish().times(1).returning(|_| Ok(()));

        let ack = service(index, producer).ingest(frame()).await;
        assert_eq!(ack.status, AckStatus::Received);
    }

    #[tokio::test]
    async fn test_publish_failure_still_acks() {
        let mut index = MockPositionIndex::new();
        index.expect_upsert_position().times(1).returning(|_| Ok(()));
        let mut producer = MockTelemetryEventProducer::new();
        producer
            .expect_publish()
            .times(1)
            .returning(|_| Err(DomainError::RepositoryError(anyhow::anyhow!("no responders"))));

        let ack = service(index, producer).ingest(frame()).await;
        assert_eq!(ack.status, AckStatus::Received);
    }
}
