use common::domain::{AckStatus, Acknowledgment, TelemetryFrame};
use fleet_proto::fleet::v1::{AckStatus as ProtoAckStatus, CarStatus, TelemetryAck};

pub fn car_status_to_frame(status: CarStatus) -> TelemetryFrame {
    TelemetryFrame {
        car_id: status.car_id,
        latitude: status.latitude,
        longitude: status.longitude,
        battery_level: status.battery_level,
        velocity: status.velocity,
        timestamp: status.timestamp,
    }
}

pub fn acknowledgment_to_proto(ack: Acknowledgment) -> TelemetryAck {
    let status = match ack.status {
        AckStatus::Received => ProtoAckStatus::Received,
        AckStatus::Rejected => ProtoAckStatus::Rejected,
    };

    TelemetryAck {
        ack_id: ack.ack_id,
        car_id: ack.car_id,
        status: status as i32,
        message: ack.message,
        timestamp: ack.timestamp,
    }
}
