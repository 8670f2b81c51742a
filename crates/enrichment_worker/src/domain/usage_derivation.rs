use chrono::{DateTime, Utc};
use common::domain::{DomainError, DomainResult, PriceQuote, TelemetryEvent, UsageRecord};
use uuid::Uuid;

const BASE_KWH: f64 = 10.0;
const STATION_COUNT: u32 = 10;

/// Energy drawn for a charging session, linear in the reported battery level
pub fn kwh_usage(battery: f64) -> f64 {
    BASE_KWH + battery / 10.0
}

/// Station assignment by the car id's last character; stable per car
pub fn station_for(car_id: &str) -> String {
    let n = car_id.chars().last().map(|c| c as u32 % STATION_COUNT).unwrap_or(0);
    format!("station-{}", n)
}

pub fn new_session_id() -> String {
    format!("session-{}", Uuid::new_v4())
}

/// Build the usage record for one event priced at `quote`.
///
/// Everything except `session_id` is a pure function of the inputs.
pub fn derive_usage_record(
    event: &TelemetryEvent,
    quote: &PriceQuote,
) -> DomainResult<UsageRecord> {
    let time = DateTime::<Utc>::from_timestamp_millis(event.timestamp).ok_or_else(|| {
        DomainError::DecodeError(format!("timestamp {} out of range", event.timestamp))
    })?;

    Ok(UsageRecord {
        time,
        session_id: new_session_id(),
        station_id: station_for(&event.car_id),
        car_id: event.car_id.clone(),
        kwh_usage: kwh_usage(event.battery),
        price_rate: quote.price_per_unit,
    })
}
