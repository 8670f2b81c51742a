use crate::domain::result::DomainResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Derived charging-session row written to the analytics store
#[derive(Debug, Clone, PartialEq)]
pub struct UsageRecord {
    /// Time of the originating telemetry event
    pub time: DateTime<Utc>,
    pub session_id: String,
    pub station_id: String,
    pub car_id: String,
    pub kwh_usage: f64,
    pub price_rate: f64,
}

/// Append-only repository for usage records
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait UsageRecordRepository: Send + Sync {
    async fn insert(&self, record: &UsageRecord) -> DomainResult<()>;
}
