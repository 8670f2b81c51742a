use async_trait::async_trait;
use chrono::{DateTime, Utc};
use clickhouse::Row;
use common::clickhouse::ClickHouseClient;
use common::domain::{DomainError, DomainResult, UsageRecord, UsageRecordRepository};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

#[derive(Debug, Clone, Row, Serialize, Deserialize)]
pub struct UsageRecordRow {
    // DateTime64(3, 'UTC')
    #[serde(with = "clickhouse::serde::chrono::datetime64::millis")]
    pub time: DateTime<Utc>,
    pub session_id: String,
    pub station_id: String,
    pub car_id: String,
    pub kwh_usage: f64,
    pub price_rate: f64,
}

impl From<&UsageRecord> for UsageRecordRow {
    fn from(record: &UsageRecord) -> Self {
        Self {
            time: record.time,
            session_id: record.session_id.clone(),
            station_id: record.station_id.clone(),
            car_id: record.car_id.clone(),
            kwh_usage: record.kwh_usage,
            price_rate: record.price_rate,
        }
    }
}

impl From<UsageRecordRow> for UsageRecord {
    fn from(row: UsageRecordRow) -> Self {
        Self {
            time: row.time,
            session_id: row.session_id,
            station_id: row.station_id,
            car_id: row.car_id,
            kwh_usage: row.kwh_usage,
            price_rate: row.price_rate,
        }
    }
}

/// ClickHouse implementation of UsageRecordRepository, one INSERT per record
#[derive(Clone)]
pub struct ClickHouseUsageRecordRepository {
    client: ClickHouseClient,
    table: String,
}

impl ClickHouseUsageRecordRepository {
    pub fn new(client: ClickHouseClient, table: String) -> Self {
        Self { client, table }
    }

    /// Usage records for one car in `[from, to)`, oldest first
    pub async fn list_by_car(
        &self,
        car_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DomainResult<Vec<UsageRecord>> {
        let rows = self
            .client
            .get_client()
            .query(&format!(
                "SELECT ?fields FROM {} WHERE car_id = ? \
                 AND time >= fromUnixTimestamp64Milli(toInt64(?), 'UTC') \
                 AND time < fromUnixTimestamp64Milli(toInt64(?), 'UTC') \
                 ORDER BY time",
                self.table
            ))
            .bind(car_id)
            .bind(from.timestamp_millis())
            .bind(to.timestamp_millis())
            .fetch_all::<UsageRecordRow>()
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        Ok(rows.into_iter().map(UsageRecord::from).collect())
    }
}

#[async_trait]
impl UsageRecordRepository for ClickHouseUsageRecordRepository {
    async fn insert(&self, record: &UsageRecord) -> DomainResult<()> {
        let row = UsageRecordRow::from(record);

        let mut insert = self
            .client
            .get_client()
            .insert::<UsageRecordRow>(&self.table)
            .await
            .map_err(|e| {
                error!(error = %e, "failed to create ClickHouse insert");
                DomainError::RepositoryError(e.into())
            })?;

        insert.write(&row).await.map_err(|e| {
            error!(error = %e, "failed to write usage row");
            DomainError::RepositoryError(e.into())
        })?;

        insert.end().await.map_err(|e| {
            error!(error = %e, "failed to finalize ClickHouse insert");
            DomainError::RepositoryError(e.into())
        })?;

        debug!(session_id = %record.session_id, table = %self.table, "usage record inserted");
        Ok(())
    }
}
