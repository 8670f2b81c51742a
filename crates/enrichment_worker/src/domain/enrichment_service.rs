use crate::domain::derive_usage_record;
use common::domain::{
    DomainError, DomainResult, PriceQuote, PricingOracle, TelemetryEvent, UsageRecord,
    UsageRecordRepository,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, instrument, warn};

/// What happened to one consumed event
#[derive(Debug)]
pub enum EnrichmentOutcome {
    Persisted(UsageRecord),
    /// No price was obtained, nothing was written
    Skipped(DomainError),
    /// A record was derived but the insert failed
    PersistFailed(DomainError),
}

/// Prices each telemetry event and appends the derived usage record.
///
/// Enrichment is best-effort: oracle failures and timeouts skip the event,
/// insert failures are logged. Neither is retried.
pub struct EnrichmentService {
    oracle: Arc<dyn PricingOracle>,
    repository: Arc<dyn UsageRecordRepository>,
    oracle_timeout: Duration,
}

impl EnrichmentService {
    pub fn new(
        oracle: Arc<dyn PricingOracle>,
        repository: Arc<dyn UsageRecordRepository>,
        oracle_timeout: Duration,
    ) -> Self {
        Self {
            oracle,
            repository,
            oracle_timeout,
        }
    }

    #[instrument(name = "enrich_event", skip(self, event), fields(car_id = %event.car_id))]
    pub async fn enrich(&self, event: &TelemetryEvent) -> EnrichmentOutcome {
        let quote = match self.fetch_price().await {
            Ok(quote) => quote,
            Err(e) => {
                warn!(error = %e, "skipping event, no price available");
                return EnrichmentOutcome::Skipped(e);
            }
        };

        let record = match derive_usage_record(event, &quote) {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, "skipping event, cannot derive usage record");
                return EnrichmentOutcome::Skipped(e);
            }
        };

        if let Err(e) = self.repository.insert(&record).await {
            error!(error = %e, session_id = %record.session_id, "usage record insert failed");
            return EnrichmentOutcome::PersistFailed(e);
        }

        debug!(
            session_id = %record.session_id,
            station_id = %record.station_id,
            price_rate = record.price_rate,
            "usage record persisted"
        );
        EnrichmentOutcome::Persisted(record)
    }

    async fn fetch_price(&self) -> DomainResult<PriceQuote> {
        match tokio::time::timeout(self.oracle_timeout, self.oracle.current_price()).await {
            Ok(result) => result,
            Err(_) => Err(DomainError::PricingTimeout(
                self.oracle_timeout.as_millis() as u64,
            )),
        }
    }
}
