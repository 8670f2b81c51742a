use async_trait::async_trait;
use common::domain::{DomainError, DomainResult, PriceQuote, PriceResponse, PricingOracle};
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

pub const PRICING_PATH: &str = "/api/pricing";

/// HTTP client for the pricing oracle's `GET /api/pricing`
#[derive(Clone)]
pub struct HttpPricingOracle {
    client: Client,
    pricing_url: String,
    timeout: Duration,
}

impl HttpPricingOracle {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            pricing_url: format!("{}{}", base_url.trim_end_matches('/'), PRICING_PATH),
            timeout,
        })
    }

    fn map_transport_error(&self, e: reqwest::Error) -> DomainError {
        if e.is_timeout() {
            DomainError::PricingTimeout(self.timeout.as_millis() as u64)
        } else {
            DomainError::PricingUnavailable(e.to_string())
        }
    }
}

#[async_trait]
impl PricingOracle for HttpPricingOracle {
    async fn current_price(&self) -> DomainResult<PriceQuote> {
        let response = self
            .client
            .get(&self.pricing_url)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        if !response.status().is_success() {
            return Err(DomainError::PricingUnavailable(format!(
                "pricing oracle returned {}",
                response.status()
            )));
        }

        let body: PriceResponse = response
            .json()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        debug!(price_per_kwh = body.price_per_kwh, grid_load = %body.grid_load, "fetched price");
        Ok(body.into())
    }
}
