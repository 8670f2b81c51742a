use crate::domain::result::DomainResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse grid load bucket reported alongside the price
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadTier {
    Low,
    Medium,
    High,
}

impl fmt::Display for LoadTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LoadTier::Low => "Low",
            LoadTier::Medium => "Medium",
            LoadTier::High => "High",
        };
        f.write_str(s)
    }
}

/// A unit price for energy valid at the moment it was fetched
#[derive(Debug, Clone, PartialEq)]
pub struct PriceQuote {
    /// Currency per kWh, rounded to two decimals
    pub price_per_unit: f64,
    pub load_tier: LoadTier,
    /// Informational generation source (Solar, Wind, Grid)
    pub source_tag: String,
    /// Local hour of day (0..=23) the quote was computed for
    pub hour: u32,
}

/// JSON body served by the pricing oracle at `GET /api/pricing`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceResponse {
    /// Quote time in milliseconds since the Unix epoch
    pub timestamp: i64,
    pub price_per_kwh: f64,
    pub grid_load: LoadTier,
    pub energy_source: String,
    pub hour: u32,
}

impl From<PriceResponse> for PriceQuote {
    fn from(response: PriceResponse) -> Self {
        Self {
            price_per_unit: response.price_per_kwh,
            load_tier: response.grid_load,
            source_tag: response.energy_source,
            hour: response.hour,
        }
    }
}

/// Source of current energy prices
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait PricingOracle: Send + Sync {
    async fn current_price(&self) -> DomainResult<PriceQuote>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_response_wire_format() {
        let body = r#"{
            "timestamp": 1704110400000,
            "price_per_kwh": 0.4,
            "grid_load": "High",
            "energy_source": "Solar",
            "hour": 12
        }"#;

        let response: PriceResponse = serde_json::from_str(body).unwrap();
        let quote = PriceQuote::from(response);

        assert_eq!(quote.price_per_unit, 0.4);
        assert_eq!(quote.load_tier, LoadTier::High);
        assert_eq!(quote.source_tag, "Solar");
        assert_eq!(quote.hour, 12);
    }

    #[test]
    fn test_unknown_load_tier_rejected() {
        let body = r#"{"timestamp":0,"price_per_kwh":0.1,"grid_load":"Extreme","energy_source":"Grid","hour":1}"#;
        assert!(serde_json::from_str::<PriceResponse>(body).is_err());
    }
}
