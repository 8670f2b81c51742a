use chrono::{DateTime, Timelike, Utc};
use common::domain::{LoadTier, PriceResponse};
use std::f64::consts::PI;

const BASE_PRICE: f64 = 0.25;
const AMPLITUDE: f64 = 0.15;
const SOLAR_DISCOUNT: f64 = 0.9;

/// Sinusoidal time-of-day price before any source discount.
///
/// Peaks at 12:00 and bottoms out at 00:00.
pub fn base_price(hour: u32) -> f64 {
    BASE_PRICE + AMPLITUDE * ((hour as f64 - 6.0) * PI / 12.0).sin()
}

pub fn load_tier(price: f64) -> LoadTier {
    if price > 0.35 {
        LoadTier::High
    } else if price > 0.25 {
        LoadTier::Medium
    } else {
        LoadTier::Low
    }
}

pub fn energy_source(hour: u32) -> &'static str {
    match hour {
        8..=18 => "Solar",
        19..=22 => "Wind",
        _ => "Grid",
    }
}

fn round_cents(price: f64) -> f64 {
    (price * 100.0).round() / 100.0
}

/// Quote for the UTC hour of `now`
pub fn quote_at(now: DateTime<Utc>) -> PriceResponse {
    let hour = now.hour();
    let price = base_price(hour);
    // load is classified on the undiscounted price
    let grid_load = load_tier(price);
    let source = energy_source(hour);

    let price = if source == "Solar" {
        price * SOLAR_DISCOUNT
    } else {
        price
    };

    PriceResponse {
        timestamp: now.timestamp_millis(),
        price_per_kwh: round_cents(price),
        grid_load,
        energy_source: source.to_string(),
        hour,
    }
}
