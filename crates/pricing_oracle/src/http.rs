use crate::pricing::quote_at;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use common::domain::PriceResponse;
use std::sync::Arc;
use tracing::info;

pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub fn system_clock() -> Clock {
    Arc::new(Utc::now)
}

/// `GET /api/pricing` and `GET /health`
pub fn pricing_router(clock: Clock) -> Router {
    Router::new()
        .route("/api/pricing", get(get_pricing))
        .route("/health", get(get_health))
        .with_state(clock)
}

async fn get_pricing(State(clock): State<Clock>) -> Json<PriceResponse> {
    let quote = quote_at(clock());
    info!(
        hour = quote.hour,
        price_per_kwh = quote.price_per_kwh,
        grid_load = %quote.grid_load,
        energy_source = %quote.energy_source,
        "served price quote"
    );
    Json(quote)
}

async fn get_health() -> (StatusCode, &'static str) {
    (StatusCode::OK, "OK")
}
