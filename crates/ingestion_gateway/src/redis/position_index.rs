use async_trait::async_trait;
use common::domain::{
    AgentLocation, DomainError, DomainResult, PositionIndex, PositionRecord, RadiusQuery,
    TelemetryFrame,
};
use common::redis::RedisClient;
use redis::geo::{Coord, RadiusOptions, RadiusOrder, RadiusSearchResult, Unit};
use redis::AsyncCommands;
use std::collections::HashMap;
use tracing::{debug, instrument};

/// Geo set holding every agent's last known location
pub const LOCATIONS_KEY: &str = "fleet:locations";

/// Hash holding an agent's last reported battery, velocity and timestamp
pub fn metadata_key(car_id: &str) -> String {
    format!("car:{}", car_id)
}

/// Redis-backed position index: a geo set for location plus one hash per agent
pub struct RedisPositionIndex {
    client: RedisClient,
}

impl RedisPositionIndex {
    pub fn new(client: RedisClient) -> Self {
        Self { client }
    }
}

/// Highest latitude a Redis geo set can index (Web Mercator bound)
pub const GEO_MAX_LATITUDE: f64 = 85.051_128_78;

fn check_indexable(frame: &TelemetryFrame) -> DomainResult<()> {
    if frame.latitude.abs() > GEO_MAX_LATITUDE {
        return Err(DomainError::RepositoryError(anyhow::anyhow!(
            "latitude {} is outside the indexable range of +/-{}",
            frame.latitude,
            GEO_MAX_LATITUDE
        )));
    }
    Ok(())
}

fn repository_error(e: redis::RedisError, what: &'static str) -> DomainError {
    DomainError::RepositoryError(anyhow::Error::new(e).context(what))
}

fn parse_field<T: std::str::FromStr>(
    hash: &HashMap<String, String>,
    field: &str,
) -> DomainResult<T> {
    hash.get(field)
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| {
            DomainError::RepositoryError(anyhow::anyhow!(
                "position metadata field '{}' missing or malformed",
                field
            ))
        })
}

#[async_trait]
impl PositionIndex for RedisPositionIndex {
    #[instrument(skip(self, frame), fields(car_id = %frame.car_id))]
    async fn upsert_position(&self, frame: &TelemetryFrame) -> DomainResult<()> {
        let mut conn = self.client.connection();

        let metadata = [
            ("battery", frame.battery_level.to_string()),
            ("velocity", frame.velocity.to_string()),
            ("timestamp", frame.timestamp.to_string()),
        ];

        check_indexable(frame)?;

        // location first; metadata is only written once the geo set accepted it
        let _: () = conn
            .geo_add(
                LOCATIONS_KEY,
                (Coord::lon_lat(frame.longitude, frame.latitude), frame.car_id.as_str()),
            )
            .await
            .map_err(|e| repository_error(e, "failed to index location"))?;

        let _: () = conn
            .hset_multiple(metadata_key(&frame.car_id), &metadata[..])
            .await
            .map_err(|e| repository_error(e, "failed to write position metadata"))?;

        debug!("position upserted");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_position(&self, car_id: &str) -> DomainResult<Option<PositionRecord>> {
        let mut conn = self.client.connection();

        let positions: Vec<Option<Coord<f64>>> = conn
            .geo_pos(LOCATIONS_KEY, car_id)
            .await
            .map_err(|e| repository_error(e, "failed to read location"))?;

        let Some(coord) = positions.into_iter().next().flatten() else {
            return Ok(None);
        };

        let metadata: HashMap<String, String> = conn
            .hgetall(metadata_key(car_id))
            .await
            .map_err(|e| repository_error(e, "failed to read position metadata"))?;

        Ok(Some(PositionRecord {
            car_id: car_id.to_string(),
            latitude: coord.latitude,
            longitude: coord.longitude,
            battery_level: parse_field(&metadata, "battery")?,
            velocity: parse_field(&metadata, "velocity")?,
            last_seen: parse_field(&metadata, "timestamp")?,
        }))
    }

    #[instrument(skip(self))]
    async fn agents_within_radius(&self, query: RadiusQuery) -> DomainResult<Vec<AgentLocation>> {
        let mut conn = self.client.connection();

        let options = RadiusOptions::default()
            .with_coord()
            .order(RadiusOrder::Asc);

        let results: Vec<RadiusSearchResult> = conn
            .geo_radius(
                LOCATIONS_KEY,
                query.longitude,
                query.latitude,
                query.radius_km,
                Unit::Kilometers,
                options,
            )
            .await
            .map_err(|e| repository_error(e, "radius query failed"))?;

        Ok(results
            .into_iter()
            .filter_map(|hit| {
                hit.coord.map(|coord| AgentLocation {
                    car_id: hit.name,
                    latitude: coord.latitude,
                    longitude: coord.longitude,
                })
            })
            .collect())
    }
}
