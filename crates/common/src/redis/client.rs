use anyhow::{Context, Result};
use redis::aio::ConnectionManager;
use std::time::Duration;
use tracing::info;

/// Shared handle to Redis; clones share one multiplexed, auto-reconnecting connection
#[derive(Clone)]
pub struct RedisClient {
    connection: ConnectionManager,
}

impl RedisClient {
    pub async fn connect(url: &str, timeout: Duration) -> Result<Self> {
        info!(url = %url, timeout_ms = timeout.as_millis(), "Connecting to Redis");

        let client = redis::Client::open(url).context("Invalid Redis URL")?;
        let connection = tokio::time::timeout(timeout, ConnectionManager::new(client))
            .await
            .context("Timed out connecting to Redis")?
            .context("Failed to connect to Redis")?;

        info!("Successfully connected to Redis");
        Ok(Self { connection })
    }

    /// A connection handle for issuing commands; cheap to clone
    pub fn connection(&self) -> ConnectionManager {
        self.connection.clone()
    }
}
