use anyhow::{bail, Context, Result};
use tokio::process::Command;
use tracing::{debug, info};

/// Connection settings for the goose `clickhouse` driver (native protocol)
#[derive(Debug, Clone)]
pub struct ClickHouseMigrationConfig {
    pub goose_binary_path: String,
    pub migrations_dir: String,
    /// host:port of the native protocol endpoint
    pub native_url: String,
    pub database: String,
    pub username: String,
    pub password: String,
}

impl ClickHouseMigrationConfig {
    pub fn dsn(&self) -> String {
        format!(
            "clickhouse://{}:{}@{}/{}",
            self.username, self.password, self.native_url, self.database
        )
    }
}

/// Applies the versioned SQL migrations by shelling out to goose
pub struct ClickHouseMigrator {
    config: ClickHouseMigrationConfig,
}

impl ClickHouseMigrator {
    pub fn new(config: ClickHouseMigrationConfig) -> Self {
        Self { config }
    }

    /// `goose -dir <dir> clickhouse <dsn> up`
    pub async fn run_migrations(&self) -> Result<()> {
        info!(dir = %self.config.migrations_dir, "running ClickHouse migrations");
        let stdout = self.goose("up").await?;
        debug!("migrations completed:\n{}", stdout);
        Ok(())
    }

    /// `goose ... status`, returned verbatim
    pub async fn migration_status(&self) -> Result<String> {
        self.goose("status").await
    }

    async fn goose(&self, command: &str) -> Result<String> {
        let output = Command::new(&self.config.goose_binary_path)
            .arg("-dir")
            .arg(&self.config.migrations_dir)
            .arg("clickhouse")
            .arg(self.config.dsn())
            .arg(command)
            .output()
            .await
            .with_context(|| format!("failed to spawn {}", self.config.goose_binary_path))?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("goose {} failed.\nstdout: {}\nstderr: {}", command, stdout, stderr);
        }

        Ok(stdout)
    }
}
