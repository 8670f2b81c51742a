use crate::http::{pricing_router, system_clock};
use anyhow::Context;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub struct PricingOracleConfig {
    pub host: String,
    pub port: u16,
}

pub struct PricingOracleServer {
    config: PricingOracleConfig,
}

impl PricingOracleServer {
    pub fn new(config: PricingOracleConfig) -> Self {
        Self { config }
    }

    pub fn into_runner_process(
        self,
    ) -> impl FnOnce(
        CancellationToken,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = anyhow::Result<()>> + Send>,
    > {
        move |ctx| Box::pin(async move { self.serve(ctx).await })
    }

    async fn serve(self, ctx: CancellationToken) -> anyhow::Result<()> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("failed to bind pricing oracle on {}", addr))?;
        info!(address = %addr, "pricing oracle listening");

        axum::serve(listener, pricing_router(system_clock()))
            .with_graceful_shutdown(async move { ctx.cancelled().await })
            .await
            .context("pricing oracle server failed")?;

        info!("pricing oracle stopped");
        Ok(())
    }
}
