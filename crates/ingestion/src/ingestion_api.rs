use crate::http::{build_router, HttpState};
use anyhow::Context;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Address the HTTP API binds to
#[derive(Debug, Clone)]
pub struct HttpServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Ingestion HTTP API, run as a runner process
pub struct IngestionApi {
    state: HttpState,
    config: HttpServerConfig,
}

impl IngestionApi {
    pub fn new(state: HttpState, config: HttpServerConfig) -> Self {
        debug!(host = %config.host, port = config.port, "initializing ingestion API");
        Self { state, config }
    }

    pub fn into_runner_process(
        self,
    ) -> impl FnOnce(CancellationToken) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>
    {
        move |ctx| Box::pin(async move { run_http_server(self.config, self.state, ctx).await })
    }
}

async fn run_http_server(
    config: HttpServerConfig,
    state: HttpState,
    cancellation_token: CancellationToken,
) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("Invalid server address {}:{}", config.host, config.port))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!(address = %addr, "ingestion API listening");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(async move {
            cancellation_token.cancelled().await;
            debug!("HTTP server shutdown signal received");
        })
        .await
        .context("HTTP server failed")?;

    info!("ingestion API stopped");
    Ok(())
}
