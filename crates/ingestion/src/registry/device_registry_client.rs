use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use common::domain::DeviceHeartbeat;
use std::time::Duration;
use reqwest::Url;
use tracing::debug;

/// Heartbeat client for the device registry HTTP API
#[derive(Clone)]
pub struct DeviceRegistryClient {
    http: reqwest::Client,
    base_url: Url,
}

impl DeviceRegistryClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build device registry HTTP client")?;

        let base_url = base_url.into();
        let base_url = Url::parse(&base_url)
            .with_context(|| format!("Invalid device registry URL {}", base_url))?;
        if base_url.cannot_be_a_base() {
            return Err(anyhow!("Device registry URL {} cannot be a base", base_url));
        }

        Ok(Self { http, base_url })
    }

    /// The device id is pushed as one percent-encoded path segment
    fn heartbeat_url(&self, device_id: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("Device registry URL {} cannot be a base", self.base_url))?
            .pop_if_empty()
            .extend(["api", "v1", "devices", device_id, "heartbeat"]);
        Ok(url)
    }
}

#[async_trait]
impl DeviceHeartbeat for DeviceRegistryClient {
    async fn send_heartbeat(&self, device_id: &str) -> Result<()> {
        let url = self.heartbeat_url(device_id)?;
        self.http
            .post(url.clone())
            .send()
            .await
            .with_context(|| format!("Heartbeat request to {} failed", url))?
            .error_for_status()
            .with_context(|| format!("Device registry rejected heartbeat for {}", device_id))?;

        debug!(device_id = %device_id, "heartbeat sent");
        Ok(())
    }
}

/// Used when no registry is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHeartbeat;

#[async_trait]
impl DeviceHeartbeat for NoopHeartbeat {
    async fn send_heartbeat(&self, _device_id: &str) -> Result<()> {
        Ok(())
    }
}
