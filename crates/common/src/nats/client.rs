use crate::nats::traits::{JetStreamPublisher, StreamAck};
use anyhow::{Context, Result};
use async_nats::jetstream::{
    self,
    stream::{Compression, Config as StreamConfig},
};
use async_nats::HeaderMap;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Settings for a stream created at startup
#[derive(Debug, Clone)]
pub struct StreamSettings {
    pub name: String,
    pub description: String,
    /// Window in which JetStream drops messages with a repeated `Nats-Msg-Id`
    pub duplicate_window: Duration,
}

impl StreamSettings {
    /// Stream config capturing `{name}.*` with S2 compression
    pub fn to_config(&self) -> StreamConfig {
        StreamConfig {
            name: self.name.clone(),
            subjects: vec![format!("{}.*", self.name)],
            description: Some(self.description.clone()),
            duplicate_window: self.duplicate_window,
            compression: Some(Compression::S2),
            ..Default::default()
        }
    }
}

pub struct NatsClient {
    client: async_nats::Client,
    jetstream: jetstream::Context,
}

impl NatsClient {
    pub async fn connect(url: &str, timeout: Duration) -> Result<Self> {
        info!(url = %url, timeout_ms = timeout.as_millis(), "Connecting to NATS");

        let client = async_nats::ConnectOptions::new()
            .connection_timeout(timeout)
            .connect(url)
            .await
            .context("Failed to connect to NATS")?;

        let jetstream = jetstream::new(client.clone());

        info!("Successfully connected to NATS");
        Ok(Self { client, jetstream })
    }

    pub async fn ensure_stream(&self, settings: &StreamSettings) -> Result<()> {
        ensure_stream(self.create_publisher_client().as_ref(), settings).await
    }

    /// Create a JetStreamPublisher trait object from this client
    pub fn create_publisher_client(&self) -> Arc<dyn JetStreamPublisher> {
        Arc::new(NatsJetStreamPublisher::new(self.jetstream.clone()))
    }

    /// Flush buffered publishes before the connection is dropped
    pub async fn close(&self) {
        info!("Closing NATS connection");
        if let Err(e) = self.client.flush().await {
            warn!(error = %e, "failed to flush NATS connection on close");
        }
    }
}

/// Look the stream up and create it when missing
pub async fn ensure_stream(
    publisher: &dyn JetStreamPublisher,
    settings: &StreamSettings,
) -> Result<()> {
    info!(stream = %settings.name, "Ensuring stream exists");

    match publisher.get_stream(&settings.name).await {
        Ok(()) => {
            info!(stream = %settings.name, "Stream already exists");
        }
        Err(_) => {
            publisher
                .create_stream(settings.to_config())
                .await
                .context("Failed to create stream")?;
            info!(
                stream = %settings.name,
                duplicate_window_secs = settings.duplicate_window.as_secs(),
                "Created stream"
            );
        }
    }

    Ok(())
}

/// Concrete implementation of JetStreamPublisher using async-nats
pub struct NatsJetStreamPublisher {
    context: jetstream::Context,
}

impl NatsJetStreamPublisher {
    pub fn new(context: jetstream::Context) -> Self {
        Self { context }
    }
}

#[async_trait]
impl JetStreamPublisher for NatsJetStreamPublisher {
    async fn get_stream(&self, stream_name: &str) -> Result<()> {
        self.context
            .get_stream(stream_name)
            .await
            .context("Failed to get stream")?;
        Ok(())
    }

    async fn create_stream(&self, config: jetstream::stream::Config) -> Result<()> {
        self.context
            .create_stream(config)
            .await
            .context("Failed to create stream")?;
        Ok(())
    }

    #[instrument(skip(self, headers, payload), fields(subject = %subject, payload_size = payload.len()))]
    async fn publish_with_headers(
        &self,
        subject: String,
        headers: HeaderMap,
        payload: bytes::Bytes,
    ) -> Result<StreamAck> {
        let ack_future = self
            .context
            .publish_with_headers(subject, headers, payload)
            .await
            .context("Failed to publish message to JetStream")?;

        let ack = ack_future
            .await
            .context("Failed to receive JetStream acknowledgment")?;

        Ok(StreamAck {
            stream: ack.stream,
            sequence: ack.sequence,
            duplicate: ack.duplicate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nats::MockJetStreamPublisher;

    fn settings() -> StreamSettings {
        StreamSettings {
            name: "analytics_events".to_string(),
            description: "Analytics events keyed by device".to_string(),
            duplicate_window: Duration::from_secs(120),
        }
    }

    #[test]
    fn test_stream_config() {
        let config = settings().to_config();
        assert_eq!(config.subjects, vec!["analytics_events.*".to_string()]);
        assert_eq!(config.duplicate_window, Duration::from_secs(120));
        assert_eq!(config.compression, Some(Compression::S2));
    }

    #[tokio::test]
    async fn test_ensure_stream_skips_existing() {
        let mut publisher = MockJetStreamPublisher::new();
        publisher
            .expect_get_stream()
            .withf(|name: &str| name == "analytics_events")
            .times(1)
            .returning(|_| Ok(()));
        publisher.expect_create_stream().times(0);

        ensure_stream(&publisher, &settings()).await.unwrap();
    }

    #[tokio::test]
    async fn test_ensure_stream_creates_missing() {
        let mut publisher = MockJetStreamPublisher::new();
        publisher
            .expect_get_stream()
            .times(1)
            .returning(|_| Err(anyhow::anyhow!("stream not found")));
        publisher
            .expect_create_stream()
            .withf(|config: &StreamConfig| {
                config.name == "analytics_events" && config.compression == Some(Compression::S2)
            })
            .times(1)
            .returning(|_| Ok(()));

        ensure_stream(&publisher, &settings()).await.unwrap();
    }
}
