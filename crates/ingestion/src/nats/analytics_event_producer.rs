use async_trait::async_trait;
use common::domain::{AnalyticsEvent, AnalyticsEventProducer, PublishAck, PublishError};
use common::nats::{
    JetStreamPublisher, LayeredPublisher, NatsPublishError, NatsPublisherBuilder,
    PublishSpanConfig, PublishRequest, RetryPolicy,
};
use common::telemetry::PipelineMetrics;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower::ServiceExt;
use tracing::debug;

/// Publish behaviour for the analytics stream
#[derive(Debug, Clone)]
pub struct ProducerSettings {
    pub stream: String,
    /// Bound on one publish call, retries included
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for ProducerSettings {
    fn default() -> Self {
        Self {
            stream: "analytics_events".to_string(),
            timeout: Duration::from_secs(5),
            retry: RetryPolicy::default(),
        }
    }
}

/// Publishes analytics events to JetStream, one subject per device
pub struct NatsAnalyticsEventProducer {
    publisher: LayeredPublisher,
    stream: String,
    metrics: PipelineMetrics,
}

impl NatsAnalyticsEventProducer {
    pub fn new(
        jetstream: Arc<dyn JetStreamPublisher>,
        settings: ProducerSettings,
        metrics: PipelineMetrics,
    ) -> Self {
        debug!(
            stream = %settings.stream,
            timeout_ms = settings.timeout.as_millis() as u64,
            max_retries = settings.retry.max_retries,
            "initialized NatsAnalyticsEventProducer"
        );

        let publisher = NatsPublisherBuilder::new(jetstream)
            .with_tracing(PublishSpanConfig::new("analytics_event_producer"))
            .with_logging()
            .with_timeout(settings.timeout)
            .with_retry(settings.retry)
            .build();

        Self {
            publisher,
            stream: settings.stream,
            metrics,
        }
    }

    fn subject_for(&self, device_id: &str) -> String {
        format!("{}.{}", self.stream, subject_token(device_id))
    }

    async fn send(&self, event: &AnalyticsEvent) -> Result<PublishAck, PublishError> {
        let payload = serde_json::to_vec(event)?;
        let request =
            PublishRequest::new(self.subject_for(&event.device_id), payload).with_message_id(&event.dedup_key());

        let response = self
            .publisher
            .clone()
            .oneshot(request)
            .await
            .map_err(into_publish_error)?;

        Ok(PublishAck {
            stream: response.ack.stream,
            sequence: response.ack.sequence,
            duplicate: response.ack.duplicate,
        })
    }
}

#[async_trait]
impl AnalyticsEventProducer for NatsAnalyticsEventProducer {
    async fn publish(&self, event: &AnalyticsEvent) -> Result<PublishAck, PublishError> {
        let started = Instant::now();
        let result = self.send(event).await;
        self.metrics.record_publish(result.is_ok(), started.elapsed());
        result
    }
}

/// Device id as a single subject token.
///
/// `.` separates tokens and `*`/`>` are wildcards, so those and whitespace
/// become `_`.
pub fn subject_token(device_id: &str) -> String {
    device_id
        .chars()
        .map(|c| match c {
            '.' | '*' | '>' => '_',
            c if c.is_whitespace() => '_',
            c => c,
        })
        .collect()
}

fn into_publish_error(err: NatsPublishError) -> PublishError {
    match err {
        NatsPublishError::Timeout { subject, timeout } => PublishError::Timeout { subject, timeout },
        NatsPublishError::Exhausted {
            subject,
            attempts,
            source,
        } => PublishError::RetriesExhausted {
            subject,
            attempts,
            source,
        },
        // only reachable without a retry layer
        NatsPublishError::Failed(source) => PublishError::RetriesExhausted {
            subject: String::new(),
            attempts: 1,
            source,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use common::domain::{DeviceType, SensorType, SensorValue};
    use common::nats::{MockJetStreamPublisher, StreamAck};

    fn event(device_id: &str) -> AnalyticsEvent {
        AnalyticsEvent {
            device_id: device_id.to_string(),
            device_type: DeviceType::Compressor,
            sensor_id: "pres-1".to_string(),
            sensor_type: SensorType::Pressure,
            timestamp: Utc.timestamp_millis_opt(1_714_557_600_250).unwrap(),
            unit: "bar".to_string(),
            value: SensorValue::scalar(7.2),
        }
    }

    fn settings() -> ProducerSettings {
        ProducerSettings {
            stream: "analytics_events".to_string(),
            timeout: Duration::from_secs(5),
            retry: RetryPolicy {
                max_retries: 2,
                initial_backoff: Duration::from_millis(1),
            },
        }
    }

    #[test]
    fn test_subject_token_replaces_reserved_characters() {
        assert_eq!(subject_token("comp-1"), "comp-1");
        assert_eq!(subject_token("plant.a/comp 1"), "plant_a/comp_1");
        assert_eq!(subject_token("a*b>c"), "a_b_c");
    }

    #[tokio::test]
    async fn test_publish_keys_by_device_and_sets_message_id() {
        // Arrange
        let mut mock = MockJetStreamPublisher::new();
        mock.expect_publish_with_headers()
            .withf(|subject, headers, payload| {
                let body: serde_json::Value = serde_json::from_slice(payload).unwrap();
                subject == "analytics_events.comp-7"
                    && headers.get("Nats-Msg-Id").map(|v| v.as_str())
                        == Some("comp-7:pres-1:1714557600250")
                    && body["deviceId"] == "comp-7"
                    && body["unit"] == "bar"
            })
            .times(1)
            .returning(|_, _, _| {
                Ok(StreamAck {
                    stream: "analytics_events".to_string(),
                    sequence: 11,
                    duplicate: false,
                })
            });
        let producer =
            NatsAnalyticsEventProducer::new(Arc::new(mock), settings(), PipelineMetrics::new());

        // Act
        let ack = producer.publish(&event("comp-7")).await.unwrap();

        // Assert
        assert_eq!(ack.stream, "analytics_events");
        assert_eq!(ack.sequence, 11);
        assert!(!ack.duplicate);
    }

    #[tokio::test]
    async fn test_duplicate_ack_is_reported() {
        let mut mock = MockJetStreamPublisher::new();
        mock.expect_publish_with_headers().times(1).returning(|_, _, _| {
            Ok(StreamAck {
                stream: "analytics_events".to_string(),
                sequence: 11,
                duplicate: true,
            })
        });
        let producer =
            NatsAnalyticsEventProducer::new(Arc::new(mock), settings(), PipelineMetrics::new());

        let ack = producer.publish(&event("comp-7")).await.unwrap();

        assert!(ack.duplicate);
    }

    #[tokio::test]
    async fn test_broker_failure_exhausts_retries() {
        // Arrange
        let mut mock = MockJetStreamPublisher::new();
        mock.expect_publish_with_headers()
            .times(3)
            .returning(|_, _, _| Err(anyhow::anyhow!("no responders available")));
        let producer =
            NatsAnalyticsEventProducer::new(Arc::new(mock), settings(), PipelineMetrics::new());

        // Act
        let result = producer.publish(&event("comp-7")).await;

        // Assert
        match result {
            Err(PublishError::RetriesExhausted {
                subject, attempts, ..
            }) => {
                assert_eq!(subject, "analytics_events.comp-7");
                assert_eq!(attempts, 3);
            }
            other => panic!("Expected RetriesExhausted, got {:?}", other),
        }
    }
}
