#![cfg(feature = "integration-tests")]

use async_nats::jetstream::{self, consumer::pull};
use chrono::{Duration as ChronoDuration, Utc};
use common::domain::{
    AnalyticsEvent, AnalyticsEventProducer, DeviceType, SensorType, SensorValue,
    TelemetryReading,
};
use common::memory::InMemoryBacklogRepository;
use common::nats::{NatsClient, StreamSettings};
use common::telemetry::PipelineMetrics;
use futures::StreamExt;
use ingestion::{NatsAnalyticsEventProducer, NoopHeartbeat, ProducerSettings, TelemetryService};
use std::sync::Arc;
use std::time::Duration;
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, GenericImage, ImageExt};

const STREAM_NAME: &str = "analytics_events";

struct TestEnvironment {
    _nats_container: ContainerAsync<GenericImage>,
    nats_url: String,
    producer: Arc<NatsAnalyticsEventProducer>,
}

async fn setup_test_env() -> TestEnvironment {
    let nats_container = GenericImage::new("nats", "latest")
        .with_exposed_port(4222.into())
        .with_cmd(["-js"])
        .start()
        .await
        .unwrap();

    let host = nats_container.get_host().await.unwrap();
    let port = nats_container.get_host_port_ipv4(4222).await.unwrap();
    let nats_url = format!("nats://{}:{}", host, port);

    let client = NatsClient::connect(&nats_url, Duration::from_secs(10))
        .await
        .expect("Failed to connect to NATS");
    client
        .ensure_stream(&StreamSettings {
            name: STREAM_NAME.to_string(),
            description: "integration test stream".to_string(),
            duplicate_window: Duration::from_secs(120),
        })
        .await
        .expect("Failed to create stream");

    let producer = NatsAnalyticsEventProducer::new(
        client.create_publisher_client(),
        ProducerSettings::default(),
        PipelineMetrics::new(),
    );

    TestEnvironment {
        _nats_container: nats_container,
        nats_url,
        producer: Arc::new(producer),
    }
}

fn reading(device_id: &str, sensor_id: &str, offset_ms: i64) -> TelemetryReading {
    TelemetryReading {
        device_id: device_id.to_string(),
        device_type: DeviceType::Conveyor,
        sensor_id: sensor_id.to_string(),
        sensor_type: SensorType::Speed,
        timestamp: Utc::now() - ChronoDuration::seconds(30) + ChronoDuration::milliseconds(offset_ms),
        value: SensorValue::scalar(1.25),
    }
}

async fn read_subject(nats_url: &str, subject: &str, count: usize) -> Vec<AnalyticsEvent> {
    let client = async_nats::connect(nats_url).await.unwrap();
    let stream = jetstream::new(client).get_stream(STREAM_NAME).await.unwrap();
    let consumer = stream
        .create_consumer(pull::Config {
            filter_subject: subject.to_string(),
            ..Default::default()
        })
        .await
        .unwrap();

    let mut messages = consumer
        .fetch()
        .max_messages(count)
        .expires(Duration::from_secs(2))
        .messages()
        .await
        .unwrap();

    let mut events = Vec::new();
    while let Some(message) = messages.next().await {
        let message = message.unwrap();
        events.push(serde_json::from_slice(&message.payload).unwrap());
    }
    events
}

#[tokio::test]
async fn test_repeated_message_id_is_deduplicated() {
    let env = setup_test_env().await;
    let event = ingestion::to_analytics_event(&reading("conv-1", "speed-1", 0));

    let first = env.producer.publish(&event).await.unwrap();
    let second = env.producer.publish(&event).await.unwrap();

    assert!(!first.duplicate);
    assert!(second.duplicate);
    assert_eq!(first.sequence, second.sequence);
    assert_eq!(read_subject(&env.nats_url, "analytics_events.conv-1", 5).await.len(), 1);
}

#[tokio::test]
async fn test_batch_keeps_device_order_on_subject() {
    // Arrange
    let env = setup_test_env().await;
    let service = TelemetryService::new(
        env.producer.clone(),
        Arc::new(InMemoryBacklogRepository::new()),
        Arc::new(NoopHeartbeat),
        PipelineMetrics::new(),
    );
    let readings: Vec<TelemetryReading> = (0..20)
        .map(|i| {
            let device = if i % 2 == 0 { "conv-a" } else { "conv-b" };
            reading(device, &format!("s-{:02}", i), i)
        })
        .collect();

    // Act
    let result = service.process_batch(readings).await.unwrap();

    // Assert
    assert_eq!(result.accepted, 20);
    let events = read_subject(&env.nats_url, "analytics_events.conv-a", 10).await;
    let sensors: Vec<String> = events.iter().map(|e| e.sensor_id.clone()).collect();
    let expected: Vec<String> = (0..20).step_by(2).map(|i| format!("s-{:02}", i)).collect();
    assert_eq!(sensors, expected);
}
