use crate::domain::{DeviceType, PublishError, SensorType, SensorValue};
use crate::validation::not_blank;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use garde::Validate;
use serde::{Deserialize, Serialize};

/// Inbound sensor reading as submitted by a device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryReading {
    #[garde(custom(not_blank))]
    pub device_id: String,
    #[garde(skip)]
    pub device_type: DeviceType,
    #[garde(custom(not_blank))]
    pub sensor_id: String,
    #[garde(skip)]
    pub sensor_type: SensorType,
    #[garde(skip)]
    pub timestamp: DateTime<Utc>,
    #[garde(skip)]
    pub value: SensorValue,
}

/// Normalized event published to the analytics stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsEvent {
    pub device_id: String,
    pub device_type: DeviceType,
    pub sensor_id: String,
    pub sensor_type: SensorType,
    pub timestamp: DateTime<Utc>,
    pub unit: String,
    pub value: SensorValue,
}

impl AnalyticsEvent {
    pub fn timestamp_millis(&self) -> i64 {
        self.timestamp.timestamp_millis()
    }

    pub fn value_as_json(&self) -> String {
        self.value.to_json_string()
    }

    /// Stable identity of the reading, used for broker-side deduplication
    pub fn dedup_key(&self) -> String {
        format!(
            "{}:{}:{}",
            self.device_id,
            self.sensor_id,
            self.timestamp_millis()
        )
    }
}

/// Broker acknowledgment of a stored event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishAck {
    pub stream: String,
    pub sequence: u64,
    /// True when the broker recognised the message id and skipped the write
    pub duplicate: bool,
}

/// Trait for publishing analytics events to the message broker
///
/// Implementations should:
/// - Key every event by its device id so one device's events stay ordered
/// - Wait for the broker's full acknowledgment before returning
/// - Retry transient failures without producing duplicate writes
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait AnalyticsEventProducer: Send + Sync {
    async fn publish(&self, event: &AnalyticsEvent) -> Result<PublishAck, PublishError>;
}

/// Liveness signal sent to the device registry whenever a device reports data
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait DeviceHeartbeat: Send + Sync {
    async fn send_heartbeat(&self, device_id: &str) -> anyhow::Result<()>;
}
