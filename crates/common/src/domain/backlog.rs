use crate::domain::result::DomainResult;
use crate::domain::{DeviceType, SensorType, SensorValue, TelemetryReading};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Durable copy of an ingested reading awaiting (re)publication
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BacklogRecord {
    pub id: String,
    pub device_id: String,
    pub device_type: DeviceType,
    pub sensor_id: String,
    pub sensor_type: SensorType,
    pub metric_name: String,
    pub metric_value: f64,
    pub unit: String,
    pub value: SensorValue,
    pub timestamp: DateTime<Utc>,
    pub received_at: DateTime<Utc>,
    pub processed: bool,
}

impl BacklogRecord {
    pub fn from_reading(reading: &TelemetryReading, received_at: DateTime<Utc>) -> Self {
        Self {
            id: xid::new().to_string(),
            device_id: reading.device_id.clone(),
            device_type: reading.device_type,
            sensor_id: reading.sensor_id.clone(),
            sensor_type: reading.sensor_type,
            metric_name: reading.sensor_type.name().to_string(),
            metric_value: reading.value.metric_value(),
            unit: reading.sensor_type.unit().to_string(),
            value: reading.value.clone(),
            timestamp: reading.timestamp,
            received_at,
            processed: false,
        }
    }
}

/// Input for listing a device's readings within a time window
#[derive(Debug, Clone, PartialEq)]
pub struct ReadingsInRangeInput {
    pub device_id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub limit: usize,
}

/// Input for aggregating one metric of one device within a time window
#[derive(Debug, Clone, PartialEq)]
pub struct MetricStatsInput {
    pub device_id: String,
    pub metric_name: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Aggregates are `None` when no rows fall inside the window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricStats {
    pub device_id: String,
    pub metric_name: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub count: i64,
    pub average: Option<f64>,
    pub max: Option<f64>,
    pub min: Option<f64>,
}

/// Repository trait for the ingestion backlog
///
/// Ingest only inserts. The reprocessing sweep is the only caller that flips
/// `processed`, and the retention sweep is the only caller that deletes.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait BacklogRepository: Send + Sync {
    /// Store a freshly ingested reading as unprocessed
    async fn insert(&self, record: BacklogRecord) -> DomainResult<()>;

    /// Oldest-received-first page of unprocessed records
    async fn fetch_unprocessed(&self, limit: usize) -> DomainResult<Vec<BacklogRecord>>;

    /// Mark every id in the set processed in one atomic update.
    /// Returns the number of rows changed.
    async fn mark_processed(&self, ids: Vec<String>) -> DomainResult<u64>;

    /// Delete processed records whose reading timestamp is older than `cutoff`.
    /// Unprocessed records are never deleted.
    async fn delete_processed_older_than(&self, cutoff: DateTime<Utc>) -> DomainResult<u64>;

    async fn list_in_range(&self, input: ReadingsInRangeInput) -> DomainResult<Vec<BacklogRecord>>;

    async fn list_metric_names(&self, device_id: &str) -> DomainResult<Vec<String>>;

    async fn metric_stats(&self, input: MetricStatsInput) -> DomainResult<MetricStats>;

    async fn count_by_device(&self, device_id: &str) -> DomainResult<i64>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_from_reading_projects_metric() {
        let reading = TelemetryReading {
            device_id: "press-3".to_string(),
            device_type: DeviceType::Compressor,
            sensor_id: "vib-1".to_string(),
            sensor_type: SensorType::Vibration,
            timestamp: Utc::now(),
            value: SensorValue::vibration(3.0, 4.0, 0.0),
        };
        let received_at = Utc::now();

        let record = BacklogRecord::from_reading(&reading, received_at);

        assert_eq!(record.metric_name, "vibration");
        assert_eq!(record.metric_value, 5.0);
        assert_eq!(record.unit, "g");
        assert_eq!(record.received_at, received_at);
        assert!(!record.processed);
        assert_eq!(record.id.len(), 20);
    }
}
