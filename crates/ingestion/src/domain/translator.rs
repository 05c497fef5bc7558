use chrono::{DateTime, Utc};
use common::domain::{AnalyticsEvent, BacklogRecord, TelemetryReading};

/// Map a validated reading onto the outbound event.
pub fn to_analytics_event(reading: &TelemetryReading) -> AnalyticsEvent {
    AnalyticsEvent {
        device_id: reading.device_id.clone(),
        device_type: reading.device_type,
        sensor_id: reading.sensor_id.clone(),
        sensor_type: reading.sensor_type,
        timestamp: truncate_to_millis(reading.timestamp),
        unit: reading.sensor_type.unit().to_string(),
        value: reading.value.clone(),
    }
}

/// Rebuild the event for a stored backlog row.
pub fn backlog_record_to_event(record: &BacklogRecord) -> AnalyticsEvent {
    AnalyticsEvent {
        device_id: record.device_id.clone(),
        device_type: record.device_type,
        sensor_id: record.sensor_id.clone(),
        sensor_type: record.sensor_type,
        timestamp: truncate_to_millis(record.timestamp),
        unit: record.sensor_type.unit().to_string(),
        value: record.value.clone(),
    }
}

fn truncate_to_millis(timestamp: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(timestamp.timestamp_millis()).unwrap_or(timestamp)
}
