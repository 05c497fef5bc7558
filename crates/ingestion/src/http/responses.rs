use chrono::{DateTime, Utc};
use common::domain::{TelemetryReading, ValidationReason};
use serde::{Deserialize, Serialize};

pub const ACCEPTED_MESSAGE: &str = "Telemetry data received successfully";

/// Body of `POST /telemetry/batch`
#[derive(Debug, Clone, Deserialize)]
pub struct BatchRequest {
    pub readings: Vec<TelemetryReading>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResponseStatus {
    Ok,
    Error,
}

/// Body returned by `POST /telemetry`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryResponse {
    pub status: ResponseStatus,
    pub device_id: String,
    pub sensor_id: String,
    pub received_at: DateTime<Utc>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<ValidationReason>,
}

impl TelemetryResponse {
    pub fn accepted(device_id: String, sensor_id: String, received_at: DateTime<Utc>) -> Self {
        Self {
            status: ResponseStatus::Ok,
            device_id,
            sensor_id,
            received_at,
            message: ACCEPTED_MESSAGE.to_string(),
            reason: None,
        }
    }

    pub fn failed(
        device_id: String,
        sensor_id: String,
        message: String,
        reason: Option<ValidationReason>,
    ) -> Self {
        Self {
            status: ResponseStatus::Error,
            device_id,
            sensor_id,
            received_at: Utc::now(),
            message,
            reason,
        }
    }
}

/// Uniform error body for requests that never reached the pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: u16,
    pub error: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub details: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimeRangeParams {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricStatsParams {
    pub metric: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceMetricsResponse {
    pub device_id: String,
    pub metrics: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceCountResponse {
    pub device_id: String,
    pub count: i64,
}
