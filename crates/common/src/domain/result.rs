use crate::domain::{SensorType, ValueKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Publish(#[from] PublishError),

    #[error("Batch must contain between 1 and {max} readings, got {actual}")]
    InvalidBatchSize { actual: usize, max: usize },

    #[error("Invalid time range: start {start} is after end {end}")]
    InvalidTimeRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("Repository error: {0}")]
    RepositoryError(#[from] anyhow::Error),
}

/// Reasons a reading is rejected before publication
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Sensor type {sensor_type} requires a {expected} value but received {actual}")]
    VariantMismatch {
        sensor_type: SensorType,
        expected: ValueKind,
        actual: ValueKind,
    },

    #[error("Timestamp {timestamp} is in the future")]
    FutureTimestamp { timestamp: DateTime<Utc> },

    #[error("Missing required field: {0}")]
    MissingField(String),
}

/// Machine-readable tag for a [`ValidationError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationReason {
    VariantMismatch,
    FutureTimestamp,
    MissingField,
}

impl ValidationError {
    pub fn reason(&self) -> ValidationReason {
        match self {
            ValidationError::VariantMismatch { .. } => ValidationReason::VariantMismatch,
            ValidationError::FutureTimestamp { .. } => ValidationReason::FutureTimestamp,
            ValidationError::MissingField(_) => ValidationReason::MissingField,
        }
    }
}

impl ValidationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationReason::VariantMismatch => "VariantMismatch",
            ValidationReason::FutureTimestamp => "FutureTimestamp",
            ValidationReason::MissingField => "MissingField",
        }
    }
}

impl fmt::Display for ValidationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure to get an acknowledged write from the broker
#[derive(Error, Debug)]
pub enum PublishError {
    #[error("Publish to {subject} timed out after {timeout:?}")]
    Timeout { subject: String, timeout: Duration },

    #[error("Publish to {subject} failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        subject: String,
        attempts: u32,
        #[source]
        source: anyhow::Error,
    },

    #[error("Failed to serialize analytics event: {0}")]
    Serialization(#[from] serde_json::Error),
}
