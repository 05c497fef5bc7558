use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Upper bound on readings accepted in one batch submission
pub const MAX_BATCH_SIZE: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BatchStatus {
    Ok,
    Partial,
    Error,
}

/// Failure of a single batch item, addressed by its position in the submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchItemError {
    pub index: usize,
    pub device_id: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    pub status: BatchStatus,
    pub total: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub received_at: DateTime<Utc>,
    pub errors: Vec<BatchItemError>,
}

impl BatchResult {
    /// Summarise a finished batch. Errors are reported in submission order.
    pub fn from_errors(
        total: usize,
        mut errors: Vec<BatchItemError>,
        received_at: DateTime<Utc>,
    ) -> Self {
        errors.sort_by_key(|e| e.index);
        let rejected = errors.len();
        let accepted = total.saturating_sub(rejected);

        let status = if rejected == 0 {
            BatchStatus::Ok
        } else if accepted == 0 {
            BatchStatus::Error
        } else {
            BatchStatus::Partial
        };

        Self {
            status,
            total,
            accepted,
            rejected,
            received_at,
            errors,
        }
    }
}
