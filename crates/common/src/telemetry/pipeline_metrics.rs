use metrics::{counter, histogram};
use std::time::Duration;

pub const MESSAGES_RECEIVED: &str = "fleetline.ingestion.messages.received";
pub const MESSAGES_PUBLISHED: &str = "fleetline.ingestion.messages.published";
pub const MESSAGES_FAILED: &str = "fleetline.ingestion.messages.failed";
pub const MESSAGES_REJECTED: &str = "fleetline.ingestion.messages.rejected";
pub const PUBLISH_LATENCY: &str = "fleetline.ingestion.publish.latency";
pub const BACKLOG_REPROCESSED: &str = "fleetline.backlog.reprocessed";
pub const BACKLOG_DELETED: &str = "fleetline.backlog.deleted";

/// Pipeline counters and the publish latency histogram.
///
/// Thin wrapper over the `metrics` facade; with no recorder installed every
/// call is a no-op.
#[derive(Clone, Debug, Default)]
pub struct PipelineMetrics;

impl PipelineMetrics {
    pub fn new() -> Self {
        Self
    }

    pub fn record_received(&self, count: u64) {
        counter!(MESSAGES_RECEIVED).increment(count);
    }

    pub fn record_rejected(&self, reason: &'static str) {
        counter!(MESSAGES_REJECTED, "reason" => reason).increment(1);
    }

    /// One latency sample plus exactly one of published/failed
    pub fn record_publish(&self, succeeded: bool, latency: Duration) {
        histogram!(PUBLISH_LATENCY).record(latency.as_secs_f64());
        if succeeded {
            counter!(MESSAGES_PUBLISHED).increment(1);
        } else {
            counter!(MESSAGES_FAILED).increment(1);
        }
    }

    pub fn record_reprocessed(&self, count: u64) {
        counter!(BACKLOG_REPROCESSED).increment(count);
    }

    pub fn record_deleted(&self, count: u64) {
        counter!(BACKLOG_DELETED).increment(count);
    }
}
