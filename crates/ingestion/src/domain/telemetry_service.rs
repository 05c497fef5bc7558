use crate::domain::{to_analytics_event, validate};
use chrono::{DateTime, Utc};
use common::domain::{
    AnalyticsEventProducer, BacklogRecord, BacklogRepository, BatchItemError, BatchResult,
    DeviceHeartbeat, DomainError, DomainResult, PublishAck, TelemetryReading, MAX_BATCH_SIZE,
};
use common::telemetry::PipelineMetrics;
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument, warn, Instrument};

/// Default number of device groups a batch processes at once
pub const DEFAULT_BATCH_MAX_CONCURRENCY: usize = 16;

/// Outcome of an accepted single reading
#[derive(Debug, Clone, PartialEq)]
pub struct IngestReceipt {
    pub device_id: String,
    pub sensor_id: String,
    pub received_at: DateTime<Utc>,
    pub ack: PublishAck,
}

/// Readings of one device in submission order, each paired with its batch index
struct DeviceGroup {
    device_id: String,
    items: Vec<(usize, TelemetryReading)>,
}

struct DeviceGroupOutcome {
    device_id: String,
    accepted: usize,
    errors: Vec<BatchItemError>,
}

/// Validates, stores and publishes telemetry readings
///
/// Flow per reading:
/// 1. Validate identity fields, value shape and timestamp
/// 2. Insert an unprocessed copy into the backlog
/// 3. Translate to an analytics event and publish it
///
/// Accepted devices get a fire-and-forget heartbeat.
pub struct TelemetryService {
    producer: Arc<dyn AnalyticsEventProducer>,
    backlog: Arc<dyn BacklogRepository>,
    heartbeat: Arc<dyn DeviceHeartbeat>,
    metrics: PipelineMetrics,
    max_concurrency: usize,
}

impl TelemetryService {
    pub fn new(
        producer: Arc<dyn AnalyticsEventProducer>,
        backlog: Arc<dyn BacklogRepository>,
        heartbeat: Arc<dyn DeviceHeartbeat>,
        metrics: PipelineMetrics,
    ) -> Self {
        Self {
            producer,
            backlog,
            heartbeat,
            metrics,
            max_concurrency: DEFAULT_BATCH_MAX_CONCURRENCY,
        }
    }

    /// Upper bound on device groups processed concurrently within one batch
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    /// Ingest one reading
    #[instrument(skip(self, reading), fields(device_id = %reading.device_id, sensor_id = %reading.sensor_id))]
    pub async fn ingest(&self, reading: TelemetryReading) -> DomainResult<IngestReceipt> {
        self.metrics.record_received(1);
        let received_at = Utc::now();

        let ack = self.process_reading(&reading, received_at).await?;
        self.spawn_heartbeat(reading.device_id.clone());

        Ok(IngestReceipt {
            device_id: reading.device_id,
            sensor_id: reading.sensor_id,
            received_at,
            ack,
        })
    }

    /// Ingest a batch, isolating failures per item
    ///
    /// Readings are grouped by device. Groups run concurrently, items inside a
    /// group run one after another in submission order.
    #[instrument(skip(self, readings), fields(total = readings.len()))]
    pub async fn process_batch(&self, readings: Vec<TelemetryReading>) -> DomainResult<BatchResult> {
        let total = readings.len();
        if total == 0 || total > MAX_BATCH_SIZE {
            return Err(DomainError::InvalidBatchSize {
                actual: total,
                max: MAX_BATCH_SIZE,
            });
        }

        self.metrics.record_received(total as u64);
        let received_at = Utc::now();

        let outcomes: Vec<DeviceGroupOutcome> = stream::iter(group_by_device(readings))
            .map(|group| self.process_device_group(group, received_at))
            .buffer_unordered(self.max_concurrency)
            .collect()
            .await;

        let mut errors = Vec::new();
        for outcome in outcomes {
            if outcome.accepted > 0 {
                self.spawn_heartbeat(outcome.device_id);
            }
            errors.extend(outcome.errors);
        }

        let result = BatchResult::from_errors(total, errors, received_at);
        debug!(
            status = ?result.status,
            accepted = result.accepted,
            rejected = result.rejected,
            "batch processed"
        );
        Ok(result)
    }

    async fn process_device_group(
        &self,
        group: DeviceGroup,
        received_at: DateTime<Utc>,
    ) -> DeviceGroupOutcome {
        let mut accepted = 0;
        let mut errors = Vec::new();

        for (index, reading) in group.items {
            match self.process_reading(&reading, received_at).await {
                Ok(_) => accepted += 1,
                Err(e) => errors.push(BatchItemError {
                    index,
                    device_id: reading.device_id,
                    message: e.to_string(),
                }),
            }
        }

        DeviceGroupOutcome {
            device_id: group.device_id,
            accepted,
            errors,
        }
    }

    async fn process_reading(
        &self,
        reading: &TelemetryReading,
        received_at: DateTime<Utc>,
    ) -> DomainResult<PublishAck> {
        if let Err(e) = validate(reading, received_at) {
            warn!(
                device_id = %reading.device_id,
                sensor_id = %reading.sensor_id,
                reason = %e.reason(),
                error = %e,
                "rejected telemetry reading"
            );
            self.metrics.record_rejected(e.reason().as_str());
            return Err(e.into());
        }

        self.backlog
            .insert(BacklogRecord::from_reading(reading, received_at))
            .await?;

        let event = to_analytics_event(reading);
        let ack = self.producer.publish(&event).await?;

        debug!(
            device_id = %event.device_id,
            sequence = ack.sequence,
            duplicate = ack.duplicate,
            "published analytics event"
        );
        Ok(ack)
    }

    fn spawn_heartbeat(&self, device_id: String) {
        let heartbeat = Arc::clone(&self.heartbeat);
        tokio::spawn(
            async move {
                if let Err(e) = heartbeat.send_heartbeat(&device_id).await {
                    warn!(device_id = %device_id, error = %e, "device heartbeat failed");
                }
            }
            .in_current_span(),
        );
    }
}

/// Group readings by device id, keeping first-appearance order of devices
fn group_by_device(readings: Vec<TelemetryReading>) -> Vec<DeviceGroup> {
    let mut groups: Vec<DeviceGroup> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for (index, reading) in readings.into_iter().enumerate() {
        match positions.get(&reading.device_id) {
            Some(&position) => groups[position].items.push((index, reading)),
            None => {
                positions.insert(reading.device_id.clone(), groups.len());
                groups.push(DeviceGroup {
                    device_id: reading.device_id.clone(),
                    items: vec![(index, reading)],
                });
            }
        }
    }

    groups
}
