use crate::domain::SingleFlight;
use chrono::{DateTime, Duration, Utc};
use common::domain::{AnalyticsEventProducer, BacklogRepository, DomainResult};
use common::telemetry::PipelineMetrics;
use ingestion::backlog_record_to_event;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Result of a guarded sweep
#[derive(Debug, Clone, PartialEq)]
pub enum SweepOutcome<T> {
    /// Another run of the same sweep was still in progress
    Skipped,
    Completed(T),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReprocessReport {
    pub fetched: usize,
    pub published: usize,
    pub marked: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetentionReport {
    pub cutoff: DateTime<Utc>,
    pub deleted: u64,
}

/// Reprocessing throughput is capped at `batch_size * max_pages_per_sweep`
/// records per tick of the reprocess loop, 200/s with the defaults and a 5s
/// interval. Every ingested reading lands in the backlog, so a sustained ingest
/// rate above that cap grows the unprocessed backlog, and republishes then fall
/// outside the stream's duplicate window.
#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    /// Records fetched per page
    pub batch_size: usize,
    /// Full pages drained in one sweep before yielding to the next tick
    pub max_pages_per_sweep: usize,
    pub retention_days: i64,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            batch_size: 100,
            max_pages_per_sweep: 10,
            retention_days: 30,
        }
    }
}

/// Republishes unprocessed backlog records and retires old processed ones
pub struct BacklogScheduler {
    backlog: Arc<dyn BacklogRepository>,
    producer: Arc<dyn AnalyticsEventProducer>,
    metrics: PipelineMetrics,
    settings: SchedulerSettings,
    reprocess_flight: SingleFlight,
    retention_flight: SingleFlight,
}

impl BacklogScheduler {
    pub fn new(
        backlog: Arc<dyn BacklogRepository>,
        producer: Arc<dyn AnalyticsEventProducer>,
        metrics: PipelineMetrics,
        settings: SchedulerSettings,
    ) -> Self {
        Self {
            backlog,
            producer,
            metrics,
            settings,
            reprocess_flight: SingleFlight::new(),
            retention_flight: SingleFlight::new(),
        }
    }

    /// Publish the oldest unprocessed records in receive order, page by page.
    ///
    /// Each page is marked processed in one update only when every publish
    /// in it succeeded. Publishing stops at the first failure and that page
    /// stays pending for the next sweep; pages drained before it stay marked.
    /// A short page ends the sweep.
    #[instrument(skip(self), fields(batch_size = self.settings.batch_size))]
    pub async fn reprocess_sweep(&self) -> DomainResult<SweepOutcome<ReprocessReport>> {
        let Some(_guard) = self.reprocess_flight.try_enter() else {
            debug!("reprocessing sweep already running, skipping");
            return Ok(SweepOutcome::Skipped);
        };

        let mut report = ReprocessReport::default();
        for _ in 0..self.settings.max_pages_per_sweep.max(1) {
            let (fetched, marked) = self.reprocess_page().await?;
            report.fetched += fetched;
            report.published += fetched;
            report.marked += marked;
            if fetched < self.settings.batch_size {
                break;
            }
        }

        if report.fetched > 0 {
            info!(fetched = report.fetched, marked = report.marked, "reprocessed backlog records");
        }
        Ok(SweepOutcome::Completed(report))
    }

    async fn reprocess_page(&self) -> DomainResult<(usize, u64)> {
        let records = self.backlog.fetch_unprocessed(self.settings.batch_size).await?;
        if records.is_empty() {
            return Ok((0, 0));
        }

        let fetched = records.len();
        for (published, record) in records.iter().enumerate() {
            let event = backlog_record_to_event(record);
            if let Err(e) = self.producer.publish(&event).await {
                warn!(
                    record_id = %record.id,
                    device_id = %record.device_id,
                    published,
                    fetched,
                    error = %e,
                    "backlog republish failed, leaving page unprocessed"
                );
                return Err(e.into());
            }
        }

        let ids: Vec<String> = records.into_iter().map(|r| r.id).collect();
        let marked = self.backlog.mark_processed(ids).await?;
        self.metrics.record_reprocessed(marked);
        Ok((fetched, marked))
    }

    /// Delete processed records whose reading is older than the retention window
    #[instrument(skip(self), fields(retention_days = self.settings.retention_days))]
    pub async fn retention_sweep(
        &self,
        now: DateTime<Utc>,
    ) -> DomainResult<SweepOutcome<RetentionReport>> {
        let Some(_guard) = self.retention_flight.try_enter() else {
            debug!("retention sweep already running, skipping");
            return Ok(SweepOutcome::Skipped);
        };

        let cutoff = now - Duration::days(self.settings.retention_days);
        let deleted = self.backlog.delete_processed_older_than(cutoff).await?;
        self.metrics.record_deleted(deleted);

        info!(cutoff = %cutoff, deleted, "retention sweep finished");
        Ok(SweepOutcome::Completed(RetentionReport { cutoff, deleted }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::domain::{
        AnalyticsEvent, BacklogRecord, DeviceType, DomainError, MockAnalyticsEventProducer,
        MockBacklogRepository, PublishAck, PublishError, SensorType, SensorValue,
        TelemetryReading,
    };
    use common::memory::InMemoryBacklogRepository;
    use mockall::Sequence;

    fn record(device_id: &str, sensor_id: &str, age: Duration) -> BacklogRecord {
        let reading = TelemetryReading {
            device_id: device_id.to_string(),
            device_type: DeviceType::AccessDoor,
            sensor_id: sensor_id.to_string(),
            sensor_type: SensorType::Contact,
            timestamp: Utc::now() - age,
            value: SensorValue::boolean(true),
        };
        BacklogRecord::from_reading(&reading, Utc::now() - age)
    }

    fn ack() -> PublishAck {
        PublishAck {
            stream: "analytics_events".to_string(),
            sequence: 1,
            duplicate: false,
        }
    }

    fn scheduler(
        backlog: Arc<dyn BacklogRepository>,
        producer: MockAnalyticsEventProducer,
    ) -> BacklogScheduler {
        BacklogScheduler::new(
            backlog,
            Arc::new(producer),
            PipelineMetrics::new(),
            SchedulerSettings::default(),
        )
    }

    #[tokio::test]
    async fn test_reprocess_publishes_in_order_and_marks_all() {
        // Arrange
        let records = vec![
            record("door-1", "c-1", Duration::minutes(3)),
            record("door-1", "c-2", Duration::minutes(2)),
        ];
        let expected_ids: Vec<String> = records.iter().map(|r| r.id.clone()).collect();

        let mut backlog = MockBacklogRepository::new();
        backlog
            .expect_fetch_unprocessed()
            .withf(|limit| *limit == 100)
            .times(1)
            .return_once(move |_| Ok(records));
        backlog
            .expect_mark_processed()
            .withf(move |ids: &Vec<String>| *ids == expected_ids)
            .times(1)
            .returning(|ids| Ok(ids.len() as u64));

        let mut seq = Sequence::new();
        let mut producer = MockAnalyticsEventProducer::new();
        producer
            .expect_publish()
            .withf(|event: &AnalyticsEvent| event.sensor_id == "c-1" && event.unit == "boolean")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(ack()));
        producer
            .expect_publish()
            .withf(|event: &AnalyticsEvent| event.sensor_id == "c-2")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(ack()));

        // Act
        let outcome = scheduler(Arc::new(backlog), producer)
            .reprocess_sweep()
            .await
            .unwrap();

        // Assert
        assert_eq!(
            outcome,
            SweepOutcome::Completed(ReprocessReport {
                fetched: 2,
                published: 2,
                marked: 2,
            })
        );
    }

    #[tokio::test]
    async fn test_reprocess_stops_at_first_failure_and_marks_nothing() {
        // Arrange
        let records = vec![
            record("door-1", "c-1", Duration::minutes(3)),
            record("door-1", "c-2", Duration::minutes(2)),
            record("door-1", "c-3", Duration::minutes(1)),
        ];
        let mut backlog = MockBacklogRepository::new();
        backlog
            .expect_fetch_unprocessed()
            .times(1)
            .return_once(move |_| Ok(records));
        backlog.expect_mark_processed().times(0);

        let mut producer = MockAnalyticsEventProducer::new();
        producer
            .expect_publish()
            .withf(|event: &AnalyticsEvent| event.sensor_id == "c-1")
            .times(1)
            .returning(|_| Ok(ack()));
        producer
            .expect_publish()
            .withf(|event: &AnalyticsEvent| event.sensor_id == "c-2")
            .times(1)
            .returning(|event| {
                Err(PublishError::Timeout {
                    subject: format!("analytics_events.{}", event.device_id),
                    timeout: std::time::Duration::from_secs(5),
                })
            });
        producer
            .expect_publish()
            .withf(|event: &AnalyticsEvent| event.sensor_id == "c-3")
            .times(0);

        // Act
        let result = scheduler(Arc::new(backlog), producer).reprocess_sweep().await;

        // Assert
        assert!(matches!(result, Err(DomainError::Publish(PublishError::Timeout { .. }))));
    }

    #[tokio::test]
    async fn test_reprocess_empty_backlog_is_noop() {
        let mut backlog = MockBacklogRepository::new();
        backlog
            .expect_fetch_unprocessed()
            .times(1)
            .returning(|_| Ok(vec![]));
        backlog.expect_mark_processed().times(0);
        let mut producer = MockAnalyticsEventProducer::new();
        producer.expect_publish().times(0);

        let outcome = scheduler(Arc::new(backlog), producer)
            .reprocess_sweep()
            .await
            .unwrap();

        assert_eq!(outcome, SweepOutcome::Completed(ReprocessReport::default()));
    }

    #[tokio::test]
    async fn test_overlapping_reprocess_is_skipped() {
        // Arrange
        let mut backlog = MockBacklogRepository::new();
        backlog.expect_fetch_unprocessed().times(0);
        let scheduler = scheduler(Arc::new(backlog), MockAnalyticsEventProducer::new());
        let _running = scheduler.reprocess_flight.try_enter().unwrap();

        // Act
        let outcome = scheduler.reprocess_sweep().await.unwrap();

        // Assert
        assert_eq!(outcome, SweepOutcome::Skipped);
    }

    #[tokio::test]
    async fn test_guard_released_after_failed_sweep() {
        let mut backlog = MockBacklogRepository::new();
        backlog
            .expect_fetch_unprocessed()
            .times(2)
            .returning(|_| Err(DomainError::RepositoryError(anyhow::anyhow!("connection reset"))));
        let scheduler = scheduler(Arc::new(backlog), MockAnalyticsEventProducer::new());

        assert!(scheduler.reprocess_sweep().await.is_err());
        assert!(scheduler.reprocess_sweep().await.is_err());
        assert!(!scheduler.reprocess_flight.is_running());
    }

    #[tokio::test]
    async fn test_sweeps_do_not_block_each_other() {
        let mut backlog = MockBacklogRepository::new();
        backlog
            .expect_delete_processed_older_than()
            .times(1)
            .returning(|_| Ok(0));
        let scheduler = scheduler(Arc::new(backlog), MockAnalyticsEventProducer::new());
        let _running = scheduler.reprocess_flight.try_enter().unwrap();

        let outcome = scheduler.retention_sweep(Utc::now()).await.unwrap();

        assert!(matches!(outcome, SweepOutcome::Completed(_)));
    }

    #[tokio::test]
    async fn test_retention_uses_thirty_day_cutoff() {
        let now = Utc::now();
        let expected_cutoff = now - Duration::days(30);
        let mut backlog = MockBacklogRepository::new();
        backlog
            .expect_delete_processed_older_than()
            .withf(move |cutoff| *cutoff == expected_cutoff)
            .times(1)
            .returning(|_| Ok(4));

        let outcome = scheduler(Arc::new(backlog), MockAnalyticsEventProducer::new())
            .retention_sweep(now)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            SweepOutcome::Completed(RetentionReport {
                cutoff: expected_cutoff,
                deleted: 4,
            })
        );
    }

    #[tokio::test]
    async fn test_retention_deletes_old_processed_rows_once() {
        // Arrange
        let backlog = Arc::new(InMemoryBacklogRepository::new());
        let mut old_ids = Vec::new();
        for i in 0..10 {
            let r = record("door-2", &format!("c-{}", i), Duration::days(40));
            old_ids.push(r.id.clone());
            backlog.insert(r).await.unwrap();
        }
        backlog
            .insert(record("door-2", "pending", Duration::days(40)))
            .await
            .unwrap();
        let fresh = record("door-2", "fresh", Duration::days(2));
        old_ids.push(fresh.id.clone());
        backlog.insert(fresh).await.unwrap();
        backlog.mark_processed(old_ids).await.unwrap();

        let scheduler = scheduler(backlog.clone(), MockAnalyticsEventProducer::new());
        let now = Utc::now();

        // Act
        let first = scheduler.retention_sweep(now).await.unwrap();
        let second = scheduler.retention_sweep(now).await.unwrap();

        // Assert
        assert!(matches!(first, SweepOutcome::Completed(RetentionReport { deleted: 10, .. })));
        assert!(matches!(second, SweepOutcome::Completed(RetentionReport { deleted: 0, .. })));
        assert_eq!(backlog.len().await, 2);
    }

    #[tokio::test]
    async fn test_reprocess_marks_in_memory_backlog() {
        // Arrange
        let backlog = Arc::new(InMemoryBacklogRepository::new());
        for i in 0..3 {
            backlog
                .insert(record("door-3", &format!("c-{}", i), Duration::minutes(5 - i)))
                .await
                .unwrap();
        }
        let mut producer = MockAnalyticsEventProducer::new();
        producer.expect_publish().times(3).returning(|_| Ok(ack()));
        let scheduler = scheduler(backlog.clone(), producer);

        // Act
        scheduler.reprocess_sweep().await.unwrap();

        // Assert
        assert!(backlog.fetch_unprocessed(10).await.unwrap().is_empty());
        assert_eq!(backlog.len().await, 3);
    }

    #[tokio::test]
    async fn test_reprocess_drains_full_pages_within_one_sweep() {
        // Arrange
        let backlog = Arc::new(InMemoryBacklogRepository::new());
        for i in 0..25 {
            backlog
                .insert(record("door-4", &format!("c-{:02}", i), Duration::minutes(30 - i)))
                .await
                .unwrap();
        }
        let mut producer = MockAnalyticsEventProducer::new();
        producer.expect_publish().times(25).returning(|_| Ok(ack()));
        let scheduler = BacklogScheduler::new(
            backlog.clone(),
            Arc::new(producer),
            PipelineMetrics::new(),
            SchedulerSettings {
                batch_size: 10,
                max_pages_per_sweep: 5,
                retention_days: 30,
            },
        );

        // Act
        let outcome = scheduler.reprocess_sweep().await.unwrap();

        // Assert
        assert_eq!(
            outcome,
            SweepOutcome::Completed(ReprocessReport {
                fetched: 25,
                published: 25,
                marked: 25,
            })
        );
        assert!(backlog.fetch_unprocessed(100).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reprocess_page_cap_leaves_rest_for_next_tick() {
        // Arrange
        let backlog = Arc::new(InMemoryBacklogRepository::new());
        for i in 0..30 {
            backlog
                .insert(record("door-5", &format!("c-{:02}", i), Duration::minutes(40 - i)))
                .await
                .unwrap();
        }
        let mut producer = MockAnalyticsEventProducer::new();
        producer.expect_publish().times(20).returning(|_| Ok(ack()));
        let scheduler = BacklogScheduler::new(
            backlog.clone(),
            Arc::new(producer),
            PipelineMetrics::new(),
            SchedulerSettings {
                batch_size: 10,
                max_pages_per_sweep: 2,
                retention_days: 30,
            },
        );

        // Act
        scheduler.reprocess_sweep().await.unwrap();

        // Assert
        let pending = backlog.fetch_unprocessed(100).await.unwrap();
        assert_eq!(pending.len(), 10);
        assert_eq!(pending[0].sensor_id, "c-20");
    }
}
