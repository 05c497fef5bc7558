use chrono::{DateTime, Utc};
use common::domain::{
    BacklogRecord, BacklogRepository, DomainError, DomainResult, MetricStats, MetricStatsInput,
    ReadingsInRangeInput,
};
use std::sync::Arc;
use tracing::instrument;

/// Maximum rows returned by a single range query
pub const MAX_RANGE_READINGS: usize = 1000;

/// Read-side queries over the ingestion backlog
pub struct TelemetryQueryService {
    backlog: Arc<dyn BacklogRepository>,
}

impl TelemetryQueryService {
    pub fn new(backlog: Arc<dyn BacklogRepository>) -> Self {
        Self { backlog }
    }

    #[instrument(skip(self))]
    pub async fn readings_in_range(
        &self,
        device_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> DomainResult<Vec<BacklogRecord>> {
        check_range(start, end)?;
        self.backlog
            .list_in_range(ReadingsInRangeInput {
                device_id: device_id.to_string(),
                start,
                end,
                limit: MAX_RANGE_READINGS,
            })
            .await
    }

    #[instrument(skip(self))]
    pub async fn metric_names(&self, device_id: &str) -> DomainResult<Vec<String>> {
        self.backlog.list_metric_names(device_id).await
    }

    #[instrument(skip(self))]
    pub async fn metric_stats(
        &self,
        device_id: &str,
        metric_name: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> DomainResult<MetricStats> {
        check_range(start, end)?;
        self.backlog
            .metric_stats(MetricStatsInput {
                device_id: device_id.to_string(),
                metric_name: metric_name.to_string(),
                start,
                end,
            })
            .await
    }

    #[instrument(skip(self))]
    pub async fn count_by_device(&self, device_id: &str) -> DomainResult<i64> {
        self.backlog.count_by_device(device_id).await
    }
}

fn check_range(start: DateTime<Utc>, end: DateTime<Utc>) -> DomainResult<()> {
    if start > end {
        return Err(DomainError::InvalidTimeRange { start, end });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use common::domain::MockBacklogRepository;

    #[tokio::test]
    async fn test_range_query_is_capped() {
        // Arrange
        let mut backlog = MockBacklogRepository::new();
        backlog
            .expect_list_in_range()
            .withf(|input: &ReadingsInRangeInput| {
                input.device_id == "cnc-01" && input.limit == MAX_RANGE_READINGS
            })
            .times(1)
            .returning(|_| Ok(vec![]));
        let service = TelemetryQueryService::new(Arc::new(backlog));
        let end = Utc::now();

        // Act
        let result = service
            .readings_in_range("cnc-01", end - Duration::hours(1), end)
            .await;

        // Assert
        assert!(result.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_inverted_range_rejected_before_query() {
        // Arrange
        let mut backlog = MockBacklogRepository::new();
        backlog.expect_metric_stats().times(0);
        let service = TelemetryQueryService::new(Arc::new(backlog));
        let start = Utc::now();

        // Act
        let result = service
            .metric_stats("cnc-01", "temperature", start, start - Duration::minutes(1))
            .await;

        // Assert
        assert!(matches!(result, Err(DomainError::InvalidTimeRange { .. })));
    }

    #[tokio::test]
    async fn test_count_delegates() {
        let mut backlog = MockBacklogRepository::new();
        backlog
            .expect_count_by_device()
            .withf(|device_id: &str| device_id == "hvac-1")
            .times(1)
            .returning(|_| Ok(7));
        let service = TelemetryQueryService::new(Arc::new(backlog));

        assert_eq!(service.count_by_device("hvac-1").await.unwrap(), 7);
    }
}
