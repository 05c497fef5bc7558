use crate::domain::{
    BacklogRecord, BacklogRepository, DomainResult, MetricStats, MetricStatsInput,
    ReadingsInRangeInput,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

/// Process-local backlog used when no database is configured.
///
/// Records are kept in insertion order, which matches receive order for a
/// single process.
#[derive(Default)]
pub struct InMemoryBacklogRepository {
    records: RwLock<Vec<BacklogRecord>>,
}

impl InMemoryBacklogRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl BacklogRepository for InMemoryBacklogRepository {
    #[instrument(skip(self, record), fields(id = %record.id, device_id = %record.device_id))]
    async fn insert(&self, record: BacklogRecord) -> DomainResult<()> {
        self.records.write().await.push(record);
        Ok(())
    }

    async fn fetch_unprocessed(&self, limit: usize) -> DomainResult<Vec<BacklogRecord>> {
        let records = self.records.read().await;
        let mut pending: Vec<BacklogRecord> =
            records.iter().filter(|r| !r.processed).cloned().collect();
        // stable sort keeps insertion order for equal receive times
        pending.sort_by_key(|r| r.received_at);
        pending.truncate(limit);
        Ok(pending)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()))]
    async fn mark_processed(&self, ids: Vec<String>) -> DomainResult<u64> {
        let ids: HashSet<String> = ids.into_iter().collect();
        let mut records = self.records.write().await;
        let mut updated = 0;
        for record in records.iter_mut() {
            if !record.processed && ids.contains(&record.id) {
                record.processed = true;
                updated += 1;
            }
        }
        debug!(updated, "marked backlog records processed");
        Ok(updated)
    }

    #[instrument(skip(self), fields(cutoff = %cutoff))]
    async fn delete_processed_older_than(&self, cutoff: DateTime<Utc>) -> DomainResult<u64> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|r| !(r.processed && r.timestamp < cutoff));
        Ok((before - records.len()) as u64)
    }

    async fn list_in_range(&self, input: ReadingsInRangeInput) -> DomainResult<Vec<BacklogRecord>> {
        let records = self.records.read().await;
        let mut matching: Vec<BacklogRecord> = records
            .iter()
            .filter(|r| {
                r.device_id == input.device_id
                    && r.timestamp >= input.start
                    && r.timestamp <= input.end
            })
            .cloned()
            .collect();
        matching.sort_by_key(|r| r.timestamp);
        matching.truncate(input.limit);
        Ok(matching)
    }

    async fn list_metric_names(&self, device_id: &str) -> DomainResult<Vec<String>> {
        let records = self.records.read().await;
        let mut names: Vec<String> = records
            .iter()
            .filter(|r| r.device_id == device_id)
            .map(|r| r.metric_name.clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        names.sort();
        Ok(names)
    }

    async fn metric_stats(&self, input: MetricStatsInput) -> DomainResult<MetricStats> {
        let records = self.records.read().await;
        let values: Vec<f64> = records
            .iter()
            .filter(|r| {
                r.device_id == input.device_id
                    && r.metric_name == input.metric_name
                    && r.timestamp >= input.start
                    && r.timestamp <= input.end
            })
            .map(|r| r.metric_value)
            .collect();

        let count = values.len() as i64;
        let (average, max, min) = if values.is_empty() {
            (None, None, None)
        } else {
            let sum: f64 = values.iter().sum();
            (
                Some(sum / values.len() as f64),
                values.iter().copied().reduce(f64::max),
                values.iter().copied().reduce(f64::min),
            )
        };

        Ok(MetricStats {
            device_id: input.device_id,
            metric_name: input.metric_name,
            start: input.start,
            end: input.end,
            count,
            average,
            max,
            min,
        })
    }

    async fn count_by_device(&self, device_id: &str) -> DomainResult<i64> {
        let records = self.records.read().await;
        Ok(records.iter().filter(|r| r.device_id == device_id).count() as i64)
    }
}
