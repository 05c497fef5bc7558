use crate::domain::{
    BacklogRecord, BacklogRepository, DeviceType, DomainError, DomainResult, MetricStats,
    MetricStatsInput, ReadingsInRangeInput, SensorType, SensorValue,
};
use crate::postgres::PostgresClient;
use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_postgres::Row;
use tracing::{debug, instrument};

const SELECT_COLUMNS: &str = "id, device_id, device_type, sensor_id, sensor_type, metric_name, \
     metric_value, unit, value, timestamp, received_at, processed";

/// Backlog row as stored in PostgreSQL
#[derive(Debug, Clone)]
pub struct BacklogRecordRow {
    pub id: String,
    pub device_id: String,
    pub device_type: String,
    pub sensor_id: String,
    pub sensor_type: String,
    pub metric_name: String,
    pub metric_value: f64,
    pub unit: String,
    pub value: serde_json::Value,
    pub timestamp: DateTime<Utc>,
    pub received_at: DateTime<Utc>,
    pub processed: bool,
}

impl From<Row> for BacklogRecordRow {
    fn from(row: Row) -> Self {
        Self {
            id: row.get(0),
            device_id: row.get(1),
            device_type: row.get(2),
            sensor_id: row.get(3),
            sensor_type: row.get(4),
            metric_name: row.get(5),
            metric_value: row.get(6),
            unit: row.get(7),
            value: row.get(8),
            timestamp: row.get(9),
            received_at: row.get(10),
            processed: row.get(11),
        }
    }
}

impl BacklogRecordRow {
    fn into_domain(self) -> Result<BacklogRecord, DomainError> {
        let value: SensorValue = serde_json::from_value(self.value).map_err(|e| {
            DomainError::RepositoryError(anyhow!("Failed to deserialize value of {}: {}", self.id, e))
        })?;
        let device_type = self
            .device_type
            .parse::<DeviceType>()
            .map_err(|e| DomainError::RepositoryError(anyhow!("{}", e)))?;
        let sensor_type = self
            .sensor_type
            .parse::<SensorType>()
            .map_err(|e| DomainError::RepositoryError(anyhow!("{}", e)))?;

        Ok(BacklogRecord {
            id: self.id,
            device_id: self.device_id,
            device_type,
            sensor_id: self.sensor_id,
            sensor_type,
            metric_name: self.metric_name,
            metric_value: self.metric_value,
            unit: self.unit,
            value,
            timestamp: self.timestamp,
            received_at: self.received_at,
            processed: self.processed,
        })
    }
}

fn rows_into_records(rows: Vec<Row>) -> DomainResult<Vec<BacklogRecord>> {
    rows.into_iter()
        .map(|row| BacklogRecordRow::from(row).into_domain())
        .collect()
}

/// PostgreSQL implementation of BacklogRepository trait
#[derive(Clone)]
pub struct PostgresBacklogRepository {
    client: PostgresClient,
}

impl PostgresBacklogRepository {
    pub fn new(client: PostgresClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl BacklogRepository for PostgresBacklogRepository {
    #[instrument(skip(self, record), fields(id = %record.id, device_id = %record.device_id, sensor_id = %record.sensor_id))]
    async fn insert(&self, record: BacklogRecord) -> DomainResult<()> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let value = serde_json::to_value(&record.value)
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        conn.execute(
            "INSERT INTO telemetry_backlog (id, device_id, device_type, sensor_id, sensor_type, metric_name, metric_value, unit, value, timestamp, received_at, processed)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
            &[
                &record.id,
                &record.device_id,
                &record.device_type.name(),
                &record.sensor_id,
                &record.sensor_type.name(),
                &record.metric_name,
                &record.metric_value,
                &record.unit,
                &value,
                &record.timestamp,
                &record.received_at,
                &record.processed,
            ],
        )
        .await
        .map_err(|e| DomainError::RepositoryError(e.into()))?;

        debug!("stored backlog record: {}", record.id);
        Ok(())
    }

    #[instrument(skip(self))]
    async fn fetch_unprocessed(&self, limit: usize) -> DomainResult<Vec<BacklogRecord>> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let query = format!(
            "SELECT {} FROM telemetry_backlog
             WHERE processed = FALSE
             ORDER BY received_at ASC, id ASC
             LIMIT $1",
            SELECT_COLUMNS
        );
        let rows = conn
            .query(query.as_str(), &[&(limit as i64)])
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        rows_into_records(rows)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()))]
    async fn mark_processed(&self, ids: Vec<String>) -> DomainResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let mut conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let tx = conn
            .transaction()
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        let updated = tx
            .execute(
                "UPDATE telemetry_backlog SET processed = TRUE
                 WHERE id = ANY($1) AND processed = FALSE",
                &[&ids],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        tx.commit()
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        debug!(updated, "marked backlog records processed");
        Ok(updated)
    }

    #[instrument(skip(self), fields(cutoff = %cutoff))]
    async fn delete_processed_older_than(&self, cutoff: DateTime<Utc>) -> DomainResult<u64> {
        let mut conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let tx = conn
            .transaction()
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        let deleted = tx
            .execute(
                "DELETE FROM telemetry_backlog WHERE processed = TRUE AND timestamp < $1",
                &[&cutoff],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        tx.commit()
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        debug!(deleted, "deleted processed backlog records");
        Ok(deleted)
    }

    #[instrument(skip(self, input), fields(device_id = %input.device_id))]
    async fn list_in_range(&self, input: ReadingsInRangeInput) -> DomainResult<Vec<BacklogRecord>> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let query = format!(
            "SELECT {} FROM telemetry_backlog
             WHERE device_id = $1 AND timestamp BETWEEN $2 AND $3
             ORDER BY timestamp ASC
             LIMIT $4",
            SELECT_COLUMNS
        );
        let rows = conn
            .query(
                query.as_str(),
                &[
                    &input.device_id,
                    &input.start,
                    &input.end,
                    &(input.limit as i64),
                ],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        rows_into_records(rows)
    }

    #[instrument(skip(self))]
    async fn list_metric_names(&self, device_id: &str) -> DomainResult<Vec<String>> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let rows = conn
            .query(
                "SELECT DISTINCT metric_name FROM telemetry_backlog
                 WHERE device_id = $1
                 ORDER BY metric_name",
                &[&device_id],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        Ok(rows.iter().map(|row| row.get(0)).collect())
    }

    #[instrument(skip(self, input), fields(device_id = %input.device_id, metric_name = %input.metric_name))]
    async fn metric_stats(&self, input: MetricStatsInput) -> DomainResult<MetricStats> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let row = conn
            .query_one(
                "SELECT COUNT(*), AVG(metric_value), MAX(metric_value), MIN(metric_value)
                 FROM telemetry_backlog
                 WHERE device_id = $1 AND metric_name = $2 AND timestamp BETWEEN $3 AND $4",
                &[&input.device_id, &input.metric_name, &input.start, &input.end],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        Ok(MetricStats {
            device_id: input.device_id,
            metric_name: input.metric_name,
            start: input.start,
            end: input.end,
            count: row.get(0),
            average: row.get(1),
            max: row.get(2),
            min: row.get(3),
        })
    }

    #[instrument(skip(self))]
    async fn count_by_device(&self, device_id: &str) -> DomainResult<i64> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let row = conn
            .query_one(
                "SELECT COUNT(*) FROM telemetry_backlog WHERE device_id = $1",
                &[&device_id],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        Ok(row.get(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(value: serde_json::Value, sensor_type: &str) -> BacklogRecordRow {
        BacklogRecordRow {
            id: "cq0k3s2m1p0a1b2c3d4e".to_string(),
            device_id: "conv-2".to_string(),
            device_type: "conveyor".to_string(),
            sensor_id: "prox-1".to_string(),
            sensor_type: sensor_type.to_string(),
            metric_name: sensor_type.to_string(),
            metric_value: 1.0,
            unit: "boolean".to_string(),
            value,
            timestamp: Utc::now(),
            received_at: Utc::now(),
            processed: false,
        }
    }

    #[test]
    fn test_row_into_domain() {
        let record = row(serde_json::json!({"@type": "boolean", "state": true}), "proximity")
            .into_domain()
            .unwrap();

        assert_eq!(record.device_type, DeviceType::Conveyor);
        assert_eq!(record.sensor_type, SensorType::Proximity);
        assert_eq!(record.value, SensorValue::boolean(true));
    }

    #[test]
    fn test_row_with_corrupt_value_is_repository_error() {
        let result = row(serde_json::json!({"state": true}), "proximity").into_domain();
        assert!(matches!(result, Err(DomainError::RepositoryError(_))));
    }

    #[test]
    fn test_row_with_unknown_sensor_type_is_repository_error() {
        let result = row(serde_json::json!({"@type": "boolean", "state": true}), "sonar").into_domain();
        assert!(matches!(result, Err(DomainError::RepositoryError(_))));
    }
}
