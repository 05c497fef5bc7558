use crate::http::{
    ApiError, BatchRequest, DeviceCountResponse, DeviceMetricsResponse, HttpState,
    MetricStatsParams, TelemetryResponse, TimeRangeParams,
};
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use common::domain::{
    BacklogRecord, BatchResult, BatchStatus, DomainError, MetricStats, TelemetryReading,
};
use tracing::{debug, error};

pub async fn ingest_telemetry(
    State(state): State<HttpState>,
    payload: Result<Json<TelemetryReading>, JsonRejection>,
) -> Result<(StatusCode, Json<TelemetryResponse>), ApiError> {
    let Json(reading) = payload?;
    debug!(
        device_id = %reading.device_id,
        sensor_id = %reading.sensor_id,
        sensor_type = %reading.sensor_type,
        "received telemetry"
    );

    let device_id = reading.device_id.clone();
    let sensor_id = reading.sensor_id.clone();

    match state.telemetry.ingest(reading).await {
        Ok(receipt) => Ok((
            StatusCode::ACCEPTED,
            Json(TelemetryResponse::accepted(
                receipt.device_id,
                receipt.sensor_id,
                receipt.received_at,
            )),
        )),
        Err(DomainError::Validation(e)) => Ok((
            StatusCode::BAD_REQUEST,
            Json(TelemetryResponse::failed(
                device_id,
                sensor_id,
                e.to_string(),
                Some(e.reason()),
            )),
        )),
        Err(DomainError::Publish(e)) => {
            error!(device_id = %device_id, sensor_id = %sensor_id, error = %e, "failed to publish telemetry");
            Ok((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(TelemetryResponse::failed(
                    device_id,
                    sensor_id,
                    format!("Failed to publish: {}", e),
                    None,
                )),
            ))
        }
        Err(other) => Err(other.into()),
    }
}

pub async fn ingest_batch(
    State(state): State<HttpState>,
    payload: Result<Json<BatchRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<BatchResult>), ApiError> {
    let Json(request) = payload?;
    debug!(count = request.readings.len(), "received telemetry batch");

    let result = state.telemetry.process_batch(request.readings).await?;
    let status = match result.status {
        BatchStatus::Ok => StatusCode::ACCEPTED,
        BatchStatus::Partial => StatusCode::MULTI_STATUS,
        BatchStatus::Error => StatusCode::BAD_REQUEST,
    };

    Ok((status, Json(result)))
}

pub async fn health() -> &'static str {
    "OK"
}

pub async fn device_readings(
    State(state): State<HttpState>,
    Path(device_id): Path<String>,
    params: Result<Query<TimeRangeParams>, QueryRejection>,
) -> Result<Json<Vec<BacklogRecord>>, ApiError> {
    let Query(params) = params?;
    let readings = state
        .queries
        .readings_in_range(&device_id, params.start, params.end)
        .await?;
    Ok(Json(readings))
}

pub async fn device_metrics(
    State(state): State<HttpState>,
    Path(device_id): Path<String>,
) -> Result<Json<DeviceMetricsResponse>, ApiError> {
    let metrics = state.queries.metric_names(&device_id).await?;
    Ok(Json(DeviceMetricsResponse { device_id, metrics }))
}

pub async fn device_stats(
    State(state): State<HttpState>,
    Path(device_id): Path<String>,
    params: Result<Query<MetricStatsParams>, QueryRejection>,
) -> Result<Json<MetricStats>, ApiError> {
    let Query(params) = params?;
    let stats = state
        .queries
        .metric_stats(&device_id, &params.metric, params.start, params.end)
        .await?;
    Ok(Json(stats))
}

pub async fn device_count(
    State(state): State<HttpState>,
    Path(device_id): Path<String>,
) -> Result<Json<DeviceCountResponse>, ApiError> {
    let count = state.queries.count_by_device(&device_id).await?;
    Ok(Json(DeviceCountResponse { device_id, count }))
}

/// Prometheus text exposition, 404 when no recorder is installed
pub async fn render_metrics(State(state): State<HttpState>) -> Response {
    match &state.metrics_handle {
        Some(handle) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
