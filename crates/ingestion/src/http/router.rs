use crate::domain::{TelemetryQueryService, TelemetryService};
use crate::http::{
    device_count, device_metrics, device_readings, device_stats, health, ingest_batch,
    ingest_telemetry, render_metrics, RequestLoggingLayer,
};
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

/// Shared handler state
#[derive(Clone)]
pub struct HttpState {
    pub telemetry: Arc<TelemetryService>,
    pub queries: Arc<TelemetryQueryService>,
    pub metrics_handle: Option<PrometheusHandle>,
}

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/telemetry", post(ingest_telemetry))
        .route("/telemetry/batch", post(ingest_batch))
        .route("/telemetry/health", get(health))
        .route("/telemetry/devices/{device_id}/readings", get(device_readings))
        .route("/telemetry/devices/{device_id}/metrics", get(device_metrics))
        .route("/telemetry/devices/{device_id}/stats", get(device_stats))
        .route("/telemetry/devices/{device_id}/count", get(device_count))
        .route("/metrics", get(render_metrics))
        .layer(RequestLoggingLayer::default())
        .with_state(state)
}
