use crate::http::ErrorResponse;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use common::domain::DomainError;
use tracing::{error, warn};

const GENERIC_MESSAGE: &str = "An unexpected error occurred";

/// HTTP error carrying an [`ErrorResponse`] body
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub error: &'static str,
    pub message: String,
    pub details: Vec<String>,
}

impl ApiError {
    pub fn bad_request(error: &'static str, message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error,
            message: message.into(),
            details: Vec::new(),
        }
    }

    pub fn internal() -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            error: "Internal Server Error",
            message: GENERIC_MESSAGE.to_string(),
            details: Vec::new(),
        }
    }

    pub fn with_details(mut self, details: Vec<String>) -> Self {
        self.details = details;
        self
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(e) => {
                ApiError::bad_request("Validation Failed", e.to_string())
                    .with_details(vec![e.reason().to_string()])
            }
            DomainError::InvalidBatchSize { .. } | DomainError::InvalidTimeRange { .. } => {
                ApiError::bad_request("Bad Request", err.to_string())
            }
            DomainError::Publish(e) => {
                error!(error = %e, "publish failed");
                Self {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    error: "Publish Failed",
                    message: e.to_string(),
                    details: Vec::new(),
                }
            }
            DomainError::RepositoryError(e) => {
                error!(error = ?e, "repository error");
                ApiError::internal()
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        warn!(error = %rejection.body_text(), "invalid request body");
        ApiError::bad_request("Invalid Request Body", rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        warn!(error = %rejection.body_text(), "invalid query parameters");
        ApiError::bad_request("Bad Request", rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            status: self.status.as_u16(),
            error: self.error.to_string(),
            message: self.message,
            timestamp: Utc::now(),
            details: self.details,
        };
        (self.status, Json(body)).into_response()
    }
}
