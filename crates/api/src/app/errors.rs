use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use facturo_auth::TokenError;
use facturo_core::DomainError;
use facturo_infra::ServiceError;
use facturo_invoicing::InvoiceStatus;

/// Error returned by handlers; rendered as a JSON body.
#[derive(Debug)]
pub enum ApiError {
    Service(ServiceError),
    /// A path segment that is not a valid identifier.
    InvalidId(&'static str),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl From<ServiceError> for ApiError {
    fn from(value: ServiceError) -> Self {
        ApiError::Service(value)
    }
}

impl From<DomainError> for ApiError {
    fn from(value: DomainError) -> Self {
        ApiError::Service(value.into())
    }
}

impl From<TokenError> for ApiError {
    fn from(value: TokenError) -> Self {
        ApiError::Service(ServiceError::Internal(value.to_string()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Service(err) => service_error_to_response(err),
            ApiError::InvalidId(what) => {
                json_error(StatusCode::BAD_REQUEST, "invalid_id", format!("invalid {what} id"))
            }
        }
    }
}

pub fn service_error_to_response(err: ServiceError) -> Response {
    match err {
        ServiceError::Validation(errors) => validation_error(errors),
        ServiceError::InvalidStatus(raw) => {
            let allowed: Vec<&str> = InvoiceStatus::ALL.iter().map(|s| s.as_str()).collect();
            json_error(
                StatusCode::BAD_REQUEST,
                "invalid_status",
                format!("invalid status {raw:?}; expected one of {}", allowed.join(", ")),
            )
        }
        ServiceError::NotFound(what) => {
            json_error(StatusCode::NOT_FOUND, "not_found", format!("{what} not found"))
        }
        ServiceError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        ServiceError::Unauthorized(msg) => json_error(StatusCode::UNAUTHORIZED, "unauthorized", msg),
        ServiceError::Store(msg) => {
            tracing::error!(error = %msg, "store failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", "storage backend failure")
        }
        ServiceError::Internal(msg) => {
            tracing::error!(error = %msg, "internal failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", "internal server error")
        }
    }
}

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn validation_error(errors: Vec<String>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        axum::Json(json!({
            "error": "validation_error",
            "errors": errors,
        })),
    )
        .into_response()
}

/// Parse a path identifier, naming the resource in the error.
pub fn parse_id<T: core::str::FromStr>(raw: &str, what: &'static str) -> ApiResult<T> {
    raw.parse().map_err(|_| ApiError::InvalidId(what))
}
