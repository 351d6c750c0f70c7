//! JSON envelope shared by every endpoint, and the HTTP mapping of `ShopError`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

use crate::{ErrorCode, FieldErrors, ShopError};

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub status: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<FieldErrors>,
}

pub type ApiResult<T> = Result<T, ShopError>;

pub fn ok<T: Serialize>(message: impl Into<String>, data: T) -> (StatusCode, Json<ApiResponse<T>>) {
    with_status(StatusCode::OK, message, data)
}

pub fn created<T: Serialize>(message: impl Into<String>, data: T) -> (StatusCode, Json<ApiResponse<T>>) {
    with_status(StatusCode::CREATED, message, data)
}

pub fn with_status<T: Serialize>(
    status: StatusCode,
    message: impl Into<String>,
    data: T,
) -> (StatusCode, Json<ApiResponse<T>>) {
    let body = ApiResponse { status: "success", message: message.into(), data: Some(data), code: None, errors: None };
    (status, Json(body))
}

impl ShopError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::PermissionDenied(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) | Self::InvalidState(_) => StatusCode::CONFLICT,
            Self::Storage(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ShopError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();
        let message = match &self {
            Self::Storage(e) => {
                error!(error = ?e, "storage failure");
                "Internal server error".to_string()
            }
            Self::Internal(detail) => {
                error!(detail = %detail, "internal failure");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        let errors = match self {
            Self::Validation { fields, .. } if !fields.is_empty() => Some(fields),
            _ => None,
        };
        let body = ApiResponse::<()> { status: "error", message, data: None, code: Some(code), errors };
        (status, Json(body)).into_response()
    }
}
