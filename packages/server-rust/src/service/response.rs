//! JSON responses and the service error boundary.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::Value;
use tracing::{error, warn};

use super::domain::subset::INVALID_MAP;
use super::operation::{ClassifyError, OperationError};
use crate::storage::ProjectError;

pub const BAD_REQUEST_CODE: &str = "Bad request error";
pub const INTERNAL_ERROR_CODE: &str = "Internal server error";
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal 'lizmap' service error";

/// Writes `body` as `application/json` with the given status.
#[must_use]
pub fn write_json_response(body: &Value, status: StatusCode) -> Response {
    let mut response = (status, body.to_string()).into_response();
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    response
}

/// Error answered to the client as `{"code": ..., "message": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{code}: {message}")]
pub struct ServiceError {
    pub status: u16,
    pub code: &'static str,
    pub message: String,
}

impl ServiceError {
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST.as_u16(),
            code: BAD_REQUEST_CODE,
            message: message.into(),
        }
    }

    /// Generic 500; details stay in the logs.
    #[must_use]
    pub fn internal() -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
            code: INTERNAL_ERROR_CODE,
            message: INTERNAL_ERROR_MESSAGE.to_string(),
        }
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    #[must_use]
    pub fn to_json(&self) -> Value {
        serde_json::json!({ "code": self.code, "message": self.message })
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        write_json_response(&self.to_json(), self.status())
    }
}

impl From<ClassifyError> for ServiceError {
    fn from(e: ClassifyError) -> Self {
        Self::bad_request(e.to_string())
    }
}

impl From<OperationError> for ServiceError {
    fn from(e: OperationError) -> Self {
        match e {
            OperationError::BadRequest { message } => Self::bad_request(message),
            other => {
                error!(error = %other, "LIZMAP operation failed");
                Self::internal()
            }
        }
    }
}

/// A `MAP` the client got wrong is a bad request; anything else is an
/// internal failure.
impl From<ProjectError> for OperationError {
    fn from(e: ProjectError) -> Self {
        if e.is_client_error() {
            warn!(error = %e, "project not loaded");
            Self::bad_request(INVALID_MAP)
        } else {
            Self::Internal(anyhow::Error::new(e).context("project loading failed"))
        }
    }
}

impl From<ProjectError> for ServiceError {
    fn from(e: ProjectError) -> Self {
        OperationError::from(e).into()
    }
}
