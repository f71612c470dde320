use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use models::HttpErrorInfo;
use service::ServiceError;
use thiserror::Error;
use tracing::warn;

/// Generic message returned for backend failures the taxonomy cannot name.
pub const UNEXPECTED_BACKEND: &str = "Unexpected backend error";

/// Error response in the `{status, message, path}` envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonApiError {
    pub status: StatusCode,
    pub message: String,
    pub path: String,
}

impl JsonApiError {
    pub fn new(status: StatusCode, message: impl Into<String>, path: impl Into<String>) -> Self {
        Self { status, message: message.into(), path: path.into() }
    }

    /// Non-integer path id.
    pub fn type_mismatch(path: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, service::errors::TYPE_MISMATCH, path)
    }

    pub fn from_service(err: ServiceError, path: impl Into<String>) -> Self {
        let path = path.into();
        let status = status_for(&err);
        match err {
            ServiceError::UnexpectedBackend { status: backend_status, message } => {
                warn!(backend_status, detail = %message, path = %path, "unexpected backend error");
                Self::new(status, UNEXPECTED_BACKEND, path)
            }
            ServiceError::InvalidInput(message)
            | ServiceError::NotFound(message)
            | ServiceError::Unavailable(message) => Self::new(status, message, path),
        }
    }

    pub fn info(&self) -> HttpErrorInfo {
        HttpErrorInfo::new(self.status.as_u16(), self.message.clone(), self.path.clone())
    }
}

/// HTTP status for each error kind.
pub fn status_for(err: &ServiceError) -> StatusCode {
    match err {
        e if e.is_type_mismatch() => StatusCode::BAD_REQUEST,
        ServiceError::InvalidInput(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
        ServiceError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        ServiceError::UnexpectedBackend { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for JsonApiError {
    fn into_response(self) -> Response {
        let status = self.status;
        (status, Json(self.info())).into_response()
    }
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    Any(#[from] anyhow::Error),
}
