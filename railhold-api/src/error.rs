use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use railhold_booking::RunError;
use railhold_core::CoreError;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    AuthenticationError(String),
    #[error("{0}")]
    ValidationError(String),
    #[error("{0}")]
    NotFoundError(String),
    #[error("{0}")]
    ConflictError(String),
    #[error("{0}")]
    UpstreamError(String),
    #[error("{0}")]
    InternalServerError(String),
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::AuthenticationError(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFoundError(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::ConflictError(msg) => (StatusCode::CONFLICT, msg),
            AppError::UpstreamError(msg) => {
                tracing::warn!("Rail backend error: {}", msg);
                (StatusCode::BAD_GATEWAY, msg)
            }
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            }
            AppError::Anyhow(err) => {
                tracing::error!("Internal Server Error: {}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<RunError> for AppError {
    fn from(err: RunError) -> Self {
        let msg = err.to_string();
        match err {
            RunError::NoCandidates | RunError::InvalidRequest(_) | RunError::TrainTypeMismatch { .. } => {
                AppError::ValidationError(msg)
            }
            RunError::AlreadyRunning(_) => AppError::ConflictError(msg),
            RunError::NotSignedIn(_) | RunError::AuthenticationFailed(_) => AppError::AuthenticationError(msg),
            RunError::NoActiveRun(_) | RunError::NoActiveAlert(_) => AppError::NotFoundError(msg),
            RunError::Backend(_) => AppError::UpstreamError(msg),
            RunError::Storage(_) => AppError::InternalServerError(msg),
        }
    }
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ValidationError(msg) => AppError::ValidationError(msg),
            other => AppError::InternalServerError(other.to_string()),
        }
    }
}
