use axum::{
    extract::rejection::QueryRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    /// The card API failed on a path with no fallback; `public` is shown to the caller
    #[error("{public}")]
    Upstream { public: String, detail: String },

    /// Anything unexpected; the detail is logged, never returned
    #[error("Internal server error")]
    Internal(String),
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

#[derive(Serialize)]
struct ErrorEnvelope {
    success: bool,
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Upstream { detail, .. } => {
                error!(%detail, "Upstream failure");
                StatusCode::BAD_GATEWAY
            }
            ApiError::Internal(detail) => {
                error!(%detail, "Internal error");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = ErrorEnvelope {
            success: false,
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
