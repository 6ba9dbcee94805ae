use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

/// Everything a handler can fail with. The caller always sees a single
/// `{"error": "..."}` JSON body; upstream response bodies and the TMDB
/// credential never appear in it.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    InvalidRequest(String),
    #[error("{0} not configured")]
    Configuration(&'static str),
    #[error("TMDB API error: {status}")]
    Upstream { status: u16 },
    #[error("Invalid or missing bearer token")]
    Unauthorized,
    #[error("Internal error")]
    Internal(#[from] anyhow::Error),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl From<sqlx::Error> for ApiError {
    fn from(e: sqlx::Error) -> Self {
        ApiError::Internal(e.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // The full chain stays in the logs; the response carries the
        // display message only.
        if let ApiError::Internal(ref e) = self {
            error!("request failed: {:?}", e);
        }
        let status = match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            _ => StatusCode::BAD_REQUEST,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
