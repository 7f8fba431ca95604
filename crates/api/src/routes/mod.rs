//! API Routes

pub mod alerts;
pub mod feeds;

use alert_engine::HubError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Errors returned by handlers
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unknown feed: {0}")]
    UnknownFeed(String),

    #[error(transparent)]
    Hub(#[from] HubError),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::UnknownFeed(_) => StatusCode::NOT_FOUND,
            ApiError::Hub(HubError::Validation(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Hub(HubError::LockPoisoned(_)) => {
                error!("Request failed: {}", self);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (
            status,
            Json(ErrorBody {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}
