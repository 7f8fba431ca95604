//! Feed Routes

use alert_engine::{DisplayState, IngestReport, MonitorState, RawSnapshot};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use super::ApiError;
use crate::AppState;

/// One row of the feed listing
#[derive(Debug, Serialize)]
pub struct FeedSummary {
    pub feed_id: String,
    pub state: MonitorState,
    pub crying: bool,
}

/// Response for feeds endpoint
#[derive(Debug, Serialize)]
pub struct FeedsResponse {
    pub data: Vec<FeedSummary>,
    pub count: usize,
}

/// Response for feed status endpoint
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub feed_id: String,
    pub status: &'static str,
    #[serde(flatten)]
    pub display: DisplayState,
}

/// List known feeds
pub async fn list_feeds(State(state): State<Arc<AppState>>) -> Result<Json<FeedsResponse>, ApiError> {
    let mut data = Vec::new();
    for feed_id in state.hub.feeds()? {
        if let Some(display) = state.hub.display(&feed_id)? {
            data.push(FeedSummary {
                feed_id,
                state: display.state,
                crying: display.crying,
            });
        }
    }

    Ok(Json(FeedsResponse {
        count: data.len(),
        data,
    }))
}

/// Current readings and crying state of a feed
pub async fn get_status(
    State(state): State<Arc<AppState>>,
    Path(feed_id): Path<String>,
) -> Result<Json<StatusResponse>, ApiError> {
    let display = state
        .hub
        .display(&feed_id)?
        .ok_or_else(|| ApiError::UnknownFeed(feed_id.clone()))?;

    Ok(Json(StatusResponse {
        status: display.status_label(),
        feed_id,
        display,
    }))
}

/// Ingest a snapshot pushed by a device
pub async fn post_snapshot(
    State(state): State<Arc<AppState>>,
    Path(feed_id): Path<String>,
    Json(snapshot): Json<RawSnapshot>,
) -> Result<Json<IngestReport>, ApiError> {
    let report = state.hub.ingest(&feed_id, &snapshot)?;
    Ok(Json(report))
}

/// Reset a feed's tracker before its source replays history
pub async fn reset_feed(
    State(state): State<Arc<AppState>>,
    Path(feed_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if state.hub.reset_feed(&feed_id)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::UnknownFeed(feed_id))
    }
}
