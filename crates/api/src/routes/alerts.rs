//! Alert Routes

use alert_engine::{DeliveredAlert, DeliveryStatus};
use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::ApiError;
use crate::AppState;

/// Query parameters for alerts endpoint
#[derive(Debug, Deserialize)]
pub struct AlertQuery {
    /// Filter by feed
    pub feed: Option<String>,
    /// Maximum number of records
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    50
}

/// Response for alerts endpoint
#[derive(Debug, Serialize)]
pub struct AlertResponse {
    pub data: Vec<DeliveredAlert>,
    pub count: usize,
    pub failed_count: usize,
}

/// Get recently raised alerts, newest first
pub async fn get_alerts(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AlertQuery>,
) -> Result<Json<AlertResponse>, ApiError> {
    let limit = params.limit.min(256);
    let data: Vec<DeliveredAlert> = state
        .hub
        .recent_alerts(usize::MAX)?
        .into_iter()
        .filter(|alert| {
            params
                .feed
                .as_deref()
                .map_or(true, |feed| alert.directive.feed_id == feed)
        })
        .take(limit)
        .collect();

    let failed_count = data
        .iter()
        .filter(|alert| matches!(alert.delivery, DeliveryStatus::Failed(_)))
        .count();

    Ok(Json(AlertResponse {
        count: data.len(),
        failed_count,
        data,
    }))
}
