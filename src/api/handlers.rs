use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::models::Visitor;
use crate::storage::VisitorStore;

pub struct ApiState {
    pub store: Arc<dyn VisitorStore>,
}

#[derive(Debug, Deserialize)]
pub struct ActiveVisitorsQuery {
    /// Activity window in minutes (default 10)
    pub minutes: Option<i64>,
}

#[derive(Serialize)]
struct ActiveVisitorsResponse {
    count: usize,
    visitors: Vec<Visitor>,
}

/// Visitors seen within the last `minutes` minutes, most recent first.
pub async fn active_visitors(
    State(state): State<Arc<ApiState>>,
    Query(query): Query<ActiveVisitorsQuery>,
) -> impl IntoResponse {
    let minutes = query.minutes.unwrap_or(10).max(0);
    let since = chrono::Utc::now().timestamp() - minutes * 60;

    match state.store.find_active_since(since).await {
        Ok(visitors) => Json(ActiveVisitorsResponse {
            count: visitors.len(),
            visitors,
        })
        .into_response(),
        Err(err) => {
            tracing::warn!(error = %err, "active visitors query failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
        }
    }
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    #[derive(Serialize)]
    struct HealthResponse {
        status: String,
    }

    Json(HealthResponse {
        status: "OK".to_string(),
    })
}
