use axum::{routing::get, Router};
use std::sync::Arc;

use crate::storage::VisitorStore;

use super::handlers::{active_visitors, health_check, ApiState};

pub fn create_api_router(store: Arc<dyn VisitorStore>) -> Router {
    let state = Arc::new(ApiState { store });

    Router::new()
        .route("/health", get(health_check))
        .route("/api/visitors/active", get(active_visitors))
        .with_state(state)
}
