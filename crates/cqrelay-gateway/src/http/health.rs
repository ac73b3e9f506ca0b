use axum::{extract::State, Json};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::app::AppState;

/// GET /health: liveness check, returns relay metadata.
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "provider": state.agent.provider().name(),
        "users_with_history": state.history.user_count(),
        "queue_capacity": state.queue.capacity(),
    }))
}
