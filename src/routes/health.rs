use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::AppState;

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "trackedRequests": state.engine.tracked_requests().await,
        "timestamp": chrono::Utc::now(),
    }))
}
