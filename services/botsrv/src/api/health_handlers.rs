//! Liveness endpoints

use axum::response::Json;
use serde_json::{json, Value};

/// @route GET /health
pub async fn health_check() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

/// @route GET /uptime-ping
pub async fn uptime_ping() -> Json<Value> {
    Json(json!({"status": "alive"}))
}
