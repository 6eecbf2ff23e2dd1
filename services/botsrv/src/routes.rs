//! HTTP route table

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::api::callback_handlers::seatalk_callback;
use crate::api::health_handlers::{health_check, uptime_ping};
use crate::api::stuckup_handlers::stuckup_status;
use crate::app_state::AppState;

pub fn create_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/uptime-ping", get(uptime_ping))
        .route("/callbacks/seatalk", post(seatalk_callback))
        .route("/api/v1/stuckup/status", get(stuckup_status))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
