use std::sync::Arc;

use axum::{extract::State, response::Json};

use crate::app_state::AppState;
use crate::error::{BotError, Result};
use crate::stuckup::MonitorStatus;

/// Monitor status snapshot
///
/// @route GET /api/v1/stuckup/status
pub async fn stuckup_status(State(state): State<Arc<AppState>>) -> Result<Json<MonitorStatus>> {
    let monitor = state
        .monitor
        .as_ref()
        .ok_or_else(|| BotError::Internal("stuckup monitor is not available".to_string()))?;
    Ok(Json(monitor.status().await))
}
