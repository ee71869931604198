//! Auto-refresh control handlers.

use axum::{extract::State, Json};

use crate::error::AppResult;
use crate::scheduler::SchedulerStatus;
use crate::state::AppState;

/// `GET /api/refresh/status`
pub async fn status(State(state): State<AppState>) -> Json<SchedulerStatus> {
    Json(state.scheduler.status())
}

/// `POST /api/refresh/start`
pub async fn start(State(state): State<AppState>) -> AppResult<Json<SchedulerStatus>> {
    state.scheduler.start()?;
    Ok(Json(state.scheduler.status()))
}

/// `POST /api/refresh/stop`
pub async fn stop(State(state): State<AppState>) -> Json<SchedulerStatus> {
    state.scheduler.stop();
    Json(state.scheduler.status())
}

/// `POST /api/refresh/reset`
pub async fn reset(State(state): State<AppState>) -> AppResult<Json<SchedulerStatus>> {
    state.scheduler.reset()?;
    Ok(Json(state.scheduler.status()))
}
