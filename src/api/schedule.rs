use axum::{extract::State, Json};
use std::sync::Arc;

use super::ApiError;
use crate::models::Schedule;
use crate::AppState;

/// GET /cached-schedule
/// Fresh cache, else the shared build. A failed build is a 500.
pub(super) async fn get_cached_schedule(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Arc<Schedule>>, ApiError> {
    let schedule = state.schedule.get().await.map_err(|e| {
        tracing::warn!("Serving 500 for /cached-schedule: {}", e);
        ApiError::internal("Failed to build schedule")
    })?;

    Ok(Json(schedule))
}
