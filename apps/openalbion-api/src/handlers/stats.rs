use axum::{
    Extension, Json,
    extract::{Path, State},
};
use chrono::Utc;
use openalbion_db::models::session::SessionUser;
use tracing::warn;

use crate::error::{ApiError, ApiResponse, MutationError};
use crate::services::key_service::KeyStats;
use crate::state::AppState;

pub async fn get_key_stats(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    Path(user_id): Path<String>,
) -> Result<Json<ApiResponse<KeyStats>>, MutationError> {
    if user_id != user.user_id {
        warn!(session_user = %user.user_id, requested = %user_id, "Cross-user stats request denied");
        return Err(ApiError::Forbidden("Forbidden").into());
    }

    let stats = state.keys.key_stats(&user.user_id, Utc::now()).await?;
    Ok(ApiResponse::data(stats))
}
