use axum::{
    Extension, Json,
    extract::{State, rejection::JsonRejection},
};
use openalbion_db::models::preference::{PreferencePatch, UserPreference};
use openalbion_db::models::session::SessionUser;

use crate::error::{ApiError, ApiResponse, MutationError};
use crate::state::AppState;

pub async fn get_preferences(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
) -> Result<Json<ApiResponse<UserPreference>>, MutationError> {
    let prefs = state.preferences.get_preferences(&user.user_id).await?;
    Ok(ApiResponse::data(prefs))
}

pub async fn update_preferences(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    body: Result<Json<PreferencePatch>, JsonRejection>,
) -> Result<Json<ApiResponse<UserPreference>>, MutationError> {
    let Json(patch) = body?;
    if patch.is_empty() {
        return Err(ApiError::validation("body", "At least one preference must be provided").into());
    }

    let prefs = state.preferences.update_preferences(&user.user_id, &patch).await?;
    Ok(ApiResponse::data(prefs))
}
