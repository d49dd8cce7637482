use axum::{Json, extract::State};
use serde_json::{Value, json};
use tracing::error;

use crate::error::ApiError;
use crate::state::AppState;

pub async fn health_check(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    match state.health.ping().await {
        Ok(()) => Ok(Json(json!({ "status": "ok" }))),
        Err(e) => {
            error!("Health check failed: {:#}", e);
            Err(ApiError::Unavailable)
        }
    }
}
