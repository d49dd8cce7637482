//! Public dataset endpoints. Authentication and rate limiting happen in the
//! gateway layers before these run.

use axum::{
    Extension, Json,
    extract::{Query, State},
};
use openalbion_db::models::dataset::{EnrollmentRecord, Headcount};
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

use crate::error::ApiError;
use crate::gateway::AuthenticatedKey;
use crate::services::dataset_service::EnrollmentQuery;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct EnrollmentParams {
    pub dimension: Option<String>,
}

pub async fn get_headcounts(
    State(state): State<AppState>,
    Extension(key): Extension<AuthenticatedKey>,
) -> Result<Json<Arc<Vec<Headcount>>>, ApiError> {
    debug!(key_id = key.key_id, "Serving headcounts");
    Ok(Json(state.datasets.get_headcounts().await?))
}

pub async fn get_enrollment(
    State(state): State<AppState>,
    Extension(key): Extension<AuthenticatedKey>,
    params: Result<Query<EnrollmentParams>, axum::extract::rejection::QueryRejection>,
) -> Result<Json<Arc<Vec<EnrollmentRecord>>>, ApiError> {
    let Query(params) = params?;
    // `?dimension=` with no value means no filter.
    let dimension = params
        .dimension
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty());
    debug!(key_id = key.key_id, ?dimension, "Serving enrollment");

    Ok(Json(state.datasets.get_enrollment(EnrollmentQuery { dimension }).await?))
}

pub async fn list_dimensions(State(state): State<AppState>) -> Result<Json<Arc<Vec<String>>>, ApiError> {
    Ok(Json(state.datasets.list_dimensions().await?))
}
