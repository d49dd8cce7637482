//! Self-service key management for the signed-in user.

use axum::{
    Extension, Json,
    extract::{
        Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
};
use chrono::Utc;
use openalbion_db::models::api_key::{ApiKey, KeyStatus};
use openalbion_db::models::session::SessionUser;
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResponse, MutationError};
use crate::state::AppState;

/// List entry: the stored key with a masked secret and derived status.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyView {
    #[serde(flatten)]
    pub key: ApiKey,
    pub secret_preview: String,
    pub status: KeyStatus,
}

/// Issuance response; the only place the plaintext secret is returned.
#[derive(Debug, Serialize)]
pub struct IssuedKey {
    #[serde(flatten)]
    pub key: ApiKey,
    pub secret: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateKeyRequest {
    #[serde(default)]
    pub name: String,
    pub expires_in_days: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct KeyActionParams {
    pub id: Option<String>,
    pub action: Option<String>,
}

impl KeyActionParams {
    fn key_id(&self) -> Result<i64, ApiError> {
        let raw = self
            .id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ApiError::validation("id", "id is required"))?;

        match raw.parse::<i64>() {
            Ok(id) if id > 0 => Ok(id),
            _ => Err(ApiError::validation("id", "id must be a positive integer")),
        }
    }

    fn action(&self) -> Option<&str> {
        self.action.as_deref().map(str::trim).filter(|a| !a.is_empty())
    }
}

const NOT_FOUND: &str = "API key not found";

pub async fn list_keys(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
) -> Result<Json<ApiResponse<Vec<KeyView>>>, MutationError> {
    let now = Utc::now();
    let keys = state.keys.list_api_keys(&user.user_id).await?;

    let views = keys
        .into_iter()
        .map(|key| KeyView {
            secret_preview: key.secret_preview(),
            status: key.status(now),
            key,
        })
        .collect();

    Ok(ApiResponse::data(views))
}

pub async fn create_key(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    body: Result<Json<CreateKeyRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<IssuedKey>>, MutationError> {
    let Json(req) = body?;
    let key = state
        .keys
        .create_api_key(&user.user_id, &req.name, req.expires_in_days)
        .await?;

    Ok(ApiResponse::data(IssuedKey {
        secret: key.secret.clone(),
        key,
    }))
}

/// `DELETE ?id=&action=revoke|delete`; no action means revoke.
pub async fn revoke_or_delete_key(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    params: Result<Query<KeyActionParams>, QueryRejection>,
) -> Result<Json<ApiResponse<()>>, MutationError> {
    let Query(params) = params?;
    let id = params.key_id()?;

    let (found, message) = match params.action().unwrap_or("revoke") {
        "revoke" => (state.keys.revoke_api_key(id, &user.user_id).await?, "API key revoked"),
        "delete" => (state.keys.delete_api_key(id, &user.user_id).await?, "API key deleted"),
        _ => return Err(ApiError::validation("action", "action must be one of: revoke, delete").into()),
    };

    if !found {
        return Err(ApiError::NotFound(NOT_FOUND).into());
    }
    Ok(ApiResponse::message(message))
}

/// `PUT ?id=&action=unrevoke`; no action means unrevoke.
pub async fn unrevoke_key(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    params: Result<Query<KeyActionParams>, QueryRejection>,
) -> Result<Json<ApiResponse<()>>, MutationError> {
    let Query(params) = params?;
    let id = params.key_id()?;

    if params.action().is_some_and(|a| a != "unrevoke") {
        return Err(ApiError::validation("action", "action must be: unrevoke").into());
    }

    if !state.keys.unrevoke_api_key(id, &user.user_id).await? {
        return Err(ApiError::NotFound(NOT_FOUND).into());
    }
    Ok(ApiResponse::message("API key restored"))
}
