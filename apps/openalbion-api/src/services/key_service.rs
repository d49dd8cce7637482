use chrono::{DateTime, Duration, Utc};
use openalbion_db::models::api_key::{ApiKey, NewApiKey};
use openalbion_db::store::ApiKeyStore;
use rand::Rng;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::ApiError;

pub const KEY_PREFIX: &str = "oa_";
const SECRET_LEN: usize = 32;
const SECRET_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const MAX_NAME_LEN: usize = 100;
const MAX_EXPIRY_DAYS: i64 = 3650;

#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("API key missing")]
    MissingCredential,
    #[error("Invalid or expired API key")]
    InvalidCredential,
    #[error("{0}")]
    InvalidName(&'static str),
    #[error("expiresInDays must be a positive integer of at most 3650")]
    InvalidExpiry,
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl From<KeyError> for ApiError {
    fn from(err: KeyError) -> Self {
        match err {
            KeyError::MissingCredential => ApiError::Unauthorized("API key missing"),
            KeyError::InvalidCredential => ApiError::Unauthorized("Invalid or expired API key"),
            KeyError::InvalidName(_) => ApiError::validation("name", err.to_string()),
            KeyError::InvalidExpiry => ApiError::validation("expiresInDays", err.to_string()),
            KeyError::Store(e) => ApiError::Internal(e),
        }
    }
}

/// `oa_` followed by 32 characters from `[a-z0-9]`.
pub fn generate_secret() -> String {
    let mut rng = rand::rng();
    let body: String = (0..SECRET_LEN)
        .map(|_| SECRET_ALPHABET[rng.random_range(0..SECRET_ALPHABET.len())] as char)
        .collect();
    format!("{}{}", KEY_PREFIX, body)
}

pub fn looks_like_secret(candidate: &str) -> bool {
    candidate
        .strip_prefix(KEY_PREFIX)
        .is_some_and(|body| body.len() == SECRET_LEN && body.bytes().all(|b| SECRET_ALPHABET.contains(&b)))
}

#[derive(Debug, Clone, Default, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyStats {
    pub total: usize,
    pub active: usize,
    pub revoked: usize,
    pub expired: usize,
    pub last_used_at: Option<DateTime<Utc>>,
}

/// Issues, validates and manages API keys against an [`ApiKeyStore`].
#[derive(Clone)]
pub struct KeyService {
    store: Arc<dyn ApiKeyStore>,
}

impl KeyService {
    pub fn new(store: Arc<dyn ApiKeyStore>) -> Self {
        Self { store }
    }

    pub async fn create_api_key(
        &self,
        user_id: &str,
        name: &str,
        expires_in_days: Option<i64>,
    ) -> Result<ApiKey, KeyError> {
        self.create_api_key_at(user_id, name, expires_in_days, Utc::now()).await
    }

    /// Returns the record with its plaintext secret; it is not retrievable later.
    pub async fn create_api_key_at(
        &self,
        user_id: &str,
        name: &str,
        expires_in_days: Option<i64>,
        now: DateTime<Utc>,
    ) -> Result<ApiKey, KeyError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(KeyError::InvalidName("Name is required"));
        }
        if name.chars().count() > MAX_NAME_LEN {
            return Err(KeyError::InvalidName("Name must be at most 100 characters"));
        }

        let expires_at = match expires_in_days {
            None => None,
            Some(days) if (1..=MAX_EXPIRY_DAYS).contains(&days) => Some(now + Duration::days(days)),
            Some(_) => return Err(KeyError::InvalidExpiry),
        };

        let key = self
            .store
            .insert(NewApiKey {
                user_id: user_id.to_string(),
                secret: generate_secret(),
                name: name.to_string(),
                created_at: now,
                expires_at,
            })
            .await?;

        info!(key_id = key.id, user_id = %key.user_id, "API key issued");
        Ok(key)
    }

    pub async fn authenticate(&self, candidate: Option<&str>) -> Result<ApiKey, KeyError> {
        self.authenticate_at(candidate, Utc::now()).await
    }

    /// Resolves a candidate token to a usable key. Unknown, revoked and
    /// expired keys all produce the same error.
    pub async fn authenticate_at(
        &self,
        candidate: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<ApiKey, KeyError> {
        let candidate = candidate
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or(KeyError::MissingCredential)?;

        if !looks_like_secret(candidate) {
            return Err(KeyError::InvalidCredential);
        }

        let key = match self.store.find_by_secret(candidate).await? {
            Some(key) if key.is_usable(now) => key,
            Some(key) => {
                warn!(key_id = key.id, status = ?key.status(now), "Rejected unusable API key");
                return Err(KeyError::InvalidCredential);
            }
            None => {
                warn!("Rejected unknown API key");
                return Err(KeyError::InvalidCredential);
            }
        };

        self.spawn_touch(key.id, now);
        Ok(key)
    }

    // Best effort: the response never waits on or fails because of this write.
    fn spawn_touch(&self, key_id: i64, at: DateTime<Utc>) {
        let store = self.store.clone();
        tokio::spawn(async move {
            if let Err(e) = store.touch_last_used(key_id, at).await {
                warn!(key_id, "Failed to record API key usage: {:#}", e);
            }
        });
    }

    pub async fn list_api_keys(&self, user_id: &str) -> Result<Vec<ApiKey>, KeyError> {
        Ok(self.store.list_for_user(user_id).await?)
    }

    pub async fn revoke_api_key(&self, id: i64, user_id: &str) -> Result<bool, KeyError> {
        let affected = self.store.set_active(id, user_id, false).await?;
        if affected {
            info!(key_id = id, user_id, "API key revoked");
        }
        Ok(affected)
    }

    pub async fn unrevoke_api_key(&self, id: i64, user_id: &str) -> Result<bool, KeyError> {
        let affected = self.store.set_active(id, user_id, true).await?;
        if affected {
            info!(key_id = id, user_id, "API key reactivated");
        }
        Ok(affected)
    }

    pub async fn delete_api_key(&self, id: i64, user_id: &str) -> Result<bool, KeyError> {
        let affected = self.store.delete(id, user_id).await?;
        if affected {
            info!(key_id = id, user_id, "API key deleted");
        }
        Ok(affected)
    }

    pub async fn key_stats(&self, user_id: &str, now: DateTime<Utc>) -> Result<KeyStats, KeyError> {
        use openalbion_db::models::api_key::KeyStatus;

        let keys = self.store.list_for_user(user_id).await?;
        let mut stats = KeyStats {
            total: keys.len(),
            ..Default::default()
        };
        for key in &keys {
            match key.status(now) {
                KeyStatus::Active => stats.active += 1,
                KeyStatus::Revoked => stats.revoked += 1,
                KeyStatus::Expired => stats.expired += 1,
            }
        }
        stats.last_used_at = keys.iter().filter_map(|k| k.last_used_at).max();
        Ok(stats)
    }
}
