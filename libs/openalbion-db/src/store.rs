//! Storage seams. The gateway and services are written against these traits;
//! `repositories` provides the PostgreSQL implementations and `memory` an
//! in-process one.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::models::{
    api_key::{ApiKey, NewApiKey},
    dataset::{EnrollmentRecord, Headcount},
    preference::{PreferencePatch, UserPreference},
    session::SessionUser,
};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("an API key with this secret already exists")]
    DuplicateSecret,
}

#[async_trait]
pub trait ApiKeyStore: Send + Sync {
    /// Fails with [`StoreError::DuplicateSecret`] if the secret is taken.
    async fn insert(&self, new_key: NewApiKey) -> Result<ApiKey>;
    async fn find_by_secret(&self, secret: &str) -> Result<Option<ApiKey>>;
    async fn list_for_user(&self, user_id: &str) -> Result<Vec<ApiKey>>;
    /// Returns whether a row matched `id AND user_id`.
    async fn set_active(&self, id: i64, user_id: &str, active: bool) -> Result<bool>;
    /// Returns whether a row matched `id AND user_id`.
    async fn delete(&self, id: i64, user_id: &str) -> Result<bool>;
    async fn touch_last_used(&self, id: i64, at: DateTime<Utc>) -> Result<()>;
}

#[async_trait]
pub trait PreferenceStore: Send + Sync {
    async fn get_or_create(&self, user_id: &str) -> Result<UserPreference>;
    async fn update(&self, user_id: &str, patch: &PreferencePatch) -> Result<UserPreference>;
}

#[async_trait]
pub trait DatasetStore: Send + Sync {
    /// Ordered by year ascending.
    async fn headcounts(&self) -> Result<Vec<Headcount>>;
    /// Ordered by year, primary category, secondary category.
    async fn enrollment(&self, dimension: Option<&str>) -> Result<Vec<EnrollmentRecord>>;
    async fn dimensions(&self) -> Result<Vec<String>>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Only sessions whose expiry is after `now` resolve.
    async fn find_session(&self, token: &str, now: DateTime<Utc>) -> Result<Option<SessionUser>>;
}

#[async_trait]
pub trait HealthCheck: Send + Sync {
    async fn ping(&self) -> Result<()>;
}

/// One handle per concern, built once at start-up and shared.
#[derive(Clone)]
pub struct Stores {
    pub api_keys: Arc<dyn ApiKeyStore>,
    pub preferences: Arc<dyn PreferenceStore>,
    pub datasets: Arc<dyn DatasetStore>,
    pub sessions: Arc<dyn SessionStore>,
    pub health: Arc<dyn HealthCheck>,
}

impl Stores {
    pub fn postgres(pool: sqlx::PgPool) -> Self {
        use crate::repositories::{
            api_key_repo::ApiKeyRepository, dataset_repo::DatasetRepository,
            preference_repo::PreferenceRepository, session_repo::SessionRepository,
        };

        Self {
            api_keys: Arc::new(ApiKeyRepository::new(pool.clone())),
            preferences: Arc::new(PreferenceRepository::new(pool.clone())),
            datasets: Arc::new(DatasetRepository::new(pool.clone())),
            sessions: Arc::new(SessionRepository::new(pool.clone())),
            health: Arc::new(crate::repositories::PgHealthCheck::new(pool)),
        }
    }

    pub fn memory(store: Arc<crate::memory::MemoryStore>) -> Self {
        Self {
            api_keys: store.clone(),
            preferences: store.clone(),
            datasets: store.clone(),
            sessions: store.clone(),
            health: store,
        }
    }
}
