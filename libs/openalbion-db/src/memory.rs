//! In-process store backing `serve --in-memory` and the test suites.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

use crate::models::{
    api_key::{ApiKey, NewApiKey},
    dataset::{EnrollmentRecord, Headcount},
    preference::{PreferencePatch, UserPreference},
    session::SessionUser,
};
use crate::store::{
    ApiKeyStore, DatasetStore, HealthCheck, PreferenceStore, SessionStore, StoreError,
};

#[derive(Default)]
struct Inner {
    next_key_id: i64,
    api_keys: BTreeMap<i64, ApiKey>,
    preferences: HashMap<String, UserPreference>,
    sessions: HashMap<String, SessionUser>,
    headcounts: Vec<Headcount>,
    enrollment: Vec<EnrollmentRecord>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_session(&self, token: &str, user: SessionUser) {
        self.inner.write().await.sessions.insert(token.to_string(), user);
    }

    /// Replaces the headcount dataset, as an out-of-band batch load would.
    pub async fn load_headcounts(&self, rows: Vec<Headcount>) {
        self.inner.write().await.headcounts = rows;
    }

    pub async fn load_enrollment(&self, rows: Vec<EnrollmentRecord>) {
        self.inner.write().await.enrollment = rows;
    }

    pub async fn get_key(&self, id: i64) -> Option<ApiKey> {
        self.inner.read().await.api_keys.get(&id).cloned()
    }
}

#[async_trait]
impl ApiKeyStore for MemoryStore {
    async fn insert(&self, new_key: NewApiKey) -> Result<ApiKey> {
        let mut inner = self.inner.write().await;
        if inner.api_keys.values().any(|k| k.secret == new_key.secret) {
            return Err(StoreError::DuplicateSecret.into());
        }

        inner.next_key_id += 1;
        let key = ApiKey {
            id: inner.next_key_id,
            user_id: new_key.user_id,
            secret: new_key.secret,
            name: new_key.name,
            created_at: new_key.created_at,
            expires_at: new_key.expires_at,
            last_used_at: None,
            is_active: true,
        };
        inner.api_keys.insert(key.id, key.clone());
        Ok(key)
    }

    async fn find_by_secret(&self, secret: &str) -> Result<Option<ApiKey>> {
        let inner = self.inner.read().await;
        Ok(inner.api_keys.values().find(|k| k.secret == secret).cloned())
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<ApiKey>> {
        let inner = self.inner.read().await;
        let mut keys: Vec<ApiKey> = inner
            .api_keys
            .values()
            .filter(|k| k.user_id == user_id)
            .cloned()
            .collect();
        keys.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(keys)
    }

    async fn set_active(&self, id: i64, user_id: &str, active: bool) -> Result<bool> {
        let mut inner = self.inner.write().await;
        match inner.api_keys.get_mut(&id) {
            Some(key) if key.user_id == user_id => {
                key.is_active = active;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete(&self, id: i64, user_id: &str) -> Result<bool> {
        let mut inner = self.inner.write().await;
        let owned = inner.api_keys.get(&id).is_some_and(|k| k.user_id == user_id);
        if owned {
            inner.api_keys.remove(&id);
        }
        Ok(owned)
    }

    async fn touch_last_used(&self, id: i64, at: DateTime<Utc>) -> Result<()> {
        if let Some(key) = self.inner.write().await.api_keys.get_mut(&id) {
            key.last_used_at = Some(at);
        }
        Ok(())
    }
}

#[async_trait]
impl PreferenceStore for MemoryStore {
    async fn get_or_create(&self, user_id: &str) -> Result<UserPreference> {
        let mut inner = self.inner.write().await;
        let pref = inner
            .preferences
            .entry(user_id.to_string())
            .or_insert_with(|| UserPreference::defaults(user_id, Utc::now()));
        Ok(pref.clone())
    }

    async fn update(&self, user_id: &str, patch: &PreferencePatch) -> Result<UserPreference> {
        let now = Utc::now();
        let mut inner = self.inner.write().await;
        let pref = inner
            .preferences
            .entry(user_id.to_string())
            .or_insert_with(|| UserPreference::defaults(user_id, now));
        pref.apply(patch, now);
        Ok(pref.clone())
    }
}

#[async_trait]
impl DatasetStore for MemoryStore {
    async fn headcounts(&self) -> Result<Vec<Headcount>> {
        let mut rows = self.inner.read().await.headcounts.clone();
        rows.sort_by_key(|r| r.year);
        Ok(rows)
    }

    async fn enrollment(&self, dimension: Option<&str>) -> Result<Vec<EnrollmentRecord>> {
        let inner = self.inner.read().await;
        let mut rows: Vec<EnrollmentRecord> = inner
            .enrollment
            .iter()
            .filter(|r| dimension.is_none_or(|d| r.dimension == d))
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        Ok(rows)
    }

    async fn dimensions(&self) -> Result<Vec<String>> {
        let inner = self.inner.read().await;
        let mut dims: Vec<String> = inner.enrollment.iter().map(|r| r.dimension.clone()).collect();
        dims.sort();
        dims.dedup();
        Ok(dims)
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn find_session(&self, token: &str, now: DateTime<Utc>) -> Result<Option<SessionUser>> {
        let inner = self.inner.read().await;
        Ok(inner
            .sessions
            .get(token)
            .filter(|s| s.expires_at > now)
            .cloned())
    }
}

#[async_trait]
impl HealthCheck for MemoryStore {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
