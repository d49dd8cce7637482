use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::models::api_key::{ApiKey, NewApiKey};
use crate::store::{ApiKeyStore, StoreError};

const API_KEY_COLUMNS: &str =
    "id, user_id, secret, name, created_at, expires_at, last_used_at, is_active";

#[derive(Clone, Debug)]
pub struct ApiKeyRepository {
    pool: PgPool,
}

impl ApiKeyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[async_trait]
impl ApiKeyStore for ApiKeyRepository {
    async fn insert(&self, new_key: NewApiKey) -> Result<ApiKey> {
        let sql = format!(
            r#"
            INSERT INTO api_keys (user_id, secret, name, created_at, expires_at, is_active)
            VALUES ($1, $2, $3, $4, $5, TRUE)
            RETURNING {API_KEY_COLUMNS}
            "#
        );
        let rec = sqlx::query_as::<_, ApiKey>(&sql)
            .bind(&new_key.user_id)
            .bind(&new_key.secret)
            .bind(&new_key.name)
            .bind(new_key.created_at)
            .bind(new_key.expires_at)
            .fetch_one(&self.pool)
            .await;

        match rec {
            Ok(rec) => Ok(rec),
            Err(e) if is_unique_violation(&e) => Err(StoreError::DuplicateSecret.into()),
            Err(e) => Err(e).context("Failed to create API key"),
        }
    }

    async fn find_by_secret(&self, secret: &str) -> Result<Option<ApiKey>> {
        let sql = format!("SELECT {API_KEY_COLUMNS} FROM api_keys WHERE secret = $1");
        sqlx::query_as::<_, ApiKey>(&sql)
            .bind(secret)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to look up API key")
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<ApiKey>> {
        let sql = format!(
            "SELECT {API_KEY_COLUMNS} FROM api_keys WHERE user_id = $1 ORDER BY created_at DESC, id DESC"
        );
        sqlx::query_as::<_, ApiKey>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch API keys")
    }

    async fn set_active(&self, id: i64, user_id: &str, active: bool) -> Result<bool> {
        let result = sqlx::query("UPDATE api_keys SET is_active = $1 WHERE id = $2 AND user_id = $3")
            .bind(active)
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .context("Failed to update API key status")?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, id: i64, user_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM api_keys WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .context("Failed to delete API key")?;

        Ok(result.rows_affected() > 0)
    }

    async fn touch_last_used(&self, id: i64, at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE api_keys SET last_used_at = $1 WHERE id = $2")
            .bind(at)
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to update API key last_used_at")?;

        Ok(())
    }
}
