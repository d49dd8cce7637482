use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::PgPool;

use crate::models::preference::{PreferencePatch, UserPreference};
use crate::store::PreferenceStore;

#[derive(Clone, Debug)]
pub struct PreferenceRepository {
    pool: PgPool,
}

impl PreferenceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PreferenceStore for PreferenceRepository {
    async fn get_or_create(&self, user_id: &str) -> Result<UserPreference> {
        // The no-op DO UPDATE makes RETURNING yield the existing row too.
        sqlx::query_as::<_, UserPreference>(
            r#"
            INSERT INTO user_preferences (user_id)
            VALUES ($1)
            ON CONFLICT (user_id) DO UPDATE SET user_id = EXCLUDED.user_id
            RETURNING user_id, email_notifications, key_expiry_alerts, dataset_updates, updated_at
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .context("Failed to load user preferences")
    }

    async fn update(&self, user_id: &str, patch: &PreferencePatch) -> Result<UserPreference> {
        sqlx::query_as::<_, UserPreference>(
            r#"
            INSERT INTO user_preferences (user_id, email_notifications, key_expiry_alerts, dataset_updates)
            VALUES ($1, COALESCE($2, TRUE), COALESCE($3, TRUE), COALESCE($4, TRUE))
            ON CONFLICT (user_id) DO UPDATE SET
                email_notifications = COALESCE($2, user_preferences.email_notifications),
                key_expiry_alerts = COALESCE($3, user_preferences.key_expiry_alerts),
                dataset_updates = COALESCE($4, user_preferences.dataset_updates),
                updated_at = NOW()
            RETURNING user_id, email_notifications, key_expiry_alerts, dataset_updates, updated_at
            "#,
        )
        .bind(user_id)
        .bind(patch.email_notifications)
        .bind(patch.key_expiry_alerts)
        .bind(patch.dataset_updates)
        .fetch_one(&self.pool)
        .await
        .context("Failed to update user preferences")
    }
}
