use anyhow::Result;
use openalbion_db::models::preference::{PreferencePatch, UserPreference};
use openalbion_db::store::PreferenceStore;
use std::sync::Arc;

#[derive(Clone)]
pub struct PreferenceService {
    store: Arc<dyn PreferenceStore>,
}

impl PreferenceService {
    pub fn new(store: Arc<dyn PreferenceStore>) -> Self {
        Self { store }
    }

    /// Inserts the default row on first read.
    pub async fn get_preferences(&self, user_id: &str) -> Result<UserPreference> {
        self.store.get_or_create(user_id).await
    }

    pub async fn update_preferences(&self, user_id: &str, patch: &PreferencePatch) -> Result<UserPreference> {
        let updated = self.store.update(user_id, patch).await?;
        tracing::info!(user_id, ?patch, "Preferences updated");
        Ok(updated)
    }
}
