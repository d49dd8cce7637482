use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserPreference {
    pub user_id: String,
    pub email_notifications: bool,
    pub key_expiry_alerts: bool,
    pub dataset_updates: bool,
    pub updated_at: DateTime<Utc>,
}

impl UserPreference {
    /// Row inserted on first read.
    pub fn defaults(user_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.to_string(),
            email_notifications: true,
            key_expiry_alerts: true,
            dataset_updates: true,
            updated_at: now,
        }
    }

    pub fn apply(&mut self, patch: &PreferencePatch, now: DateTime<Utc>) {
        if let Some(v) = patch.email_notifications {
            self.email_notifications = v;
        }
        if let Some(v) = patch.key_expiry_alerts {
            self.key_expiry_alerts = v;
        }
        if let Some(v) = patch.dataset_updates {
            self.dataset_updates = v;
        }
        self.updated_at = now;
    }
}

/// Partial update; `None` leaves the stored flag untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PreferencePatch {
    pub email_notifications: Option<bool>,
    pub key_expiry_alerts: Option<bool>,
    pub dataset_updates: Option<bool>,
}

impl PreferencePatch {
    pub fn is_empty(&self) -> bool {
        self.email_notifications.is_none()
            && self.key_expiry_alerts.is_none()
            && self.dataset_updates.is_none()
    }
}
