use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// The user behind a live browser session.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub user_id: String,
    pub email: String,
    pub name: String,
    pub expires_at: DateTime<Utc>,
}

impl SessionUser {
    /// Case-insensitive check of the e-mail's domain part.
    pub fn has_email_domain(&self, domain: &str) -> bool {
        let domain = domain.trim_start_matches('@');
        self.email
            .rsplit_once('@')
            .is_some_and(|(_, d)| d.eq_ignore_ascii_case(domain))
    }
}
