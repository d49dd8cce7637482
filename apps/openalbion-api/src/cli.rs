//! Operator commands for managing keys from a shell.

use anyhow::{Result, bail};
use chrono::Utc;

use crate::services::key_service::KeyService;

pub async fn create_key(keys: &KeyService, user_id: &str, name: &str, expires_in_days: Option<i64>) -> Result<()> {
    let key = keys.create_api_key(user_id, name, expires_in_days).await?;

    println!("API key '{}' created for user '{}' (id {}).", key.name, key.user_id, key.id);
    match key.expires_at {
        Some(at) => println!("Expires: {}", at.to_rfc3339()),
        None => println!("Expires: never"),
    }
    println!();
    println!("  {}", key.secret);
    println!();
    println!("Store this secret now. It will not be shown again.");
    Ok(())
}

pub async fn list_keys(keys: &KeyService, user_id: &str) -> Result<()> {
    let now = Utc::now();
    let list = keys.list_api_keys(user_id).await?;
    if list.is_empty() {
        println!("No API keys for user '{}'.", user_id);
        return Ok(());
    }

    println!("{:<8} {:<24} {:<18} {:<8} {}", "ID", "NAME", "SECRET", "STATUS", "LAST USED");
    for key in list {
        let status = serde_json::to_value(key.status(now))?;
        let last_used = key
            .last_used_at
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<8} {:<24} {:<18} {:<8} {}",
            key.id,
            key.name,
            key.secret_preview(),
            status.as_str().unwrap_or("?"),
            last_used
        );
    }
    Ok(())
}

#[derive(Debug, Clone, Copy)]
pub enum KeyAction {
    Revoke,
    Unrevoke,
    Delete,
}

pub async fn apply_key_action(keys: &KeyService, action: KeyAction, id: i64, user_id: &str) -> Result<()> {
    let (found, verb) = match action {
        KeyAction::Revoke => (keys.revoke_api_key(id, user_id).await?, "revoked"),
        KeyAction::Unrevoke => (keys.unrevoke_api_key(id, user_id).await?, "restored"),
        KeyAction::Delete => (keys.delete_api_key(id, user_id).await?, "deleted"),
    };

    if !found {
        bail!("API key {} not found for user '{}'", id, user_id);
    }
    println!("API key {} {}.", id, verb);
    Ok(())
}
