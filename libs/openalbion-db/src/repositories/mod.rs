pub mod api_key_repo;
pub mod dataset_repo;
pub mod preference_repo;
pub mod session_repo;

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::PgPool;

use crate::store::HealthCheck;

#[derive(Clone, Debug)]
pub struct PgHealthCheck {
    pool: PgPool,
}

impl PgHealthCheck {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HealthCheck for PgHealthCheck {
    async fn ping(&self) -> Result<()> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("Database health check failed")?;
        Ok(())
    }
}
