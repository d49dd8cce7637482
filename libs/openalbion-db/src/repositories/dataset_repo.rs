use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::PgPool;

use crate::models::dataset::{EnrollmentRecord, Headcount};
use crate::store::DatasetStore;

#[derive(Clone, Debug)]
pub struct DatasetRepository {
    pool: PgPool,
}

impl DatasetRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DatasetStore for DatasetRepository {
    async fn headcounts(&self) -> Result<Vec<Headcount>> {
        sqlx::query_as::<_, Headcount>("SELECT year, count FROM headcounts ORDER BY year ASC")
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch headcounts")
    }

    async fn enrollment(&self, dimension: Option<&str>) -> Result<Vec<EnrollmentRecord>> {
        // NULLS FIRST keeps Postgres ordering in line with Option's Ord.
        sqlx::query_as::<_, EnrollmentRecord>(
            r#"
            SELECT y.year, e.dimension, e.primary_category, e.secondary_category, e.value
            FROM enrollment e
            JOIN enrollment_years y ON e.year_id = y.id
            WHERE ($1::TEXT IS NULL OR e.dimension = $1)
            ORDER BY y.year ASC, e.primary_category ASC, e.secondary_category ASC NULLS FIRST
            "#,
        )
        .bind(dimension)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch enrollment")
    }

    async fn dimensions(&self) -> Result<Vec<String>> {
        sqlx::query_scalar("SELECT DISTINCT dimension FROM enrollment ORDER BY dimension ASC")
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch enrollment dimensions")
    }
}
