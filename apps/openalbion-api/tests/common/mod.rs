#![allow(dead_code)]

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{HeaderMap, Request, StatusCode};
use chrono::{Duration, Utc};
use openalbion_api::{
    AppState, build_router,
    config::{AppConfig, RateLimitConfig},
    services::rate_limit::{MemoryRateLimiter, RateLimiter},
};
use openalbion_db::{
    memory::MemoryStore,
    models::dataset::{EnrollmentRecord, Headcount},
    models::session::SessionUser,
    store::{HealthCheck, Stores},
};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

pub const ALICE_SESSION: &str = "session-alice";
pub const BOB_SESSION: &str = "session-bob";

pub struct TestApp {
    pub store: Arc<MemoryStore>,
    pub state: AppState,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(AppConfig::default()).await
    }

    pub async fn with_config(config: AppConfig) -> Self {
        let limiter = Arc::new(MemoryRateLimiter::new(config.rate_limit));
        Self::with_parts(config, limiter, None).await
    }

    /// Swaps in a custom limiter and, optionally, a custom health check.
    pub async fn with_parts(
        config: AppConfig,
        limiter: Arc<dyn RateLimiter>,
        health: Option<Arc<dyn HealthCheck>>,
    ) -> Self {
        let store = Arc::new(MemoryStore::new());
        seed(&store).await;

        let mut stores = Stores::memory(store.clone());
        if let Some(health) = health {
            stores.health = health;
        }
        let state = AppState::new(config, stores, limiter);
        Self { store, state }
    }

    pub async fn with_rate_limit(max_requests: u64) -> Self {
        Self::with_config(AppConfig {
            rate_limit: RateLimitConfig {
                max_requests,
                window: std::time::Duration::from_secs(60),
            },
            ..AppConfig::default()
        })
        .await
    }

    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    pub async fn send(&self, req: Request<Body>) -> TestResponse {
        let res = self.router().oneshot(req).await.unwrap();
        let status = res.status();
        let headers = res.headers().clone();
        let bytes = to_bytes(res.into_body(), 1024 * 1024).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        TestResponse { status, headers, body }
    }

    /// Issues a key for `user_id` directly through the service and returns its secret.
    pub async fn issue_key(&self, user_id: &str) -> (i64, String) {
        let key = self.state.keys.create_api_key(user_id, "test", None).await.unwrap();
        (key.id, key.secret)
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

async fn seed(store: &MemoryStore) {
    let expires_at = Utc::now() + Duration::days(1);
    store
        .insert_session(
            ALICE_SESSION,
            SessionUser {
                user_id: "alice".to_string(),
                email: "alice@albion.edu".to_string(),
                name: "Alice".to_string(),
                expires_at,
            },
        )
        .await;
    store
        .insert_session(
            BOB_SESSION,
            SessionUser {
                user_id: "bob".to_string(),
                email: "bob@example.com".to_string(),
                name: "Bob".to_string(),
                expires_at,
            },
        )
        .await;

    store
        .load_headcounts(vec![
            Headcount { year: 2021, count: 1500 },
            Headcount { year: 2020, count: 1450 },
        ])
        .await;

    let row = |year, dimension: &str, primary: &str, value| EnrollmentRecord {
        year,
        dimension: dimension.to_string(),
        primary_category: primary.to_string(),
        secondary_category: None,
        value,
    };
    store
        .load_enrollment(vec![
            row(2020, "Gender", "Female", 780.0),
            row(2020, "Gender", "Male", 670.0),
            row(2020, "Ethnicity", "Asian", 90.0),
            row(2021, "Gender", "Female", 800.0),
        ])
        .await;
}

pub fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

pub fn with_session(method: &str, uri: &str, token: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("cookie", format!("oa_session={}", token));
    match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}
