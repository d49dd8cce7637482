use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::info;

use crate::config::RateLimitConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed,
    Limited { retry_after_secs: u64 },
}

/// Fixed-window allow/deny decision keyed by an opaque string (client IP).
#[async_trait]
pub trait RateLimiter: Send + Sync {
    async fn check(&self, key: &str) -> Result<RateDecision>;
}

#[derive(Clone)]
pub struct RedisRateLimiter {
    conn: ConnectionManager,
    config: RateLimitConfig,
}

impl RedisRateLimiter {
    pub async fn connect(redis_url: &str, config: RateLimitConfig) -> Result<Self> {
        let client = redis::Client::open(redis_url).context("Invalid REDIS_URL")?;
        let conn = ConnectionManager::new(client)
            .await
            .context("Failed to connect to Redis")?;

        info!("Redis connected for rate limiting");
        Ok(Self { conn, config })
    }
}

/// Outcome of one fixed-window hit given the post-increment `count` and the
/// key's `TTL` reply. `rearm` is set whenever the key carries no expiry
/// (`-1`), which covers both the first hit and a window whose `EXPIRE` was
/// lost.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct WindowHit {
    decision: RateDecision,
    rearm: bool,
}

fn evaluate_window(count: u64, ttl: i64, max_requests: u64, window_secs: u64) -> WindowHit {
    let rearm = ttl < 0;
    let decision = if count <= max_requests {
        RateDecision::Allowed
    } else {
        RateDecision::Limited {
            retry_after_secs: if rearm { window_secs } else { (ttl as u64).max(1) },
        }
    };
    WindowHit { decision, rearm }
}

#[async_trait]
impl RateLimiter for RedisRateLimiter {
    async fn check(&self, key: &str) -> Result<RateDecision> {
        let mut conn = self.conn.clone();
        let redis_key = format!("rate:api:{}", key);
        let window_secs = self.config.window.as_secs().max(1);

        let (count, ttl): (u64, i64) = redis::pipe()
            .atomic()
            .incr(&redis_key, 1)
            .ttl(&redis_key)
            .query_async(&mut conn)
            .await
            .context("Redis INCR/TTL failed")?;

        let hit = evaluate_window(count, ttl, self.config.max_requests, window_secs);
        if hit.rearm {
            let _: () = redis::cmd("EXPIRE")
                .arg(&redis_key)
                .arg(window_secs)
                .query_async(&mut conn)
                .await
                .context("Redis EXPIRE failed")?;
        }

        Ok(hit.decision)
    }
}

/// Single-process fallback when no Redis is configured.
pub struct MemoryRateLimiter {
    config: RateLimitConfig,
    windows: Mutex<HashMap<String, (u64, Instant)>>,
}

impl MemoryRateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl RateLimiter for MemoryRateLimiter {
    async fn check(&self, key: &str) -> Result<RateDecision> {
        let now = Instant::now();
        let window = self.config.window;
        let mut windows = self.windows.lock().await;

        if windows.len() > 10_000 {
            windows.retain(|_, (_, started)| now.duration_since(*started) < window);
        }

        let entry = windows.entry(key.to_string()).or_insert((0, now));
        if now.duration_since(entry.1) >= window {
            *entry = (0, now);
        }
        entry.0 += 1;

        if entry.0 <= self.config.max_requests {
            Ok(RateDecision::Allowed)
        } else {
            let remaining = window.saturating_sub(now.duration_since(entry.1));
            Ok(RateDecision::Limited {
                retry_after_secs: remaining.as_secs().max(1),
            })
        }
    }
}

/// Always allows; used where limiting is switched off (`RATE_LIMIT_REQUESTS=0`).
pub struct NoopRateLimiter;

#[async_trait]
impl RateLimiter for NoopRateLimiter {
    async fn check(&self, _key: &str) -> Result<RateDecision> {
        Ok(RateDecision::Allowed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn limiter(max_requests: u64, window_secs: u64) -> MemoryRateLimiter {
        MemoryRateLimiter::new(RateLimitConfig {
            max_requests,
            window: Duration::from_secs(window_secs),
        })
    }

    #[tokio::test(start_paused = true)]
    async fn limits_within_a_window_and_resets_after() {
        let limiter = limiter(3, 60);
        for _ in 0..3 {
            assert_eq!(limiter.check("10.0.0.1").await.unwrap(), RateDecision::Allowed);
        }
        assert_eq!(
            limiter.check("10.0.0.1").await.unwrap(),
            RateDecision::Limited { retry_after_secs: 60 }
        );

        tokio::time::advance(Duration::from_secs(45)).await;
        assert_eq!(
            limiter.check("10.0.0.1").await.unwrap(),
            RateDecision::Limited { retry_after_secs: 15 }
        );

        tokio::time::advance(Duration::from_secs(15)).await;
        assert_eq!(limiter.check("10.0.0.1").await.unwrap(), RateDecision::Allowed);
    }

    #[test]
    fn first_hit_arms_the_window() {
        let hit = evaluate_window(1, -1, 3, 60);
        assert_eq!(hit.decision, RateDecision::Allowed);
        assert!(hit.rearm);

        let hit = evaluate_window(2, 58, 3, 60);
        assert_eq!(hit.decision, RateDecision::Allowed);
        assert!(!hit.rearm);
    }

    #[test]
    fn window_without_expiry_is_rearmed_even_when_over_limit() {
        // EXPIRE was lost on an earlier hit: the counter kept growing with no TTL.
        let hit = evaluate_window(250, -1, 100, 60);
        assert!(hit.rearm);
        assert_eq!(hit.decision, RateDecision::Limited { retry_after_secs: 60 });
    }

    #[test]
    fn limited_hits_report_the_remaining_ttl() {
        let hit = evaluate_window(101, 17, 100, 60);
        assert!(!hit.rearm);
        assert_eq!(hit.decision, RateDecision::Limited { retry_after_secs: 17 });

        let hit = evaluate_window(101, 0, 100, 60);
        assert_eq!(hit.decision, RateDecision::Limited { retry_after_secs: 1 });
    }

    #[tokio::test]
    async fn keys_are_counted_independently() {
        let limiter = limiter(1, 60);
        assert_eq!(limiter.check("a").await.unwrap(), RateDecision::Allowed);
        assert_eq!(limiter.check("b").await.unwrap(), RateDecision::Allowed);
        assert!(matches!(limiter.check("a").await.unwrap(), RateDecision::Limited { .. }));
    }
}
