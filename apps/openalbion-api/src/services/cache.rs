use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

/// Time-based cache: entries are served until `ttl` has elapsed since they
/// were loaded. There is no manual invalidation.
pub struct TtlCache<K, V> {
    ttl: Duration,
    entries: RwLock<HashMap<K, (Instant, Arc<V>)>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub async fn get(&self, key: &K) -> Option<Arc<V>> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|(loaded_at, _)| loaded_at.elapsed() < self.ttl)
            .map(|(_, value)| value.clone())
    }

    /// Concurrent misses for the same key may each run `load`; the last one
    /// to finish wins.
    pub async fn get_or_load<F, Fut>(&self, key: K, load: F) -> anyhow::Result<Arc<V>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<V>>,
    {
        if let Some(hit) = self.get(&key).await {
            return Ok(hit);
        }

        let value = Arc::new(load().await?);
        let mut entries = self.entries.write().await;
        entries.retain(|_, (loaded_at, _)| loaded_at.elapsed() < self.ttl);
        entries.insert(key, (Instant::now(), value.clone()));
        Ok(value)
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}
