use anyhow::Result;
use openalbion_db::models::dataset::{EnrollmentRecord, Headcount};
use openalbion_db::store::DatasetStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::cache::TtlCache;

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct EnrollmentQuery {
    pub dimension: Option<String>,
}

/// Read-only dataset queries with a shared revalidation window.
pub struct DatasetService {
    store: Arc<dyn DatasetStore>,
    headcounts: TtlCache<(), Vec<Headcount>>,
    enrollment: TtlCache<EnrollmentQuery, Vec<EnrollmentRecord>>,
    dimensions: TtlCache<(), Vec<String>>,
}

impl DatasetService {
    pub fn new(store: Arc<dyn DatasetStore>, ttl: Duration) -> Self {
        Self {
            store,
            headcounts: TtlCache::new(ttl),
            enrollment: TtlCache::new(ttl),
            dimensions: TtlCache::new(ttl),
        }
    }

    pub async fn get_headcounts(&self) -> Result<Arc<Vec<Headcount>>> {
        self.headcounts
            .get_or_load((), || async move {
                debug!("Loading headcounts from store");
                self.store.headcounts().await
            })
            .await
    }

    /// Unknown dimensions yield an empty result and never occupy a cache slot,
    /// so the per-dimension cache stays bounded by the dataset itself.
    pub async fn get_enrollment(&self, query: EnrollmentQuery) -> Result<Arc<Vec<EnrollmentRecord>>> {
        if let Some(dimension) = &query.dimension {
            if !self.list_dimensions().await?.contains(dimension) {
                debug!(%dimension, "Unknown enrollment dimension");
                return Ok(Arc::new(Vec::new()));
            }
        }

        let dimension = query.dimension.clone();
        self.enrollment
            .get_or_load(query, || async move {
                debug!(?dimension, "Loading enrollment from store");
                self.store.enrollment(dimension.as_deref()).await
            })
            .await
    }

    pub async fn list_dimensions(&self) -> Result<Arc<Vec<String>>> {
        self.dimensions
            .get_or_load((), || async move { self.store.dimensions().await })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use openalbion_db::memory::MemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts round trips to the underlying store.
    struct CountingStore {
        inner: MemoryStore,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl DatasetStore for CountingStore {
        async fn headcounts(&self) -> Result<Vec<Headcount>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.headcounts().await
        }
        async fn enrollment(&self, dimension: Option<&str>) -> Result<Vec<EnrollmentRecord>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.enrollment(dimension).await
        }
        async fn dimensions(&self) -> Result<Vec<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.dimensions().await
        }
    }

    fn counting() -> Arc<CountingStore> {
        Arc::new(CountingStore {
            inner: MemoryStore::new(),
            calls: AtomicUsize::new(0),
        })
    }

    fn row(year: i32, dimension: &str, primary: &str) -> EnrollmentRecord {
        EnrollmentRecord {
            year,
            dimension: dimension.to_string(),
            primary_category: primary.to_string(),
            secondary_category: None,
            value: 10.0,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn headcounts_are_served_from_cache_within_the_window() {
        let store = counting();
        store
            .inner
            .load_headcounts(vec![Headcount { year: 2021, count: 1500 }, Headcount { year: 2020, count: 1450 }])
            .await;
        let service = DatasetService::new(store.clone(), Duration::from_secs(3600));

        let first = service.get_headcounts().await.unwrap();
        assert_eq!(first.iter().map(|h| h.year).collect::<Vec<_>>(), vec![2020, 2021]);

        store.inner.load_headcounts(vec![Headcount { year: 2022, count: 1600 }]).await;
        tokio::time::advance(Duration::from_secs(1800)).await;
        let second = service.get_headcounts().await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(store.calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(1801)).await;
        let third = service.get_headcounts().await.unwrap();
        assert_eq!(*third, vec![Headcount { year: 2022, count: 1600 }]);
        assert_eq!(store.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn enrollment_is_cached_per_dimension() {
        let store = counting();
        store
            .inner
            .load_enrollment(vec![
                row(2021, "Gender", "Female"),
                row(2020, "Gender", "Male"),
                row(2020, "Ethnicity", "Asian"),
                row(2020, "Gender", "Female"),
            ])
            .await;
        let service = DatasetService::new(store.clone(), Duration::from_secs(3600));

        let gender = EnrollmentQuery { dimension: Some("Gender".to_string()) };
        let rows = service.get_enrollment(gender.clone()).await.unwrap();
        assert!(rows.iter().all(|r| r.dimension == "Gender"));
        assert_eq!(
            rows.iter().map(|r| (r.year, r.primary_category.as_str())).collect::<Vec<_>>(),
            vec![(2020, "Female"), (2020, "Male"), (2021, "Female")]
        );

        // One round trip for the dimension list, one for the Gender rows.
        service.get_enrollment(gender).await.unwrap();
        assert_eq!(store.calls.load(Ordering::SeqCst), 2);

        let all = service.get_enrollment(EnrollmentQuery::default()).await.unwrap();
        assert_eq!(all.len(), 4);
        assert_eq!(store.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn unknown_dimensions_are_not_cached() {
        let store = counting();
        store.inner.load_enrollment(vec![row(2020, "Gender", "Female")]).await;
        let service = DatasetService::new(store.clone(), Duration::from_secs(3600));

        for i in 0..50 {
            let query = EnrollmentQuery { dimension: Some(format!("Bogus{i}")) };
            assert!(service.get_enrollment(query).await.unwrap().is_empty());
        }

        assert_eq!(service.enrollment.len().await, 0);
        // Only the dimension list was loaded, once.
        assert_eq!(store.calls.load(Ordering::SeqCst), 1);
    }
}
