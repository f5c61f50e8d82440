use moka::future::Cache;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, Result};

/// TTL cache for backend responses, keyed by request fingerprint.
///
/// `get_or_fetch` collapses concurrent lookups of the same key into one
/// execution of the fetch future; every waiter receives the same outcome.
/// A failed fetch reaches all waiters and is never stored, so an error
/// cannot poison the key.
#[derive(Clone)]
pub struct ResultCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    cache: Cache<String, V>,
}

impl<V> ResultCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(max_capacity: u64, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(ttl)
            .build();

        Self { cache }
    }

    pub async fn get(&self, key: &str) -> Option<V> {
        self.cache.get(key).await
    }

    pub async fn insert(&self, key: String, value: V) {
        self.cache.insert(key, value).await;
    }

    pub async fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }

    /// Resolve `key` from the cache, running `fetch` on a miss.
    pub async fn get_or_fetch<F>(&self, key: &str, fetch: F) -> Result<V>
    where
        F: Future<Output = Result<V>>,
    {
        self.cache
            .try_get_with(key.to_string(), fetch)
            .await
            .map_err(|shared: Arc<Error>| (*shared).clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_cache_basic_operations() {
        let cache = ResultCache::new(100, Duration::from_secs(60));

        cache.insert("key1".to_string(), "value1".to_string()).await;

        let value = cache.get("key1").await;
        assert_eq!(value, Some("value1".to_string()));
        assert_eq!(cache.get("missing").await, None);
    }

    #[tokio::test]
    async fn test_cache_ttl() {
        let cache = ResultCache::new(100, Duration::from_millis(100));

        cache.insert("key".to_string(), "value".to_string()).await;

        // Value should be present immediately
        assert!(cache.get("key").await.is_some());

        // Wait for TTL to expire
        tokio::time::sleep(Duration::from_millis(150)).await;

        // Value should be expired
        assert!(cache.get("key").await.is_none());
    }

    #[tokio::test]
    async fn test_get_or_fetch_runs_fetch_once() {
        let cache: ResultCache<String> = ResultCache::new(100, Duration::from_secs(60));
        let fetches = AtomicUsize::new(0);

        for _ in 0..3 {
            let value = cache
                .get_or_fetch("key", async {
                    fetches.fetch_add(1, Ordering::SeqCst);
                    Ok("value".to_string())
                })
                .await
                .unwrap();
            assert_eq!(value, "value");
        }

        assert_eq!(fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_get_or_fetch_coalesces_concurrent_callers() {
        let cache: ResultCache<String> = ResultCache::new(100, Duration::from_secs(60));
        let fetches = Arc::new(AtomicUsize::new(0));

        let slow_fetch = |fetches: Arc<AtomicUsize>| async move {
            fetches.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok("value".to_string())
        };

        let (a, b) = tokio::join!(
            cache.get_or_fetch("key", slow_fetch(fetches.clone())),
            cache.get_or_fetch("key", slow_fetch(fetches.clone())),
        );

        assert_eq!(a.unwrap(), "value");
        assert_eq!(b.unwrap(), "value");
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_fetch_is_not_cached() {
        let cache: ResultCache<String> = ResultCache::new(100, Duration::from_secs(60));
        let fetches = AtomicUsize::new(0);

        let err = cache
            .get_or_fetch("key", async {
                fetches.fetch_add(1, Ordering::SeqCst);
                Err(Error::Transport("connection reset".to_string()))
            })
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "TRANSPORT_ERROR");

        let value = cache
            .get_or_fetch("key", async {
                fetches.fetch_add(1, Ordering::SeqCst);
                Ok("recovered".to_string())
            })
            .await
            .unwrap();
        assert_eq!(value, "recovered");
        assert_eq!(fetches.load(Ordering::SeqCst), 2);

        // Third call must hit the cached success
        let cached = cache
            .get_or_fetch("key", async {
                fetches.fetch_add(1, Ordering::SeqCst);
                Ok("fresh".to_string())
            })
            .await
            .unwrap();
        assert_eq!(cached, "recovered");
        assert_eq!(fetches.load(Ordering::SeqCst), 2);
    }
}
