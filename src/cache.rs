//! Best-effort response caching.
//!
//! The correlation registry memoizes successful lookups through the
//! [`ResponseCache`] port; consumers treat every cache interaction as
//! best-effort and never let a cache failure propagate.

use async_trait::async_trait;
use moka::future::Cache;
use std::time::Duration;

/// Port for memoizing resolved responses, keyed by correlation key.
#[async_trait]
pub trait ResponseCache<T>: Send + Sync
where
    T: Send + Sync + 'static,
{
    async fn get(&self, key: &str) -> Option<T>;

    async fn put(&self, key: &str, value: T) -> anyhow::Result<()>;
}

/// In-process cache backed by Moka, with bounded capacity and TTL
#[derive(Clone)]
pub struct MemoryResponseCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    cache: Cache<String, T>,
}

impl<T> MemoryResponseCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(max_capacity: u64, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(ttl)
            .build();

        Self { cache }
    }

    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}

#[async_trait]
impl<T> ResponseCache<T> for MemoryResponseCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &str) -> Option<T> {
        self.cache.get(key).await
    }

    async fn put(&self, key: &str, value: T) -> anyhow::Result<()> {
        self.cache.insert(key.to_string(), value).await;
        Ok(())
    }
}
