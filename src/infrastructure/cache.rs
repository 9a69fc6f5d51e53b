use std::time::{Duration, Instant};

use dashmap::DashMap;
use redis::Commands;

use crate::domain::ports::{CacheError, HistoryCache};

pub type RedisPool = r2d2::Pool<redis::Client>;

impl From<redis::RedisError> for CacheError {
    fn from(e: redis::RedisError) -> Self {
        CacheError::Backend(e.to_string())
    }
}

impl From<r2d2::Error> for CacheError {
    fn from(e: r2d2::Error) -> Self {
        CacheError::Backend(e.to_string())
    }
}

pub fn create_redis_pool(redis_url: &str) -> Result<RedisPool, CacheError> {
    let client = redis::Client::open(redis_url)?;
    Ok(r2d2::Pool::builder().build(client)?)
}

pub struct RedisHistoryCache {
    pool: RedisPool,
}

impl RedisHistoryCache {
    pub fn new(pool: RedisPool) -> Self {
        Self { pool }
    }
}

impl HistoryCache for RedisHistoryCache {
    fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.pool.get()?;
        let value: Option<String> = conn.get(key)?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.pool.get()?;
        // SETEX rejects a zero expiry
        let seconds = ttl.as_secs().max(1);
        conn.set_ex::<_, _, ()>(key, value, seconds)?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.pool.get()?;
        conn.del::<_, ()>(key)?;
        Ok(())
    }
}

/// Process-local cache used when no redis URL is configured and in tests.
#[derive(Default)]
pub struct InMemoryHistoryCache {
    entries: DashMap<String, (String, Instant)>,
}

impl InMemoryHistoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl HistoryCache for InMemoryHistoryCache {
    fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let now = Instant::now();
        let hit = self.entries.get(key).and_then(|entry| {
            let (value, expires_at) = entry.value();
            (*expires_at > now).then(|| value.clone())
        });
        if hit.is_none() {
            self.entries.remove_if(key, |_, (_, expires_at)| *expires_at <= now);
        }
        Ok(hit)
    }

    fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        self.entries
            .insert(key.to_string(), (value.to_string(), Instant::now() + ttl));
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_cache_set_get_delete() {
        let cache = InMemoryHistoryCache::new();
        cache.set("1", "[]", Duration::from_secs(60)).unwrap();
        assert_eq!(cache.get("1").unwrap(), Some("[]".to_string()));

        cache.delete("1").unwrap();
        assert_eq!(cache.get("1").unwrap(), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn in_memory_cache_expires_entries() {
        let cache = InMemoryHistoryCache::new();
        cache.set("1", "[]", Duration::ZERO).unwrap();
        assert_eq!(cache.get("1").unwrap(), None);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn redis_pool_rejects_malformed_url() {
        assert!(create_redis_pool("not a url").is_err());
    }
}
