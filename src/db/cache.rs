// db/cache.rs
use std::sync::Arc;

use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands};

use crate::dtos::recommendationdtos::RecommendationEntry;

/// Cache TTL constants (in seconds)
pub const RECOMMENDATION_CACHE_TTL: usize = 600; // 10 minutes

/// Requests for a pair beyond this count promote its result into the cache.
pub const CACHE_THRESHOLD: i64 = 5;

pub fn recommendation_key(user_id: i32, product_id: i32) -> String {
    format!("recommendations:{}:{}", user_id, product_id)
}

pub fn request_count_key(user_id: i32, product_id: i32) -> String {
    format!("request_count:{}:{}", user_id, product_id)
}

/// Raw key-value operations the recommendation cache is built on.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, redis::RedisError>;

    async fn set_ex(&self, key: &str, value: &str, ttl_seconds: usize) -> Result<(), redis::RedisError>;

    /// Atomically add one and return the new value. Missing keys start at 0.
    async fn incr(&self, key: &str) -> Result<i64, redis::RedisError>;

    async fn delete(&self, key: &str) -> Result<(), redis::RedisError>;

    async fn ping(&self) -> Result<bool, redis::RedisError>;
}

/// Redis-backed [`KeyValueStore`]. Cloning shares the managed connection.
#[derive(Clone)]
pub struct CacheClient {
    conn: ConnectionManager,
}

impl std::fmt::Debug for CacheClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheClient").field("conn", &"ConnectionManager").finish()
    }
}

impl CacheClient {
    pub async fn connect(redis_url: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        tracing::info!("✅ Redis connection established successfully");
        Ok(CacheClient { conn })
    }

    pub fn connection(&self) -> ConnectionManager {
        self.conn.clone()
    }
}

#[async_trait]
impl KeyValueStore for CacheClient {
    async fn get(&self, key: &str) -> Result<Option<String>, redis::RedisError> {
        let mut conn = self.connection();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_seconds: usize) -> Result<(), redis::RedisError> {
        let mut conn = self.connection();
        let _: () = conn.set_ex(key, value, ttl_seconds).await?;
        Ok(())
    }

    async fn incr(&self, key: &str) -> Result<i64, redis::RedisError> {
        let mut conn = self.connection();
        let value: i64 = conn.incr(key, 1).await?;
        Ok(value)
    }

    async fn delete(&self, key: &str) -> Result<(), redis::RedisError> {
        let mut conn = self.connection();
        let _: () = conn.del(key).await?;
        Ok(())
    }

    async fn ping(&self) -> Result<bool, redis::RedisError> {
        let mut conn = self.connection();
        let response: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(response == "PONG")
    }
}

/// Cache gateway for recommendation payloads and per-pair request counters.
#[derive(Clone)]
pub struct RecoCache {
    store: Arc<dyn KeyValueStore>,
}

impl RecoCache {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Cached payload for the pair. An entry that no longer decodes is
    /// reported as a miss.
    pub async fn get_recommendations(
        &self,
        user_id: i32,
        product_id: i32,
    ) -> Result<Option<Vec<RecommendationEntry>>, redis::RedisError> {
        let key = recommendation_key(user_id, product_id);
        match self.store.get(&key).await? {
            Some(data) => match serde_json::from_str::<Vec<RecommendationEntry>>(&data) {
                Ok(entries) => {
                    tracing::debug!("Cache HIT: {}", key);
                    Ok(Some(entries))
                }
                Err(e) => {
                    tracing::warn!("Cache deserialization failed for {}: {}", key, e);
                    Ok(None)
                }
            },
            None => {
                tracing::debug!("Cache MISS: {}", key);
                Ok(None)
            }
        }
    }

    pub async fn set_recommendations(
        &self,
        user_id: i32,
        product_id: i32,
        entries: &[RecommendationEntry],
        ttl_seconds: usize,
    ) -> Result<(), redis::RedisError> {
        let key = recommendation_key(user_id, product_id);
        match serde_json::to_string(entries) {
            Ok(json) => {
                self.store.set_ex(&key, &json, ttl_seconds).await?;
                tracing::debug!("Cache SET: {} (TTL: {}s)", key, ttl_seconds);
            }
            Err(e) => tracing::warn!("Cache serialization failed for {}: {}", key, e),
        }
        Ok(())
    }

    pub async fn invalidate_recommendations(
        &self,
        user_id: i32,
        product_id: i32,
    ) -> Result<(), redis::RedisError> {
        let key = recommendation_key(user_id, product_id);
        self.store.delete(&key).await?;
        tracing::debug!("Cache DELETE: {}", key);
        Ok(())
    }

    pub async fn increment_request_count(
        &self,
        user_id: i32,
        product_id: i32,
    ) -> Result<i64, redis::RedisError> {
        self.store.incr(&request_count_key(user_id, product_id)).await
    }

    pub async fn health_check(&self) -> Result<bool, redis::RedisError> {
        self.store.ping().await
    }
}
