//! Redis-based store implementation.
//!
//! Production backend for multi-process ingestion. Uses `deadpool-redis`
//! for connection pooling. Increment-or-create-with-TTL runs as a short
//! Lua script so the create and the expiry are a single atomic step;
//! the throttle marker uses `SET NX EX`; window reads use `MGET`.
//!
//! # Example
//!
//! ```ignore
//! use mailgate::store::{KvStore, RedisStore, RedisStoreConfig};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RedisStoreConfig::new("redis://localhost:6379")
//!         .with_key_prefix("mailgate");
//!     let store = RedisStore::new(config).await?;
//!
//!     let n = store.incr("2026-08-24-10:15:30", Duration::from_secs(160)).await?;
//!     Ok(())
//! }
//! ```

use super::{KvStore, StoreError};
use async_trait::async_trait;
use deadpool_redis::{Config as PoolConfig, Pool, Runtime};
use redis::AsyncCommands;
use std::collections::HashMap;
use std::time::Duration;

/// INCR that applies the TTL only when the key is created.
const INCR_WITH_TTL: &str = r#"
    local value = redis.call("INCR", KEYS[1])
    if value == 1 and tonumber(ARGV[1]) > 0 then
        redis.call("EXPIRE", KEYS[1], ARGV[1])
    end
    return value
"#;

/// Configuration for the Redis store.
#[derive(Debug, Clone)]
pub struct RedisStoreConfig {
    /// Redis connection URL (e.g., "redis://localhost:6379").
    pub url: String,
    /// Maximum number of connections in the pool.
    pub max_connections: u32,
    /// Prefix prepended to every key.
    pub key_prefix: String,
}

impl RedisStoreConfig {
    /// Creates a new configuration with the given Redis URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 16,
            key_prefix: "mailgate".to_string(),
        }
    }

    /// Sets the maximum number of connections in the pool.
    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the prefix prepended to every key.
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }
}

impl Default for RedisStoreConfig {
    fn default() -> Self {
        Self::new("redis://localhost:6379")
    }
}

/// A Redis-backed [`KvStore`].
///
/// Thread-safe; the connection pool handles concurrent access. Keys are
/// formatted as `{key_prefix}:{key}`.
pub struct RedisStore {
    pool: Pool,
    config: RedisStoreConfig,
}

impl RedisStore {
    /// Creates a new Redis store and verifies connectivity.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Connection`] if the pool cannot be built or
    /// the initial PING fails.
    pub async fn new(config: RedisStoreConfig) -> Result<Self, StoreError> {
        let pool_config = PoolConfig::from_url(&config.url);
        let pool = pool_config
            .builder()
            .map_err(|e| StoreError::Connection(format!("Failed to create pool config: {}", e)))?
            .max_size(config.max_connections as usize)
            .runtime(Runtime::Tokio1)
            .build()
            .map_err(|e| StoreError::Connection(format!("Failed to build pool: {}", e)))?;

        let mut conn = pool
            .get()
            .await
            .map_err(|e| StoreError::Connection(format!("Failed to get connection: {}", e)))?;

        redis::cmd("PING")
            .query_async::<String>(&mut *conn)
            .await
            .map_err(|e| StoreError::Connection(format!("Redis PING failed: {}", e)))?;

        Ok(Self { pool, config })
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}:{}", self.config.key_prefix, key)
    }

    async fn get_conn(&self) -> Result<deadpool_redis::Connection, StoreError> {
        self.pool
            .get()
            .await
            .map_err(|e| StoreError::Connection(format!("Failed to get connection: {}", e)))
    }
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("key_prefix", &self.config.key_prefix)
            .finish()
    }
}

#[async_trait]
impl KvStore for RedisStore {
    async fn incr(&self, key: &str, ttl: Duration) -> Result<i64, StoreError> {
        let full_key = self.full_key(key);
        let mut conn = self.get_conn().await?;

        redis::Script::new(INCR_WITH_TTL)
            .key(&full_key)
            .arg(ttl.as_secs())
            .invoke_async::<i64>(&mut *conn)
            .await
            .map_err(|e| StoreError::Backend(format!("Redis INCR script failed: {}", e)))
    }

    async fn get(&self, key: &str) -> Result<Option<i64>, StoreError> {
        let full_key = self.full_key(key);
        let mut conn = self.get_conn().await?;

        let result: Option<i64> = conn
            .get(&full_key)
            .await
            .map_err(|e| StoreError::Backend(format!("Redis GET failed: {}", e)))?;

        Ok(result)
    }

    async fn get_many(&self, keys: &[String]) -> Result<HashMap<String, i64>, StoreError> {
        if keys.is_empty() {
            return Ok(HashMap::new());
        }

        let full_keys: Vec<String> = keys.iter().map(|k| self.full_key(k)).collect();
        let mut conn = self.get_conn().await?;

        let values: Vec<Option<i64>> = conn
            .mget(&full_keys)
            .await
            .map_err(|e| StoreError::Backend(format!("Redis MGET failed: {}", e)))?;

        let mut results = HashMap::new();
        for (key, value) in keys.iter().zip(values) {
            if let Some(value) = value {
                results.insert(key.clone(), value);
            }
        }

        Ok(results)
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: i64,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let full_key = self.full_key(key);
        let mut conn = self.get_conn().await?;

        let mut cmd = redis::cmd("SET");
        cmd.arg(&full_key).arg(value).arg("NX");
        if !ttl.is_zero() {
            cmd.arg("EX").arg(ttl.as_secs().max(1));
        }

        let result: Option<String> = cmd
            .query_async(&mut *conn)
            .await
            .map_err(|e| StoreError::Backend(format!("Redis SET NX failed: {}", e)))?;

        Ok(result.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = RedisStoreConfig::new("redis://cache:6379")
            .with_max_connections(4)
            .with_key_prefix("mg-test");

        assert_eq!(config.url, "redis://cache:6379");
        assert_eq!(config.max_connections, 4);
        assert_eq!(config.key_prefix, "mg-test");
    }

    #[test]
    fn test_default_config() {
        let config = RedisStoreConfig::default();
        assert_eq!(config.url, "redis://localhost:6379");
        assert_eq!(config.key_prefix, "mailgate");
    }
}
