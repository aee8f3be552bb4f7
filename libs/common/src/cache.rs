//! Key-value cache module shared by the services
//!
//! This module provides the [`KeyValueCache`] abstraction together with a
//! Redis-backed implementation for production and an in-memory implementation
//! for tests and single-node setups.

use anyhow::Result;
use async_trait::async_trait;
use redis::{AsyncCommands, Client, Script};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

/// String key-value store with optional TTL
#[async_trait]
pub trait KeyValueCache: Send + Sync {
    /// Get a value by key
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Set a key-value pair, expiring after `ttl_seconds` when given
    async fn set(&self, key: &str, value: &str, ttl_seconds: Option<u64>) -> Result<()>;

    /// Remove a key; removing a missing key is not an error
    async fn delete(&self, key: &str) -> Result<()>;

    /// Current value of a counter; a missing counter reads as 0
    async fn counter(&self, key: &str) -> Result<u64>;

    /// Increment a counter and return its new value
    async fn increment(&self, key: &str) -> Result<u64>;

    /// Store `value` only while the counter at `guard_key` still equals
    /// `expected`. The check and the write happen atomically.
    ///
    /// Returns whether the value was stored.
    async fn set_if_counter(
        &self,
        key: &str,
        value: &str,
        ttl_seconds: Option<u64>,
        guard_key: &str,
        expected: u64,
    ) -> Result<bool>;
}

/// KEYS[1] value key, KEYS[2] guard counter; ARGV value, expected, ttl (0 = none)
const SET_IF_COUNTER_SCRIPT: &str = r#"
local current = tonumber(redis.call('GET', KEYS[2]) or '0')
if current ~= tonumber(ARGV[2]) then
    return 0
end
local ttl = tonumber(ARGV[3])
if ttl > 0 then
    redis.call('SET', KEYS[1], ARGV[1], 'EX', ttl)
else
    redis.call('SET', KEYS[1], ARGV[1])
end
return 1
"#;

/// Configuration for Redis connection
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Redis connection URL (e.g., "redis://localhost:6379")
    pub url: String,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
}

impl RedisConfig {
    /// Create a new RedisConfig from environment variables
    ///
    /// # Environment Variables
    /// - `REDIS_URL`: Redis connection URL (default: "redis://localhost:6379")
    /// - `REDIS_MAX_CONNECTIONS`: Maximum number of connections (default: 10)
    pub fn from_env() -> Result<Self> {
        let url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());
        let max_connections = std::env::var("REDIS_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(10);

        Ok(RedisConfig {
            url,
            max_connections,
        })
    }
}

/// Redis connection pool
#[derive(Clone)]
pub struct RedisPool {
    client: Client,
}

impl RedisPool {
    /// Initialize a new Redis connection pool
    pub async fn new(config: &RedisConfig) -> Result<Self> {
        let client = Client::open(config.url.clone())?;
        info!(url = %config.url, "Redis client initialized");
        Ok(RedisPool { client })
    }

    async fn get_connection(&self) -> Result<redis::aio::MultiplexedConnection> {
        let conn = self.client.get_multiplexed_async_connection().await?;
        Ok(conn)
    }

    /// Check if Redis is reachable
    pub async fn health_check(&self) -> Result<bool> {
        let mut conn = self.get_connection().await?;
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(pong == "PONG")
    }
}

#[async_trait]
impl KeyValueCache for RedisPool {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.get_connection().await?;
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl_seconds: Option<u64>) -> Result<()> {
        let mut conn = self.get_connection().await?;

        if let Some(ttl) = ttl_seconds {
            let _: () = conn.set_ex(key, value, ttl).await?;
        } else {
            let _: () = conn.set(key, value).await?;
        }

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.get_connection().await?;
        let _: u64 = conn.del(key).await?;
        Ok(())
    }

    async fn counter(&self, key: &str) -> Result<u64> {
        let mut conn = self.get_connection().await?;
        let value: Option<u64> = conn.get(key).await?;
        Ok(value.unwrap_or(0))
    }

    async fn increment(&self, key: &str) -> Result<u64> {
        let mut conn = self.get_connection().await?;
        let value: u64 = conn.incr(key, 1u64).await?;
        Ok(value)
    }

    async fn set_if_counter(
        &self,
        key: &str,
        value: &str,
        ttl_seconds: Option<u64>,
        guard_key: &str,
        expected: u64,
    ) -> Result<bool> {
        let mut conn = self.get_connection().await?;
        let script = Script::new(SET_IF_COUNTER_SCRIPT);
        let stored: i64 = script
            .key(key)
            .key(guard_key)
            .arg(value)
            .arg(expected)
            .arg(ttl_seconds.unwrap_or(0))
            .invoke_async(&mut conn)
            .await?;
        Ok(stored == 1)
    }
}

/// Process-local cache
///
/// TTLs are ignored. Counters live in the same map as the values, so a
/// guarded store checks and writes under one lock. Every `delete` call is
/// journaled so callers can assert which keys were invalidated.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCache {
    entries: Arc<Mutex<HashMap<String, String>>>,
    deleted: Arc<Mutex<Vec<String>>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a key is currently present
    pub async fn contains(&self, key: &str) -> bool {
        self.entries.lock().await.contains_key(key)
    }

    /// Keys passed to `delete`, in call order
    pub async fn deleted_keys(&self) -> Vec<String> {
        self.deleted.lock().await.clone()
    }
}

#[async_trait]
impl KeyValueCache for InMemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str, _ttl_seconds: Option<u64>) -> Result<()> {
        self.entries
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.lock().await.remove(key);
        self.deleted.lock().await.push(key.to_string());
        Ok(())
    }

    async fn counter(&self, key: &str) -> Result<u64> {
        let entries = self.entries.lock().await;
        read_counter(&entries, key)
    }

    async fn increment(&self, key: &str) -> Result<u64> {
        let mut entries = self.entries.lock().await;
        let next = read_counter(&entries, key)? + 1;
        entries.insert(key.to_string(), next.to_string());
        Ok(next)
    }

    async fn set_if_counter(
        &self,
        key: &str,
        value: &str,
        _ttl_seconds: Option<u64>,
        guard_key: &str,
        expected: u64,
    ) -> Result<bool> {
        let mut entries = self.entries.lock().await;
        if read_counter(&entries, guard_key)? != expected {
            return Ok(false);
        }
        entries.insert(key.to_string(), value.to_string());
        Ok(true)
    }
}

fn read_counter(entries: &HashMap<String, String>, key: &str) -> Result<u64> {
    match entries.get(key) {
        Some(raw) => Ok(raw.parse()?),
        None => Ok(0),
    }
}
