//! Redis-backed queue store
//!
//! Maps the [`QueueStore`] capability set onto sorted-set and string
//! commands. Batches are sent as a single `MULTI`/`EXEC` pipeline.

use crate::error::{MatchmakingError, Result};
use crate::store::provider::{QueueStore, StoreBatch, StoreOp};
use ::redis::aio::ConnectionManager;
use ::redis::{AsyncCommands, Client, RedisError};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info};

/// Redis connection settings
#[derive(Debug, Clone)]
pub struct RedisStoreConfig {
    pub url: String,
}

impl Default for RedisStoreConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379/".to_string(),
        }
    }
}

/// Queue store backed by a Redis (or compatible) server
#[derive(Clone)]
pub struct RedisQueueStore {
    connection: ConnectionManager,
}

fn infrastructure(context: &str, error: RedisError) -> anyhow::Error {
    MatchmakingError::Infrastructure {
        message: format!("{}: {}", context, error),
    }
    .into()
}

/// Redis `SET EX` takes whole seconds; round up so entries never expire early
fn expiry_seconds(ttl: Duration) -> u64 {
    let secs = ttl.as_secs();
    if ttl.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs.max(1)
    }
}

impl RedisQueueStore {
    /// Connect to the server at `config.url`
    pub async fn connect(config: &RedisStoreConfig) -> Result<Self> {
        info!("Connecting to Redis store at {}", config.url);

        let client =
            Client::open(config.url.as_str()).map_err(|e| MatchmakingError::ConfigurationError {
                message: format!("Invalid Redis URL '{}': {}", config.url, e),
            })?;

        let connection = ConnectionManager::new(client)
            .await
            .map_err(|e| infrastructure("Failed to connect to Redis", e))?;

        info!("Successfully connected to Redis store");
        Ok(Self { connection })
    }

    fn build_pipeline(batch: StoreBatch) -> ::redis::Pipeline {
        let mut pipe = ::redis::pipe();
        pipe.atomic();

        for op in batch.into_ops() {
            match op {
                StoreOp::OrderedInsert { key, score, member } => {
                    pipe.zadd(key, member, score).ignore();
                }
                StoreOp::OrderedRemove { key, members } => {
                    if !members.is_empty() {
                        pipe.zrem(key, members).ignore();
                    }
                }
                StoreOp::PutWithExpiry { key, value, ttl } => {
                    pipe.set_ex(key, value, expiry_seconds(ttl)).ignore();
                }
                StoreOp::Delete { key } => {
                    pipe.del(key).ignore();
                }
            }
        }

        pipe
    }
}

#[async_trait]
impl QueueStore for RedisQueueStore {
    async fn ordered_insert(&self, key: &str, score: i64, member: &str) -> Result<()> {
        let mut conn = self.connection.clone();
        let _: () = conn
            .zadd(key, member, score)
            .await
            .map_err(|e| infrastructure("ZADD failed", e))?;
        Ok(())
    }

    async fn ordered_remove(&self, key: &str, members: &[String]) -> Result<usize> {
        if members.is_empty() {
            return Ok(0);
        }
        let mut conn = self.connection.clone();
        let removed: usize = conn
            .zrem(key, members)
            .await
            .map_err(|e| infrastructure("ZREM failed", e))?;
        Ok(removed)
    }

    async fn ordered_range_by_rank(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<String>> {
        let mut conn = self.connection.clone();
        conn.zrange(key, start, stop)
            .await
            .map_err(|e| infrastructure("ZRANGE failed", e))
    }

    async fn ordered_count(&self, key: &str) -> Result<u64> {
        let mut conn = self.connection.clone();
        conn.zcard(key)
            .await
            .map_err(|e| infrastructure("ZCARD failed", e))
    }

    async fn put_with_expiry(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let mut conn = self.connection.clone();
        let _: () = conn
            .set_ex(key, value, expiry_seconds(ttl))
            .await
            .map_err(|e| infrastructure("SET EX failed", e))?;
        Ok(())
    }

    async fn batch_get(&self, keys: &[String]) -> Result<Vec<Option<String>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.connection.clone();
        // Explicit MGET: the typed helper degrades to GET for a single key
        ::redis::cmd("MGET")
            .arg(keys)
            .query_async(&mut conn)
            .await
            .map_err(|e| infrastructure("MGET failed", e))
    }

    async fn execute(&self, batch: StoreBatch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let op_count = batch.len();
        let pipe = Self::build_pipeline(batch);

        let mut conn = self.connection.clone();
        let _: () = pipe
            .query_async(&mut conn)
            .await
            .map_err(|e| infrastructure("Pipeline execution failed", e))?;

        debug!("Executed Redis pipeline with {} operations", op_count);
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.connection.clone();
        let _: String = ::redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| infrastructure("PING failed", e))?;
        Ok(())
    }
}
