//! Redis-backed key-value store.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;

use kardex_accounts::kv::{KeyTtl, KeyValueStore, KvError};

fn wrap(e: redis::RedisError) -> KvError {
    KvError::Backend(e.to_string())
}

/// Key-value store over a shared Redis client.
///
/// The client hands out multiplexed connections and is safe to share across
/// request handlers; per-key TTLs are enforced by Redis itself.
#[derive(Clone)]
pub struct RedisKeyValueStore {
    client: redis::Client,
}

impl RedisKeyValueStore {
    pub fn new(redis_url: impl AsRef<str>) -> Result<Self, KvError> {
        let client = redis::Client::open(redis_url.as_ref()).map_err(wrap)?;
        Ok(Self { client })
    }

    async fn conn(&self) -> Result<redis::aio::MultiplexedConnection, KvError> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(wrap)
    }
}

#[async_trait]
impl KeyValueStore for RedisKeyValueStore {
    async fn put_hash(
        &self,
        key: &str,
        fields: HashMap<String, String>,
        ttl: Duration,
    ) -> Result<(), KvError> {
        let mut conn = self.conn().await?;
        let fields: Vec<(String, String)> = fields.into_iter().collect();

        // DEL + HSET + EXPIRE as one atomic unit, so the overwrite replaces
        // the whole hash and the key never lingers without a TTL.
        let _: () = redis::pipe()
            .atomic()
            .del(key)
            .hset_multiple(key, &fields)
            .expire(key, ttl.as_secs() as i64)
            .query_async(&mut conn)
            .await
            .map_err(wrap)?;
        Ok(())
    }

    async fn get_hash(&self, key: &str) -> Result<Option<HashMap<String, String>>, KvError> {
        let mut conn = self.conn().await?;
        let fields: HashMap<String, String> = conn.hgetall(key).await.map_err(wrap)?;
        // HGETALL on a missing key yields an empty map.
        Ok(if fields.is_empty() { None } else { Some(fields) })
    }

    async fn delete(&self, key: &str) -> Result<bool, KvError> {
        let mut conn = self.conn().await?;
        let removed: i64 = conn.del(key).await.map_err(wrap)?;
        Ok(removed > 0)
    }

    async fn exists(&self, key: &str) -> Result<bool, KvError> {
        let mut conn = self.conn().await?;
        conn.exists(key).await.map_err(wrap)
    }

    async fn ttl(&self, key: &str) -> Result<KeyTtl, KvError> {
        let mut conn = self.conn().await?;
        let ttl: i64 = conn.ttl(key).await.map_err(wrap)?;
        Ok(match ttl {
            -2 => KeyTtl::Missing,
            -1 => KeyTtl::NoExpiry,
            n => KeyTtl::Remaining(n.max(0) as u64),
        })
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>, KvError> {
        let mut conn = self.conn().await?;
        let mut keys = Vec::new();
        let mut iter = conn
            .scan_match::<_, String>(format!("{prefix}*"))
            .await
            .map_err(wrap)?;
        while let Some(key) = iter.next_item().await {
            keys.push(key);
        }
        Ok(keys)
    }
}
