//! Key-value store port.
//!
//! The registries sit on top of a fast store with native per-key expiry
//! (Redis in production). The store exclusively owns record lifecycles: once
//! a TTL lapses the key is simply gone, no compensating action required.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum KvError {
    #[error("key-value store error: {0}")]
    Backend(String),
}

/// Remaining lifetime of a key.
///
/// Mirrors the Redis TTL probe: `Missing` is `-2` (expired or never existed),
/// `NoExpiry` is `-1`, otherwise the remaining seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTtl {
    Missing,
    NoExpiry,
    Remaining(u64),
}

/// Hash-per-key store with native expiry.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Write all `fields` under `key`, replacing any existing hash, and set
    /// the key to expire after `ttl`. The overwrite is atomic per key.
    async fn put_hash(
        &self,
        key: &str,
        fields: HashMap<String, String>,
        ttl: Duration,
    ) -> Result<(), KvError>;

    /// Fetch the hash at `key`; `None` if the key is absent or expired.
    async fn get_hash(&self, key: &str) -> Result<Option<HashMap<String, String>>, KvError>;

    /// Remove `key`. Returns whether a live key was removed.
    async fn delete(&self, key: &str) -> Result<bool, KvError>;

    async fn exists(&self, key: &str) -> Result<bool, KvError>;

    async fn ttl(&self, key: &str) -> Result<KeyTtl, KvError>;

    /// All live keys starting with `prefix`.
    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>, KvError>;
}
