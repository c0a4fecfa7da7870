//! Session registry: the single live refresh token per identity.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use kardex_core::{TokenId, UserId};

use crate::kv::{KeyValueStore, KvError};

/// Refresh-token record lifetime; refreshed on every rotation.
pub const REFRESH_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

fn refresh_key(user_id: UserId) -> String {
    format!("refresh_token:{user_id}")
}

/// The stored refresh-token record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshRecord {
    pub user_id: UserId,
    pub jti: TokenId,
    pub refresh_token: String,
}

/// Server-side record of the single active refresh token per identity.
///
/// Keyed by identity, not by token: `put` overwrites whatever was there,
/// which is what enforces the at-most-one-session invariant. Natural TTL
/// expiry needs no compensation, since nothing else depends on the record.
#[derive(Clone)]
pub struct SessionRegistry {
    kv: Arc<dyn KeyValueStore>,
}

impl SessionRegistry {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    /// Store `record` as the sole live session for its identity, superseding
    /// any previous one. Resets the TTL to the full window.
    pub async fn put(&self, record: &RefreshRecord) -> Result<(), KvError> {
        let fields = HashMap::from([
            ("user_id".to_string(), record.user_id.to_string()),
            ("jti".to_string(), record.jti.to_string()),
            ("refresh_token".to_string(), record.refresh_token.clone()),
        ]);
        self.kv
            .put_hash(&refresh_key(record.user_id), fields, REFRESH_TTL)
            .await
    }

    pub async fn get(&self, user_id: UserId) -> Result<Option<RefreshRecord>, KvError> {
        let Some(fields) = self.kv.get_hash(&refresh_key(user_id)).await? else {
            return Ok(None);
        };
        Ok(Some(parse_record(user_id, &fields)?))
    }

    pub async fn exists(&self, user_id: UserId) -> Result<bool, KvError> {
        self.kv.exists(&refresh_key(user_id)).await
    }

    /// Explicit revocation (sign-out). Returns whether a session existed.
    pub async fn revoke(&self, user_id: UserId) -> Result<bool, KvError> {
        self.kv.delete(&refresh_key(user_id)).await
    }
}

fn parse_record(
    user_id: UserId,
    fields: &HashMap<String, String>,
) -> Result<RefreshRecord, KvError> {
    let jti = fields
        .get("jti")
        .and_then(|raw| raw.parse::<TokenId>().ok())
        .ok_or_else(|| KvError::Backend("session record missing jti".to_string()))?;
    let refresh_token = fields
        .get("refresh_token")
        .cloned()
        .ok_or_else(|| KvError::Backend("session record missing token".to_string()))?;

    Ok(RefreshRecord {
        user_id,
        jti,
        refresh_token,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::{Duration as ChronoDuration, Utc};
    use kardex_core::ManualClock;

    use crate::memory::InMemoryKeyValueStore;

    fn registry() -> (SessionRegistry, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let kv = Arc::new(InMemoryKeyValueStore::new(clock.clone()));
        (SessionRegistry::new(kv), clock)
    }

    fn record(user_id: UserId, token: &str) -> RefreshRecord {
        RefreshRecord {
            user_id,
            jti: TokenId::new(),
            refresh_token: token.to_string(),
        }
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let (registry, _clock) = registry();
        let user_id = UserId::new();
        let rec = record(user_id, "token-a");

        registry.put(&rec).await.unwrap();
        assert_eq!(registry.get(user_id).await.unwrap(), Some(rec));
    }

    #[tokio::test]
    async fn put_supersedes_the_previous_record() {
        let (registry, _clock) = registry();
        let user_id = UserId::new();

        registry.put(&record(user_id, "old")).await.unwrap();
        let newer = record(user_id, "new");
        registry.put(&newer).await.unwrap();

        let stored = registry.get(user_id).await.unwrap().unwrap();
        assert_eq!(stored.refresh_token, "new");
        assert_eq!(stored.jti, newer.jti);
    }

    #[tokio::test]
    async fn record_expires_with_the_ttl() {
        let (registry, clock) = registry();
        let user_id = UserId::new();

        registry.put(&record(user_id, "token")).await.unwrap();
        clock.advance(ChronoDuration::days(8));

        assert_eq!(registry.get(user_id).await.unwrap(), None);
        assert!(!registry.exists(user_id).await.unwrap());
    }

    #[tokio::test]
    async fn revoke_reports_whether_a_session_existed() {
        let (registry, _clock) = registry();
        let user_id = UserId::new();

        assert!(!registry.revoke(user_id).await.unwrap());
        registry.put(&record(user_id, "token")).await.unwrap();
        assert!(registry.revoke(user_id).await.unwrap());
        assert!(!registry.exists(user_id).await.unwrap());
    }
}
