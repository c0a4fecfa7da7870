//! Verification registry: outstanding email-verification codes.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;

use kardex_core::UserId;

use crate::kv::{KeyTtl, KeyValueStore, KvError};

/// Verification-code lifetime.
pub const VERIFICATION_TTL: Duration = Duration::from_secs(60 * 60);

/// Key prefix for the verification keyspace (scanned by the reaper).
pub const VERIFICATION_KEY_PREFIX: &str = "verify_email:";

fn verification_key(code: &str) -> String {
    format!("{VERIFICATION_KEY_PREFIX}{code}")
}

/// Generate a 6-digit numeric verification code.
///
/// Random, bounded, effectively unforgeable within the TTL window; no
/// signing needed since the store is trusted and process-scoped.
pub fn generate_code() -> String {
    rand::thread_rng().gen_range(100_000..=999_999).to_string()
}

/// A stored verification-code record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationRecord {
    pub user_id: UserId,
    pub email: String,
    pub code: String,
    pub created_at: DateTime<Utc>,
}

/// Server-side record of outstanding verification codes, keyed by the code
/// itself. Codes are single-use: consumed on success or on the
/// expiry-triggered cleanup path.
#[derive(Clone)]
pub struct VerificationRegistry {
    kv: Arc<dyn KeyValueStore>,
}

impl VerificationRegistry {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    pub async fn put(&self, record: &VerificationRecord) -> Result<(), KvError> {
        let fields = HashMap::from([
            ("user_id".to_string(), record.user_id.to_string()),
            ("email".to_string(), record.email.clone()),
            ("verification_code".to_string(), record.code.clone()),
            ("created_at".to_string(), record.created_at.to_rfc3339()),
        ]);
        self.kv
            .put_hash(&verification_key(&record.code), fields, VERIFICATION_TTL)
            .await
    }

    pub async fn get(&self, code: &str) -> Result<Option<VerificationRecord>, KvError> {
        let Some(fields) = self.kv.get_hash(&verification_key(code)).await? else {
            return Ok(None);
        };
        Ok(Some(parse_record(&fields)?))
    }

    /// Remaining lifetime of a code. `Missing` covers both "expired" and
    /// "never existed"; the store cannot tell them apart.
    pub async fn remaining_ttl(&self, code: &str) -> Result<KeyTtl, KvError> {
        self.kv.ttl(&verification_key(code)).await
    }

    /// Consume a code. Returns whether it was still present.
    pub async fn remove(&self, code: &str) -> Result<bool, KvError> {
        self.kv.delete(&verification_key(code)).await
    }

    /// Identity ids referenced by any currently-live code (full keyspace
    /// scan). These identities are protected from the reaper.
    pub async fn live_user_ids(&self) -> Result<HashSet<UserId>, KvError> {
        let keys = self.kv.scan_prefix(VERIFICATION_KEY_PREFIX).await?;

        let mut ids = HashSet::new();
        for key in keys {
            let Some(fields) = self.kv.get_hash(&key).await? else {
                // Expired between scan and fetch; skip.
                continue;
            };
            if let Some(id) = fields.get("user_id").and_then(|raw| raw.parse().ok()) {
                ids.insert(id);
            }
        }
        Ok(ids)
    }
}

fn parse_record(fields: &HashMap<String, String>) -> Result<VerificationRecord, KvError> {
    let user_id = fields
        .get("user_id")
        .and_then(|raw| raw.parse::<UserId>().ok())
        .ok_or_else(|| KvError::Backend("verification record missing user_id".to_string()))?;
    let email = fields
        .get("email")
        .cloned()
        .ok_or_else(|| KvError::Backend("verification record missing email".to_string()))?;
    let code = fields
        .get("verification_code")
        .cloned()
        .ok_or_else(|| KvError::Backend("verification record missing code".to_string()))?;
    let created_at = fields
        .get("created_at")
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| KvError::Backend("verification record missing created_at".to_string()))?;

    Ok(VerificationRecord {
        user_id,
        email,
        code,
        created_at,
    })
}
