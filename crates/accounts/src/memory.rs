//! In-memory port implementations for tests and local development.
//!
//! The key-value store takes an injected [`Clock`] so TTL-dependent
//! scenarios can be driven deterministically with a manual clock.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use kardex_core::{Clock, UserId};

use crate::identity::{Identity, Profile};
use crate::kv::{KeyTtl, KeyValueStore, KvError};
use crate::mailer::{MailError, Mailer};
use crate::store::{IdentityStore, StoreError};

struct Entry {
    fields: HashMap<String, String>,
    expires_at: Option<DateTime<Utc>>,
    /// Expired but still readable through `get_hash` (see
    /// [`InMemoryKeyValueStore::force_expire`]).
    lingering: bool,
}

impl Entry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(at) if at <= now)
    }
}

/// Hash-per-key store with clock-driven expiry.
///
/// Expired keys are dropped lazily on access, which is indistinguishable from
/// the real store's behavior through the port.
pub struct InMemoryKeyValueStore {
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<String, Entry>>,
}

impl InMemoryKeyValueStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Expire `key` while keeping its hash readable.
    ///
    /// Reproduces the backend race where a hash read succeeds just as the
    /// key's TTL lapses, so the subsequent TTL probe reports the key gone.
    /// The flows defend against exactly that window; tests use this to drive
    /// the destructive expired-code path deterministically.
    pub fn force_expire(&self, key: &str) {
        let mut entries = self.entries.lock().unwrap();
        if let Some(entry) = entries.get_mut(key) {
            entry.expires_at = Some(self.clock.now() - chrono::Duration::seconds(1));
            entry.lingering = true;
        }
    }

    fn purge_expired(&self, entries: &mut HashMap<String, Entry>) {
        let now = self.clock.now();
        entries.retain(|_, entry| entry.lingering || !entry.is_expired(now));
    }
}

#[async_trait]
impl KeyValueStore for InMemoryKeyValueStore {
    async fn put_hash(
        &self,
        key: &str,
        fields: HashMap<String, String>,
        ttl: Duration,
    ) -> Result<(), KvError> {
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| KvError::Backend(format!("ttl out of range: {e}")))?;

        let mut entries = self.entries.lock().unwrap();
        entries.insert(
            key.to_string(),
            Entry {
                fields,
                expires_at: Some(self.clock.now() + ttl),
                lingering: false,
            },
        );
        Ok(())
    }

    async fn get_hash(&self, key: &str) -> Result<Option<HashMap<String, String>>, KvError> {
        let mut entries = self.entries.lock().unwrap();
        self.purge_expired(&mut entries);
        Ok(entries.get(key).map(|entry| entry.fields.clone()))
    }

    async fn delete(&self, key: &str) -> Result<bool, KvError> {
        let mut entries = self.entries.lock().unwrap();
        self.purge_expired(&mut entries);
        Ok(entries.remove(key).is_some())
    }

    async fn exists(&self, key: &str) -> Result<bool, KvError> {
        let now = self.clock.now();
        let mut entries = self.entries.lock().unwrap();
        self.purge_expired(&mut entries);
        Ok(entries.get(key).is_some_and(|entry| !entry.is_expired(now)))
    }

    async fn ttl(&self, key: &str) -> Result<KeyTtl, KvError> {
        let now = self.clock.now();
        let mut entries = self.entries.lock().unwrap();
        self.purge_expired(&mut entries);

        let Some(entry) = entries.get(key) else {
            return Ok(KeyTtl::Missing);
        };
        if entry.is_expired(now) {
            return Ok(KeyTtl::Missing);
        }

        match entry.expires_at {
            None => Ok(KeyTtl::NoExpiry),
            Some(at) => {
                let remaining = (at - now).num_seconds().max(0);
                Ok(KeyTtl::Remaining(remaining as u64))
            }
        }
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>, KvError> {
        let now = self.clock.now();
        let mut entries = self.entries.lock().unwrap();
        self.purge_expired(&mut entries);
        Ok(entries
            .iter()
            .filter(|(key, entry)| key.starts_with(prefix) && !entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect())
    }
}

/// Identity store over a process-local map.
#[derive(Default)]
pub struct InMemoryIdentityStore {
    rows: Mutex<HashMap<UserId, (Identity, Profile)>>,
}

impl InMemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IdentityStore for InMemoryIdentityStore {
    async fn insert(&self, identity: &Identity, profile: &Profile) -> Result<(), StoreError> {
        let mut rows = self.rows.lock().unwrap();
        if rows.values().any(|(i, _)| i.email == identity.email) {
            return Err(StoreError::DuplicateEmail);
        }
        rows.insert(identity.id, (identity.clone(), profile.clone()));
        Ok(())
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<Identity>, StoreError> {
        let rows = self.rows.lock().unwrap();
        Ok(rows.get(&id).map(|(identity, _)| identity.clone()))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, StoreError> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .values()
            .find(|(identity, _)| identity.email == email)
            .map(|(identity, _)| identity.clone()))
    }

    async fn update(&self, identity: &Identity) -> Result<(), StoreError> {
        let mut rows = self.rows.lock().unwrap();
        match rows.get_mut(&identity.id) {
            Some((existing, _)) => {
                *existing = identity.clone();
                Ok(())
            }
            None => Err(StoreError::Backend("identity not found".to_string())),
        }
    }

    async fn delete(&self, id: UserId) -> Result<bool, StoreError> {
        let mut rows = self.rows.lock().unwrap();
        Ok(rows.remove(&id).is_some())
    }

    async fn delete_batch(&self, ids: &[UserId]) -> Result<u64, StoreError> {
        let mut rows = self.rows.lock().unwrap();
        let mut deleted = 0;
        for id in ids {
            if rows.remove(id).is_some() {
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    async fn list_unverified(&self) -> Result<Vec<Identity>, StoreError> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .values()
            .filter(|(identity, _)| !identity.verified)
            .map(|(identity, _)| identity.clone())
            .collect())
    }

    async fn list_with_profiles(&self) -> Result<Vec<(Identity, Profile)>, StoreError> {
        let rows = self.rows.lock().unwrap();
        let mut all: Vec<_> = rows.values().cloned().collect();
        all.sort_by_key(|(identity, _)| identity.created_at);
        Ok(all)
    }
}

/// A sent message captured by [`RecordingMailer`].
#[derive(Debug, Clone)]
pub struct SentMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Mailer that records instead of sending; can be switched into a failing
/// mode to exercise the delivery-failure path.
#[derive(Default)]
pub struct RecordingMailer {
    outbox: Mutex<Vec<SentMail>>,
    failing: AtomicBool,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn outbox(&self) -> Vec<SentMail> {
        self.outbox.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(MailError::Delivery("relay unavailable".to_string()));
        }
        self.outbox.lock().unwrap().push(SentMail {
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}
