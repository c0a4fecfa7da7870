//! Identity storage port.
//!
//! The relational store exclusively owns identity and profile rows. Writes
//! that touch both rows (insert, delete, batch delete) are transactional in
//! every implementation: a profile row never outlives or predates its
//! identity.

use async_trait::async_trait;
use thiserror::Error;

use kardex_core::UserId;

use crate::identity::{Identity, Profile};

#[derive(Debug, Error, Clone)]
pub enum StoreError {
    /// Unique-constraint violation on the email column.
    #[error("email already registered")]
    DuplicateEmail,

    #[error("storage error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Insert an identity and its profile in one transaction.
    async fn insert(&self, identity: &Identity, profile: &Profile) -> Result<(), StoreError>;

    async fn find_by_id(&self, id: UserId) -> Result<Option<Identity>, StoreError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, StoreError>;

    /// Persist mutated identity fields (verified, status, updated_at).
    async fn update(&self, identity: &Identity) -> Result<(), StoreError>;

    /// Delete one identity and its profile (profile first) in one
    /// transaction. Returns whether the identity existed.
    async fn delete(&self, id: UserId) -> Result<bool, StoreError>;

    /// Delete a batch of identities and their profiles in one transaction;
    /// all-or-nothing. Returns the number of identities removed.
    async fn delete_batch(&self, ids: &[UserId]) -> Result<u64, StoreError>;

    async fn list_unverified(&self) -> Result<Vec<Identity>, StoreError>;

    async fn list_with_profiles(&self) -> Result<Vec<(Identity, Profile)>, StoreError>;
}
