//! Identity and profile entities.

use chrono::{DateTime, Duration, Utc};
use core::str::FromStr;
use serde::{Deserialize, Serialize};

use kardex_auth::Role;
use kardex_core::{DomainError, DomainResult, UserId};

/// Session-facing account state.
///
/// Independent of `verified`: an account becomes `Active` on sign-in and
/// `Inactive` on sign-out (or at creation).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountStatus {
    Active,
    Inactive,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Active => "ACTIVE",
            AccountStatus::Inactive => "INACTIVE",
        }
    }
}

impl core::fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(AccountStatus::Active),
            "INACTIVE" => Ok(AccountStatus::Inactive),
            other => Err(DomainError::validation(format!(
                "unknown account status: {other}"
            ))),
        }
    }
}

/// Canonical email form used for storage and lookups.
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// An account row.
///
/// # Invariants
/// - `email` is unique across all identities (enforced by the store).
/// - Created unverified and inactive; verification and session state advance
///   independently of each other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub password_digest: String,
    pub role: Role,
    pub verified: bool,
    pub status: AccountStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Identity {
    /// Create a fresh, unverified account.
    pub fn new_unverified(
        username: &str,
        email: &str,
        password_digest: String,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let username = username.trim();
        if username.is_empty() {
            return Err(DomainError::validation("username cannot be empty"));
        }

        let email = normalize_email(email);
        if email.is_empty() || !email.contains('@') {
            return Err(DomainError::validation("invalid email format"));
        }

        Ok(Self {
            id: UserId::new(),
            username: username.to_string(),
            email,
            password_digest,
            role: Role::User,
            verified: false,
            status: AccountStatus::Inactive,
            created_at: now,
            updated_at: now,
        })
    }

    /// Mark the account as email-verified.
    pub fn verify(&mut self, now: DateTime<Utc>) {
        self.verified = true;
        self.updated_at = now;
    }

    pub fn set_status(&mut self, status: AccountStatus, now: DateTime<Utc>) {
        self.status = status;
        self.updated_at = now;
    }

    /// Time elapsed since the account was created.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.created_at
    }
}

/// Dependent profile row, cascade-deleted with its identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub user_id: UserId,
    pub full_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    pub fn new(user_id: UserId, full_name: &str, now: DateTime<Utc>) -> DomainResult<Self> {
        let full_name = full_name.trim();
        if full_name.is_empty() {
            return Err(DomainError::validation("full name cannot be empty"));
        }

        Ok(Self {
            user_id,
            full_name: full_name.to_string(),
            created_at: now,
            updated_at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_account_starts_unverified_and_inactive() {
        let identity =
            Identity::new_unverified("alice", "Alice@Example.com", "digest".into(), Utc::now())
                .unwrap();

        assert!(!identity.verified);
        assert_eq!(identity.status, AccountStatus::Inactive);
        assert_eq!(identity.role, Role::User);
        assert_eq!(identity.email, "alice@example.com");
    }

    #[test]
    fn invalid_email_is_rejected() {
        let result = Identity::new_unverified("alice", "not-an-email", "d".into(), Utc::now());
        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[test]
    fn blank_username_is_rejected() {
        let result = Identity::new_unverified("   ", "a@b.com", "d".into(), Utc::now());
        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[test]
    fn verify_flips_the_flag_and_touches_updated_at() {
        let created = Utc::now();
        let mut identity =
            Identity::new_unverified("alice", "a@b.com", "d".into(), created).unwrap();

        let later = created + Duration::minutes(5);
        identity.verify(later);

        assert!(identity.verified);
        assert_eq!(identity.updated_at, later);
        assert_eq!(identity.created_at, created);
    }

    #[test]
    fn age_grows_with_the_clock() {
        let created = Utc::now();
        let identity = Identity::new_unverified("alice", "a@b.com", "d".into(), created).unwrap();

        assert_eq!(identity.age(created + Duration::hours(2)), Duration::hours(2));
    }

    #[test]
    fn blank_full_name_is_rejected() {
        let result = Profile::new(UserId::new(), "  ", Utc::now());
        assert!(matches!(result, Err(DomainError::Validation(_))));
    }
}
