//! Account flows: the orchestrator behind the auth endpoints.
//!
//! Composes the identity store, the two registries, the token signer, the
//! password hasher and the mailer. All lookup/validation failures surface as
//! typed [`FlowError`] values with user-safe messages; backend failures are
//! collapsed into `FlowError::Internal` so no store detail leaks to callers.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, instrument, warn};

use kardex_auth::{authorize, CredentialHasher, HashError, Role, SignedToken, TokenSigner};
use kardex_core::{Clock, DomainError, UserId};

use crate::identity::{normalize_email, AccountStatus, Identity, Profile};
use crate::kv::{KeyTtl, KvError};
use crate::mailer::{MailError, Mailer};
use crate::session::{RefreshRecord, SessionRegistry};
use crate::store::{IdentityStore, StoreError};
use crate::verification::{generate_code, VerificationRecord, VerificationRegistry};

#[derive(Debug, Error)]
pub enum FlowError {
    #[error("account already exists")]
    Conflict,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("account not verified")]
    NotVerified,

    #[error("verification code is invalid or has expired")]
    InvalidOrExpiredCode,

    /// The code's TTL lapsed between issuance and presentation; the owning
    /// account has been removed as a side effect.
    #[error("verification code expired; the account has been removed")]
    CodeExpired,

    #[error("verification code does not match")]
    CodeMismatch,

    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden: administrator role required")]
    Forbidden,

    #[error("not found")]
    NotFound,

    #[error("session already closed")]
    AlreadySignedOut,

    #[error("verification email could not be delivered")]
    EmailDelivery,

    #[error("validation failed: {0}")]
    Validation(String),

    /// Unexpected backend failure; detail is logged, not surfaced.
    #[error("internal error")]
    Internal(String),
}

impl From<StoreError> for FlowError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateEmail => FlowError::Conflict,
            StoreError::Backend(detail) => FlowError::Internal(detail),
        }
    }
}

impl From<KvError> for FlowError {
    fn from(err: KvError) -> Self {
        let KvError::Backend(detail) = err;
        FlowError::Internal(detail)
    }
}

impl From<HashError> for FlowError {
    fn from(err: HashError) -> Self {
        FlowError::Internal(err.to_string())
    }
}

impl From<DomainError> for FlowError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(msg) => FlowError::Validation(msg),
            other => FlowError::Internal(other.to_string()),
        }
    }
}

/// Sign-up input.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub password: String,
    pub full_name: String,
}

/// Result of a successful sign-in or refresh: a fresh access token plus the
/// refresh token the caller must carry back as a cookie.
#[derive(Debug, Clone)]
pub struct SignInOutcome {
    pub user_id: UserId,
    pub access: SignedToken,
    pub refresh: SignedToken,
}

pub struct AccountFlows {
    store: Arc<dyn IdentityStore>,
    sessions: SessionRegistry,
    verifications: VerificationRegistry,
    signer: Arc<TokenSigner>,
    hasher: Arc<dyn CredentialHasher>,
    mailer: Arc<dyn Mailer>,
    clock: Arc<dyn Clock>,
}

impl AccountFlows {
    pub fn new(
        store: Arc<dyn IdentityStore>,
        sessions: SessionRegistry,
        verifications: VerificationRegistry,
        signer: Arc<TokenSigner>,
        hasher: Arc<dyn CredentialHasher>,
        mailer: Arc<dyn Mailer>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            sessions,
            verifications,
            signer,
            hasher,
            mailer,
            clock,
        }
    }

    /// Create an unverified account, register a verification code and mail it.
    ///
    /// The identity row commits before the email goes out; a delivery failure
    /// surfaces as [`FlowError::EmailDelivery`] while the row remains, to be
    /// verified via a later code or reclaimed by the reaper.
    #[instrument(skip_all, fields(email = %account.email))]
    pub async fn sign_up(&self, account: NewAccount) -> Result<UserId, FlowError> {
        let email = normalize_email(&account.email);
        if self.store.find_by_email(&email).await?.is_some() {
            return Err(FlowError::Conflict);
        }

        let digest = self.hasher.hash(&account.password)?;
        let now = self.clock.now();
        let identity = Identity::new_unverified(&account.username, &account.email, digest, now)?;
        let profile = Profile::new(identity.id, &account.full_name, now)?;

        self.store.insert(&identity, &profile).await?;

        let code = generate_code();
        self.verifications
            .put(&VerificationRecord {
                user_id: identity.id,
                email: identity.email.clone(),
                code: code.clone(),
                created_at: now,
            })
            .await?;

        info!(user_id = %identity.id, "account created, dispatching verification email");

        if let Err(MailError::Delivery(detail)) = self
            .mailer
            .send(
                &identity.email,
                "Account verification",
                &format!(
                    "Use the verification code {code} to activate your account. \
                     The code expires in 1 hour."
                ),
            )
            .await
        {
            // The account stays: it can still be verified by requesting a new
            // code, or the reaper reclaims it after the window lapses.
            warn!(user_id = %identity.id, error = %detail, "verification email failed");
            return Err(FlowError::EmailDelivery);
        }

        Ok(identity.id)
    }

    /// Consume a verification code and mark its account verified.
    ///
    /// If the store reports the code's TTL as already lapsed, the owning
    /// account and its profile are deleted and [`FlowError::CodeExpired`] is
    /// returned: a destructive side effect coupled to the read.
    #[instrument(skip_all)]
    pub async fn verify_email(&self, code: &str) -> Result<(), FlowError> {
        let record = self
            .verifications
            .get(code)
            .await?
            .ok_or(FlowError::InvalidOrExpiredCode)?;

        if self.verifications.remaining_ttl(code).await? == KeyTtl::Missing {
            if self.store.find_by_id(record.user_id).await?.is_some() {
                self.store.delete(record.user_id).await?;
            }
            self.verifications.remove(code).await?;
            info!(user_id = %record.user_id, "expired verification code; account removed");
            return Err(FlowError::CodeExpired);
        }

        let mut identity = self
            .store
            .find_by_id(record.user_id)
            .await?
            .ok_or(FlowError::NotFound)?;

        // Structurally guaranteed by the lookup key; kept as a guard against
        // a corrupted record.
        if record.code != code {
            return Err(FlowError::CodeMismatch);
        }

        identity.verify(self.clock.now());
        self.store.update(&identity).await?;
        self.verifications.remove(code).await?;

        info!(user_id = %identity.id, "account verified");
        Ok(())
    }

    /// Authenticate and open a session.
    ///
    /// Failure shape is uniform: an unknown email and a wrong password are
    /// indistinguishable to the caller.
    #[instrument(skip_all, fields(email = %email))]
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<SignInOutcome, FlowError> {
        let email = normalize_email(email);
        let Some(mut identity) = self.store.find_by_email(&email).await? else {
            return Err(FlowError::InvalidCredentials);
        };

        if !self.hasher.verify(password, &identity.password_digest) {
            return Err(FlowError::InvalidCredentials);
        }

        if !identity.verified {
            return Err(FlowError::NotVerified);
        }

        // Supersede any previous session before issuing the new one.
        self.sessions.revoke(identity.id).await?;

        let access = self.issue_access(identity.id)?;
        let refresh = self.issue_refresh(identity.id)?;

        self.sessions
            .put(&RefreshRecord {
                user_id: identity.id,
                jti: refresh.jti,
                refresh_token: refresh.token.clone(),
            })
            .await?;

        identity.set_status(AccountStatus::Active, self.clock.now());
        self.store.update(&identity).await?;

        info!(user_id = %identity.id, "signed in");
        Ok(SignInOutcome {
            user_id: identity.id,
            access,
            refresh,
        })
    }

    /// Close the account's session and mark it inactive.
    #[instrument(skip_all, fields(user_id = %user_id))]
    pub async fn sign_out(&self, user_id: UserId) -> Result<(), FlowError> {
        let mut identity = self
            .store
            .find_by_id(user_id)
            .await?
            .ok_or(FlowError::NotFound)?;

        if !self.sessions.exists(user_id).await? {
            return Err(FlowError::AlreadySignedOut);
        }

        self.sessions.revoke(user_id).await?;
        identity.set_status(AccountStatus::Inactive, self.clock.now());
        self.store.update(&identity).await?;

        info!(user_id = %user_id, "signed out");
        Ok(())
    }

    /// Rotate a presented refresh token.
    ///
    /// Every failure mode (bad signature, expiry, no session, byte mismatch
    /// against the stored token) maps to `Unauthorized`. The byte comparison
    /// is what rejects a stale token after rotation.
    ///
    /// Rotation is the single atomic key overwrite of the session registry;
    /// two concurrent refreshes of the same token can both pass the compare
    /// before either overwrite lands (last write wins). Accepted; see
    /// DESIGN.md.
    #[instrument(skip_all)]
    pub async fn refresh(&self, presented: &str) -> Result<SignInOutcome, FlowError> {
        let claims = self
            .signer
            .decode(presented)
            .map_err(|_| FlowError::Unauthorized)?;
        let user_id = claims.sub;

        if self.store.find_by_id(user_id).await?.is_none() {
            return Err(FlowError::Unauthorized);
        }

        let record = self
            .sessions
            .get(user_id)
            .await?
            .ok_or(FlowError::Unauthorized)?;

        if record.refresh_token != presented {
            warn!(user_id = %user_id, "stale refresh token presented");
            return Err(FlowError::Unauthorized);
        }

        let access = self.issue_access(user_id)?;
        let refresh = self.issue_refresh(user_id)?;

        self.sessions
            .put(&RefreshRecord {
                user_id,
                jti: refresh.jti,
                refresh_token: refresh.token.clone(),
            })
            .await?;

        Ok(SignInOutcome {
            user_id,
            access,
            refresh,
        })
    }

    /// Administrative deletion: profile row first, then the identity row.
    #[instrument(skip_all, fields(user_id = %user_id))]
    pub async fn delete_identity(&self, user_id: UserId) -> Result<(), FlowError> {
        if !self.store.delete(user_id).await? {
            return Err(FlowError::NotFound);
        }
        info!(user_id = %user_id, "account deleted");
        Ok(())
    }

    /// All identities with their profiles (admin listing).
    pub async fn list_identities(&self) -> Result<Vec<(Identity, Profile)>, FlowError> {
        Ok(self.store.list_with_profiles().await?)
    }

    /// Cross-cutting gate: resolve a bearer access token and require a role.
    ///
    /// A bad or expired token is `Unauthorized`; a resolvable token whose
    /// identity is gone or lacks the capability is `Forbidden`.
    pub async fn require_role(&self, bearer: &str, required: Role) -> Result<Identity, FlowError> {
        let claims = self
            .signer
            .decode(bearer)
            .map_err(|_| FlowError::Unauthorized)?;

        let identity = self
            .store
            .find_by_id(claims.sub)
            .await?
            .ok_or(FlowError::Forbidden)?;

        authorize(identity.role, required).map_err(|_| FlowError::Forbidden)?;
        Ok(identity)
    }

    fn issue_access(&self, user_id: UserId) -> Result<SignedToken, FlowError> {
        self.signer
            .issue_access(user_id)
            .map_err(|e| FlowError::Internal(e.to_string()))
    }

    fn issue_refresh(&self, user_id: UserId) -> Result<SignedToken, FlowError> {
        self.signer
            .issue_refresh(user_id)
            .map_err(|e| FlowError::Internal(e.to_string()))
    }
}
