//! Signed, time-bounded bearer tokens.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;

use kardex_core::{TokenId, UserId};

use crate::claims::TokenClaims;

/// Default access-token lifetime.
const ACCESS_TTL_MINUTES: i64 = 15;

/// Default refresh-token lifetime.
const REFRESH_TTL_DAYS: i64 = 7;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// Signature mismatch, expired, or otherwise malformed. Collapsed into
    /// one variant on purpose: callers must not distinguish failure causes.
    #[error("token is invalid or expired")]
    Invalid,

    #[error("token encoding failed: {0}")]
    Encoding(String),
}

/// Signer configuration.
///
/// Lifetimes are injectable so tests can exercise expiry with second-scale
/// windows instead of waiting out the real ones.
#[derive(Clone)]
pub struct TokenConfig {
    pub secret: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

impl TokenConfig {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            access_ttl: Duration::minutes(ACCESS_TTL_MINUTES),
            refresh_ttl: Duration::days(REFRESH_TTL_DAYS),
        }
    }

    pub fn with_ttls(mut self, access: Duration, refresh: Duration) -> Self {
        self.access_ttl = access;
        self.refresh_ttl = refresh;
        self
    }
}

/// A freshly issued token plus the metadata the caller needs without
/// re-decoding it.
#[derive(Debug, Clone)]
pub struct SignedToken {
    pub token: String,
    pub jti: TokenId,
    pub expires_at: DateTime<Utc>,
}

/// Mints and verifies HS256 tokens. Stateless; no storage lookups.
pub struct TokenSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenSigner {
    pub fn new(config: TokenConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        // Zero leeway: a 15-minute token is 15 minutes, not 16.
        validation.leeway = 0;

        Self {
            encoding: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
            access_ttl: config.access_ttl,
            refresh_ttl: config.refresh_ttl,
        }
    }

    /// Issue a short-lived access token for `user_id`.
    pub fn issue_access(&self, user_id: UserId) -> Result<SignedToken, TokenError> {
        self.issue(user_id, self.access_ttl)
    }

    /// Issue a refresh token for `user_id`. The caller is responsible for
    /// registering it server-side; the signer itself has no side effects.
    pub fn issue_refresh(&self, user_id: UserId) -> Result<SignedToken, TokenError> {
        self.issue(user_id, self.refresh_ttl)
    }

    fn issue(&self, user_id: UserId, ttl: Duration) -> Result<SignedToken, TokenError> {
        let now = Utc::now();
        let expires_at = now + ttl;
        let jti = TokenId::new();

        let claims = TokenClaims {
            sub: user_id,
            jti,
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| TokenError::Encoding(e.to_string()))?;

        Ok(SignedToken {
            token,
            jti,
            expires_at,
        })
    }

    /// Verify signature and expiry, returning the embedded claims.
    ///
    /// Pure function over the token string; every failure mode maps to
    /// `TokenError::Invalid`.
    pub fn decode(&self, token: &str) -> Result<TokenClaims, TokenError> {
        jsonwebtoken::decode::<TokenClaims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|_| TokenError::Invalid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> TokenSigner {
        TokenSigner::new(TokenConfig::new("test-secret"))
    }

    #[test]
    fn access_token_round_trips() {
        let signer = signer();
        let user_id = UserId::new();

        let signed = signer.issue_access(user_id).unwrap();
        let claims = signer.decode(&signed.token).unwrap();

        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.jti, signed.jti);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn refresh_token_outlives_access_token() {
        let signer = signer();
        let user_id = UserId::new();

        let access = signer.issue_access(user_id).unwrap();
        let refresh = signer.issue_refresh(user_id).unwrap();

        assert!(refresh.expires_at > access.expires_at);
    }

    #[test]
    fn each_issuance_gets_a_fresh_jti() {
        let signer = signer();
        let user_id = UserId::new();

        let a = signer.issue_access(user_id).unwrap();
        let b = signer.issue_access(user_id).unwrap();

        assert_ne!(a.jti, b.jti);
    }

    #[test]
    fn expired_token_is_rejected() {
        let config = TokenConfig::new("test-secret")
            .with_ttls(Duration::seconds(1), Duration::seconds(1));
        let signer = TokenSigner::new(config);

        let signed = signer.issue_access(UserId::new()).unwrap();
        std::thread::sleep(std::time::Duration::from_secs(2));

        assert_eq!(signer.decode(&signed.token), Err(TokenError::Invalid));
    }

    #[test]
    fn foreign_secret_is_rejected() {
        let signed = signer().issue_access(UserId::new()).unwrap();

        let other = TokenSigner::new(TokenConfig::new("other-secret"));
        assert_eq!(other.decode(&signed.token), Err(TokenError::Invalid));
    }

    #[test]
    fn garbage_is_rejected() {
        assert_eq!(signer().decode("not.a.jwt"), Err(TokenError::Invalid));
    }
}
