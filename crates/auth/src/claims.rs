use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use kardex_core::{TokenId, UserId};

/// JWT claims carried by both access and refresh tokens.
///
/// The two token kinds share one shape; they differ only in lifetime. An
/// access token is proven by signature + expiry alone, a refresh token is
/// additionally checked against the session registry by `jti`/byte equality.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject: the identity this token speaks for.
    pub sub: UserId,

    /// Unique id of this token issuance.
    pub jti: TokenId,

    /// Issued-at, seconds since the epoch.
    pub iat: i64,

    /// Expiry, seconds since the epoch.
    pub exp: i64,
}

impl TokenClaims {
    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.iat, 0)
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }
}
