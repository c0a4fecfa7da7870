//! `kardex-auth` — pure authentication/authorization boundary.
//!
//! This crate is intentionally decoupled from HTTP and storage: token
//! signing/verification, password digests and the role gate are all
//! deterministic, I/O-free building blocks composed by the account flows.

pub mod authorize;
pub mod claims;
pub mod password;
pub mod roles;
pub mod tokens;

pub use authorize::{authorize, AuthzError};
pub use claims::TokenClaims;
pub use password::{Argon2Hasher, CredentialHasher, HashError};
pub use roles::Role;
pub use tokens::{SignedToken, TokenConfig, TokenError, TokenSigner};
