//! `kardex-accounts` — account and session lifecycle core.
//!
//! This crate owns the identity state machine and everything that hangs off
//! it: sign-up with email verification, sign-in/out with a server-side
//! refresh-token session, token rotation, and the background reaper that
//! reclaims accounts whose verification window lapsed.
//!
//! Storage and delivery are ports (`IdentityStore`, `KeyValueStore`,
//! `Mailer`); production adapters live in `kardex-infra`, in-memory
//! implementations for tests and local development live in [`memory`].

pub mod flows;
pub mod identity;
pub mod kv;
pub mod mailer;
pub mod memory;
pub mod reaper;
pub mod session;
pub mod store;
pub mod verification;

pub use flows::{AccountFlows, FlowError, NewAccount, SignInOutcome};
pub use identity::{AccountStatus, Identity, Profile};
pub use kv::{KeyTtl, KeyValueStore, KvError};
pub use mailer::{MailError, Mailer};
pub use reaper::{Reaper, ReapStats};
pub use session::{RefreshRecord, SessionRegistry};
pub use store::{IdentityStore, StoreError};
pub use verification::{VerificationRecord, VerificationRegistry};
